use colored::*;
use noapi_core::{
    ConfigError, RequestError,
    types::{NapResponse, Permission, ResourcesAllowed},
};
use serde::Serialize;
use serde_json::Value;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

/// The current user plus their permission map, as shown by `auth whoami`.
pub struct Session(pub Option<Value>, pub ResourcesAllowed);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<Value> for FormattedString {
    fn from(value: Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

/// Successful responses print their data, failures the `error: errorMessage` pair.
impl<T: Serialize> From<NapResponse<T>> for FormattedString {
    fn from(response: NapResponse<T>) -> Self {
        let status_code = response.status_code;
        let total_count = response.total_count;
        match response.into_result() {
            Ok(data) => {
                let data = data
                    .and_then(|d| serde_json::to_value(d).ok())
                    .unwrap_or(Value::Null);
                let mut out = FormattedString::from(data).0;
                if let Some(total) = total_count {
                    out.push_str(&format!("\n\n{} {}", "Total count:".cyan(), total));
                }
                FormattedString(out)
            }
            Err(failure) => FormattedString(format!(
                "{} status={}\n\n'{}'",
                "Request Rejected:".red().bold(),
                status_code,
                failure
            )),
        }
    }
}

impl From<RequestError> for FormattedString {
    fn from(err: RequestError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err))
    }
}

impl From<ConfigError> for FormattedString {
    fn from(err: ConfigError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Invalid configuration:".red().bold(),
            err
        ))
    }
}

impl From<Session> for FormattedString {
    fn from(Session(user, allowed): Session) -> Self {
        let Some(user) = user else {
            return FormattedString(format!("{}", "Not logged in".yellow()));
        };

        let mut out = format!(
            "{}\n{}",
            "User:".green().bold(),
            serde_json::to_string_pretty(&user).unwrap_or_else(|_| user.to_string())
        );

        if !allowed.is_empty() {
            out.push_str(&format!("\n\n{}", "Permissions:".green().bold()));
        }
        for resource in allowed.resources() {
            let granted: Vec<&str> = [
                (Permission::Read, "read"),
                (Permission::Insert, "insert"),
                (Permission::Update, "update"),
                (Permission::Delete, "delete"),
            ]
            .into_iter()
            .filter(|(permission, _)| allowed.allows(resource, *permission))
            .map(|(_, name)| name)
            .collect();

            out.push_str(&format!(
                "\n  {} {}",
                resource.cyan(),
                if granted.is_empty() {
                    "-".dimmed().to_string()
                } else {
                    granted.join(", ")
                }
            ));
        }

        FormattedString(out)
    }
}
