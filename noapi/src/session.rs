//! # Session file
//!
//! Every run of `noapi` starts a fresh HTTP client, so cookies issued by `auth login` would
//! be gone by the next command. With a session file the cookies sent to both endpoints are
//! written out after a successful command and loaded back before the next one.
use noapi_core::NapConnection;
use std::{collections::BTreeMap, fs, io, path::Path};

/// `Cookie` header per endpoint URL.
type SavedCookies = BTreeMap<String, String>;

/// Seeds the connection's cookie store from `path`. A missing file is an empty session.
pub fn restore(path: &Path, conn: &NapConnection) -> Result<(), String> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(format!("Failed to read '{}': {e}", path.display())),
    };
    let saved: SavedCookies = serde_json::from_str(&content)
        .map_err(|e| format!("Invalid session file '{}': {e}", path.display()))?;

    for (url, cookies) in &saved {
        conn.transport()
            .add_cookies(url, cookies)
            .map_err(|e| e.to_string())?;
    }
    tracing::debug!(path = %path.display(), urls = saved.len(), "session restored");
    Ok(())
}

/// Writes the current cookies to `path`, or removes the file when there are none left.
pub fn save(path: &Path, conn: &NapConnection) -> Result<(), String> {
    let saved: SavedCookies = [conn.resource_url(), conn.auth_url()]
        .into_iter()
        .filter_map(|url| conn.transport().cookies(&url).map(|c| (url, c)))
        .collect();

    if saved.is_empty() {
        return match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => {
                Err(format!("Failed to remove '{}': {e}", path.display()))
            }
            _ => Ok(()),
        };
    }

    let content = serde_json::to_string_pretty(&saved).map_err(|e| e.to_string())?;
    fs::write(path, content).map_err(|e| format!("Failed to write '{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> NapConnection {
        let conn = NapConnection::new().unwrap();
        conn.set_host("http://localhost:3001");
        conn
    }

    #[test]
    fn cookies_survive_a_new_connection() {
        let path = std::env::temp_dir().join(format!("noapi-session-{}.json", std::process::id()));

        let first = conn();
        first
            .transport()
            .add_cookies(&first.auth_url(), "sid=abc")
            .unwrap();
        save(&path, &first).unwrap();

        let second = conn();
        restore(&path, &second).unwrap();
        assert_eq!(
            second.transport().cookies(&second.resource_url()).as_deref(),
            Some("sid=abc")
        );

        save(&path, &conn()).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_an_empty_session() {
        let path = std::env::temp_dir().join("noapi-session-that-does-not-exist.json");
        let conn = conn();

        restore(&path, &conn).unwrap();
        assert_eq!(conn.transport().cookies(&conn.auth_url()), None);
    }
}
