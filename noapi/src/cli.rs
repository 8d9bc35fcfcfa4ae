//! # CLI
//!
//! This module defines the command-line interface of `noapi` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring JSON
//! arguments parse and identities are `key=value`).
use clap::{Args, Parser, Subcommand};
use noapi_core::types::{Identity, SortOption};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "noapi", version, about = "Command line client for NOAPI backends")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Backend URL prefixed to every endpoint (e.g. http://localhost:3001)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Authorization (role) to use for resource calls
    #[arg(long, global = true)]
    pub use_auth: Option<String>,

    /// Preferred permissions, most preferred first (e.g. admin,user)
    #[arg(long, global = true, value_delimiter = ',')]
    pub permission_order: Vec<String>,

    /// Extra header sent with every request
    #[arg(short = 'H', long = "header", global = true, value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// File keeping session cookies between runs, so `auth login` is remembered
    #[arg(long, global = true)]
    pub session_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the records of a resource
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// noapi --host http://localhost:3001 list users --filter '["age", ">", 18]' --take 10 --sort -createdAt
    /// ```
    List {
        resource: String,

        /// Filter expression (e.g. '[["a", "=", 1], "AND", ["b", "<", 2]]')
        #[arg(long, value_parser = parse_body)]
        filter: Option<serde_json::Value>,

        #[arg(long)]
        skip: Option<u64>,

        #[arg(long)]
        take: Option<u64>,

        /// Sort field, `-` prefixed for descending order. Repeatable.
        #[arg(long, value_parser = parse_sort, allow_hyphen_values = true)]
        sort: Vec<SortOption>,
    },

    /// Insert a record
    Insert {
        resource: String,

        #[arg(long, value_parser = parse_body)]
        data: serde_json::Value,
    },

    /// Update the records matching a filter
    Update {
        resource: String,

        #[arg(long, value_parser = parse_body)]
        data: serde_json::Value,

        #[arg(long, value_parser = parse_body)]
        filter: serde_json::Value,
    },

    /// Delete the records matching a filter
    Delete {
        resource: String,

        #[arg(long, value_parser = parse_body)]
        filter: serde_json::Value,
    },

    /// Run an aggregation
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// noapi aggregate orders --aggregation '{"params": [["status"], ["COUNT", "id", "n"]], "fields": ["status", "id"], "group": ["status"]}'
    /// ```
    Aggregate {
        resource: String,

        #[arg(long, value_parser = parse_body)]
        aggregation: serde_json::Value,

        #[arg(long, value_parser = parse_body)]
        filter: Option<serde_json::Value>,
    },

    /// Session and password operations
    Auth {
        #[command(subcommand)]
        sub: AuthCommands,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Log in and show the resulting user
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// noapi auth login -i email=ada@noapi.dev -i password=secret
    /// ```
    Login {
        /// Identity field (`key=value`, or `key:=number`). Repeatable.
        #[arg(short = 'i', long = "identity", value_parser = parse_identity, required = true)]
        identities: Vec<(String, Identity)>,

        #[arg(long)]
        remember: bool,

        #[arg(long)]
        session_engine: Option<String>,
    },

    Logout,

    /// Show the current user and what they may access
    Whoami,

    /// Send a password recovery link by email
    RecoverPassword {
        email: String,

        /// Where the recovery link should land
        #[arg(long)]
        dest_url: Option<String>,
    },

    /// Check whether a recovery token is valid
    CheckToken { token: String },

    /// Set a new password using a recovery token
    SetPassword { token: String, password: String },
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}

fn parse_sort(value: &str) -> Result<SortOption, String> {
    let sort = match value.strip_prefix('-') {
        Some(field) => SortOption::desc(field.trim()),
        None => SortOption::asc(value.trim()),
    };
    if sort.selector.is_empty() {
        return Err("Sort field cannot be empty".to_string());
    }
    Ok(sort)
}

/// `key=value` is sent as text; `key:=value` must be a number and is sent as one.
fn parse_identity(value: &str) -> Result<(String, Identity), String> {
    let (key, value) = value
        .split_once('=')
        .ok_or_else(|| format!("Invalid identity: '{value}'. Expected 'key=value'"))?;

    let (key, numeric) = match key.strip_suffix(':') {
        Some(key) => (key.trim(), true),
        None => (key.trim(), false),
    };
    if key.is_empty() {
        return Err("Identity key cannot be empty".to_string());
    }

    let identity = if numeric {
        let number = value
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("Invalid number for '{key}': {e}"))?;
        Identity::from(number)
    } else {
        Identity::from(value)
    };
    Ok((key.to_string(), identity))
}
