//! # NOAPI CLI Entry Point
//!
//! The main executable for the `noapi` tool. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Installs logging and parses command-line arguments using [`cli::Cli`].
//! 2. **Configuration**: Loads [`NapConfig`] from the optional file and `NOAPI_*` variables,
//!    then applies the global flags on top.
//! 3. **Execution**: Delegates the request to `noapi_core`.
//! 4. **Presentation**: Formats and prints the resulting data or failure to standard output/error.
//!
//! With `--session-file` (or `session_file` in the configuration) the session cookies are
//! restored before the command and saved after it succeeds.

mod cli;
mod formatter;
mod session;

use clap::Parser;
use colored::Colorize;
use cli::{AuthCommands, Cli, Commands, GlobalArgs};
use formatter::{FormattedString, Session};
use noapi_core::{
    AuthService, NapConfig, NapConnection, RequestError,
    types::{
        Aggregation, Filter, ListOptions, LoginIdentities, LoginOptions, NapResponse,
        ResetPasswordOptions,
    },
};
use serde::Serialize;
use serde_json::Value;
use std::process;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Cli::parse();
    let config = load_config_or_exit(&args.global);
    let conn = match NapConnection::from_config(&config) {
        Ok(conn) => conn,
        Err(err) => exit_with(err),
    };

    if let Some(path) = &config.session_file
        && let Err(err) = session::restore(path, &conn)
    {
        exit_with(FormattedString(format!("{} {err}", "Session file:".red().bold())));
    }

    run(&conn, &config, args.command).await;

    if let Some(path) = &config.session_file
        && let Err(err) = session::save(path, &conn)
    {
        exit_with(FormattedString(format!("{} {err}", "Session file:".red().bold())));
    }
}

async fn run(conn: &NapConnection, config: &NapConfig, command: Commands) {
    match command {
        Commands::List {
            resource,
            filter,
            skip,
            take,
            sort,
        } => {
            let options = ListOptions {
                skip,
                take,
                sort: (!sort.is_empty()).then_some(sort),
                ..Default::default()
            };
            print_response(
                conn.list::<Value>(&resource, filter.map(Filter::from), Some(options))
                    .await,
            );
        }
        Commands::Insert { resource, data } => {
            print_response(conn.insert::<_, Value>(&resource, &data, None).await);
        }
        Commands::Update {
            resource,
            data,
            filter,
        } => {
            print_response(
                conn.update::<_, Value>(&resource, &data, Filter::from(filter), None)
                    .await,
            );
        }
        Commands::Delete { resource, filter } => {
            print_response(conn.delete::<Value>(&resource, Filter::from(filter), None).await);
        }
        Commands::Aggregate {
            resource,
            aggregation,
            filter,
        } => {
            let aggregation: Aggregation = match serde_json::from_value(aggregation) {
                Ok(aggregation) => aggregation,
                Err(err) => exit_with(FormattedString(format!("Invalid aggregation: '{err}'"))),
            };
            print_response(
                conn.aggregate::<Value>(&resource, aggregation, filter.map(Filter::from), None)
                    .await,
            );
        }
        Commands::Auth { sub } => {
            let auth = AuthService::new(conn.clone());
            auth.configure(config);
            run_auth(&auth, sub).await;
        }
    }
}

async fn run_auth(auth: &AuthService, command: AuthCommands) {
    match command {
        AuthCommands::Login {
            identities,
            remember,
            session_engine,
        } => {
            let identities: LoginIdentities = identities.into_iter().collect();
            let options = session_engine.map(|engine| LoginOptions {
                session_engine: Some(engine),
                ..Default::default()
            });
            let response = match auth
                .login::<Value>(&identities, remember.then_some(true), options)
                .await
            {
                Ok(response) => response,
                Err(err) => exit_with(err),
            };
            if !response.is_success() {
                exit_with(response);
            }
            whoami(auth).await;
        }
        AuthCommands::Logout => print_response(auth.logout(None).await),
        AuthCommands::Whoami => whoami(auth).await,
        AuthCommands::RecoverPassword { email, dest_url } => {
            let options = dest_url.map(|dest_url| ResetPasswordOptions {
                dest_url: Some(dest_url),
            });
            print_response(auth.recover_password_by_email(&email, options).await);
        }
        AuthCommands::CheckToken { token } => print_response(auth.check_token(&token).await),
        AuthCommands::SetPassword { token, password } => {
            print_response(auth.set_password_for_token(&token, &password, None).await)
        }
    }
}

async fn whoami(auth: &AuthService) {
    if let Err(err) = auth.read().await {
        exit_with(err);
    }
    println!(
        "{}",
        FormattedString::from(Session(auth.user(), auth.resources_allowed()))
    );
}

fn load_config_or_exit(args: &GlobalArgs) -> NapConfig {
    let mut config = match NapConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => exit_with(err),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if !args.permission_order.is_empty() {
        config.permission_order = args.permission_order.clone();
    }
    if let Some(role) = &args.use_auth {
        config.default_authorization = Some(role.clone());
    }
    config.headers.extend(args.headers.iter().cloned());
    if let Some(path) = &args.session_file {
        config.session_file = Some(path.clone());
    }

    tracing::debug!(?config, "configuration loaded");
    config
}

fn print_response<T: Serialize>(result: Result<NapResponse<T>, RequestError>) {
    match result {
        Ok(response) if response.is_success() => println!("{}", FormattedString::from(response)),
        Ok(response) => exit_with(response),
        Err(err) => exit_with(err),
    }
}

fn exit_with(err: impl Into<FormattedString>) -> ! {
    eprintln!("{}", err.into());
    process::exit(1);
}
