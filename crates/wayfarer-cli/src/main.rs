//! wayfarer - command-line access to the travel-booking API.
//!
//! Signs in to the admin console or the customer portal and issues
//! authenticated requests against the booking backend. Tokens persist between
//! runs and are refreshed automatically.

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wayfarer_core::auth::SessionState;
use wayfarer_core::{ApiClient, ApiError, Config, Navigator, SessionKind};

/// Directory for daily rolling log files, when set
const ENV_LOG_DIR: &str = "WAYFARER_LOG_DIR";

/// Exit status when the session ended and the user must sign in again
const EXIT_SIGN_IN: u8 = 2;

const USAGE: &str = "\
Usage: wayfarer [--customer] <command> [args]

Commands:
  login <username>                 Sign in (prompts for password)
  logout                           Forget stored tokens
  status                           Show session state
  get <path>                       GET and print JSON
  post <path> <json>               POST a JSON body
  put <path> <json>                PUT a JSON body
  delete <path>                    DELETE a resource
  upload <path> <field> <file>     POST a file as multipart form data

Sessions default to the admin console; --customer uses the customer portal.";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "wayfarer.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

/// Tells the user where to sign in again.
struct TerminalNavigator {
    base_url: String,
}

impl Navigator for TerminalNavigator {
    fn navigate(&self, kind: SessionKind, route: &str) {
        let flag = match kind {
            SessionKind::Admin => "",
            SessionKind::Customer => " --customer",
        };
        eprintln!(
            "Your {} session has ended. Run `wayfarer{} login <username>` (login page: {}).",
            kind, flag, route
        );
        info!(%kind, base_url = %self.base_url, route, "Redirected to login");
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let kind = match args.iter().position(|a| a == "--customer") {
        Some(i) => {
            args.remove(i);
            SessionKind::Customer
        }
        None => SessionKind::Admin,
    };
    if args.is_empty() || args[0] == "--help" || args[0] == "-h" {
        println!("{}", USAGE);
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::load()?;
    let navigator = Arc::new(TerminalNavigator {
        base_url: config.base_url().to_string(),
    });
    let client = ApiClient::from_config(config, kind, navigator)?;

    // Return instead of exiting so the log guard flushes on drop.
    match run(&client, &args).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        // Escalation already told the user where to go.
        Err(e) if needs_sign_in(&e) => Ok(ExitCode::from(EXIT_SIGN_IN)),
        Err(e) => Err(e),
    }
}

fn needs_sign_in(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth_required)
}

async fn run(client: &ApiClient, args: &[String]) -> Result<()> {
    let arg = |i: usize, name: &'static str| arg_at(args, i, name);

    match args[0].as_str() {
        "login" => {
            let username = arg(1, "username")?;
            let password = rpassword::prompt_password("Password: ")?;
            match client.login(username, &password).await {
                Ok(()) => eprintln!("Signed in to the {} session.", client.kind()),
                Err(ApiError::AuthenticationRequired { .. }) => {
                    anyhow::bail!("Invalid username or password")
                }
                Err(e) => return Err(e.into()),
            }
        }
        "logout" => client.logout(),
        "status" => print_status(client),
        "get" => {
            let value: serde_json::Value = client.get(arg(1, "path")?).await?;
            print_json(&value)?;
        }
        "post" => {
            let body = parse_body(arg(2, "json")?)?;
            let value: serde_json::Value = client.post(arg(1, "path")?, &body).await?;
            print_json(&value)?;
        }
        "put" => {
            let body = parse_body(arg(2, "json")?)?;
            let value: serde_json::Value = client.put(arg(1, "path")?, &body).await?;
            print_json(&value)?;
        }
        "delete" => {
            client.delete(arg(1, "path")?).await?;
            eprintln!("Deleted.");
        }
        "upload" => {
            let form = file_form(arg(2, "field")?, Path::new(arg(3, "file")?))?;
            let value: serde_json::Value = client.upload(arg(1, "path")?, form).await?;
            print_json(&value)?;
        }
        other => anyhow::bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
    Ok(())
}

fn arg_at<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("Missing <{}>\n\n{}", name, USAGE))
}

fn print_status(client: &ApiClient) {
    let state = client.session_state();
    println!("Session:  {}", client.kind());
    println!("State:    {}", state.label());
    if let Some(expiry) = client.token_expiry() {
        let minutes = (expiry - Utc::now()).num_minutes().max(0);
        println!("Expires:  {} ({}m)", expiry.format("%Y-%m-%d %H:%M UTC"), minutes);
    }
    if state == SessionState::Unauthenticated {
        println!("Login:    {}", client.login_route());
    }
}

fn parse_body(raw: &str) -> Result<serde_json::Value> {
    serde_json::from_str(raw).context("Request body is not valid JSON")
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn file_form(field: &str, path: &Path) -> Result<reqwest::multipart::Form> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
    Ok(reqwest::multipart::Form::new().part(field.to_string(), part))
}
