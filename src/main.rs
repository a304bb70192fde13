//! Sockbridge - relay daemon bridging container socket files to local TCP backends.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sockbridge::config::Settings;
use sockbridge::error::{RelayError, RelayResult};
use sockbridge::socket::RelayListener;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration file location.
const DEFAULT_CONFIG_PATH: &str = "/etc/sockbridge/relay.toml";

fn main() -> ExitCode {
    // Parse command line arguments (simple std::env approach)
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    // The socket path is the one required argument
    let Some(socket_path) = get_socket_path(&args) else {
        eprintln!("{}: a socket path is required", NAME);
        eprintln!("Usage: {} [OPTIONS] <SOCKET_PATH>", NAME);
        return ExitCode::FAILURE;
    };

    // Load configuration
    let settings = match load_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging based on configuration
    init_logging(&settings);

    // Print startup banner
    info!("Starting {} v{}", NAME, VERSION);
    info!("Socket path: {}", socket_path.display());

    // Run the async main
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    match runtime.block_on(async_main(socket_path, settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Relay failed");
            ExitCode::FAILURE
        }
    }
}

/// Async main function.
async fn async_main(socket_path: PathBuf, settings: Settings) -> RelayResult<()> {
    let listener = RelayListener::bind(&socket_path, &settings)?;

    // Break the accept loop on SIGINT/SIGTERM so cleanup runs
    let shutdown = Arc::new(Notify::new());
    let notifier = Arc::clone(&shutdown);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        // notify_one stores a permit, so the signal is also seen when the
        // loop is mid-session rather than parked in accept
        notifier.notify_one();
    });

    listener.run(shutdown).await?;

    info!("Relay stopped");
    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Relay daemon bridging container socket files to local TCP backends.

USAGE:
    {} [OPTIONS] <SOCKET_PATH>

ARGS:
    <SOCKET_PATH>          Domain socket file to create and listen on; its
                           filename encodes the backend port, e.g.
                           web-8080.sock

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}]
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

/// Get the socket path from command line arguments.
///
/// The first argument that is neither a flag nor a flag value is the
/// socket path.
fn get_socket_path(args: &[String]) -> Option<PathBuf> {
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--config" || arg == "-c" {
            iter.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return Some(PathBuf::from(arg));
    }
    None
}

/// Get the configuration file path from command line arguments, if given.
fn get_config_path(args: &[String]) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

/// Load settings from the explicit config path, the default path if one
/// exists there, or built-in defaults.
fn load_settings(args: &[String]) -> Result<Settings, RelayError> {
    match get_config_path(args) {
        Some(path) => Settings::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Settings::load(DEFAULT_CONFIG_PATH),
        None => Ok(Settings::default()),
    }
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Default to pretty format
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_socket_path_skips_flags() {
        let parsed = get_socket_path(&args(&[
            "sockbridge",
            "--config",
            "/etc/sockbridge/relay.toml",
            "/run/web-8080.sock",
        ]));
        assert_eq!(parsed, Some(PathBuf::from("/run/web-8080.sock")));
    }

    #[test]
    fn test_socket_path_missing() {
        assert_eq!(get_socket_path(&args(&["sockbridge"])), None);
        assert_eq!(
            get_socket_path(&args(&["sockbridge", "--config", "relay.toml"])),
            None
        );
    }

    #[test]
    fn test_config_path_forms() {
        assert_eq!(
            get_config_path(&args(&["sockbridge", "-c", "a.toml", "x-1.sock"])),
            Some("a.toml".to_string())
        );
        assert_eq!(
            get_config_path(&args(&["sockbridge", "--config=b.toml", "x-1.sock"])),
            Some("b.toml".to_string())
        );
        assert_eq!(get_config_path(&args(&["sockbridge", "x-1.sock"])), None);
    }
}
