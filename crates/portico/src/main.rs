//! Portico - Entry point
//!
//! Loads configuration, initialises telemetry, assembles the gateway and
//! serves it until SIGINT or SIGTERM.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use portico::config::{ConfigLoader, PorticoConfig, DEFAULT_ENV_PREFIX};
use portico::server::{Gateway, Server, StartupError};
use portico::telemetry::init_telemetry;
use tracing::{error, info};

/// Base profile the file and environment are layered on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Profile {
    #[default]
    Default,
    Development,
    Production,
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown profile '{other}' (expected development or production)")),
        }
    }
}

/// Options for serving.
#[derive(Debug, Default, PartialEq, Eq)]
struct ServeOptions {
    config: Option<PathBuf>,
    profile: Profile,
}

/// What the command line asks for.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve(ServeOptions),
    Help,
    Version,
}

/// Parses arguments (without the program name). Flags taking a value
/// accept both `--flag value` and `--flag=value`.
fn parse_args<I>(args: I) -> Result<Command, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = ServeOptions::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("{name} requires a value"))
        };

        match flag.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "-v" | "--version" => return Ok(Command::Version),
            "-c" | "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "-p" | "--profile" => options.profile = value("--profile")?.parse()?,
            other => return Err(format!("unknown argument '{other}'")),
        }
    }

    Ok(Command::Serve(options))
}

fn print_help() {
    println!(
        r"Portico - API gateway

USAGE:
    portico [OPTIONS]

OPTIONS:
    -c, --config <PATH>       Path to configuration file (TOML or JSON)
    -p, --profile <PROFILE>   Base profile: development | production
    -h, --help                Print help information
    -v, --version             Print version information

ENVIRONMENT VARIABLES:
    PORTICO__SERVER__HTTP_ADDR                 Listen address (default: 0.0.0.0:8080)
    PORTICO__SERVER__REQUEST_TIMEOUT_MS        Per-request timeout (default: 30000)
    PORTICO__SERVER__ENFORCE_HTTPS             Redirect plain HTTP to HTTPS
    PORTICO__TELEMETRY__LOGGING__LEVEL         Log filter (default: info)
    PORTICO__TELEMETRY__LOGGING__FORMAT        json | pretty
    PORTICO__HEALTH__TIMEOUT_MS                Health check deadline (default: 5000)

    A .env file in the working directory is read before the environment.

EXAMPLES:
    portico --config /etc/portico/portico.toml
    PORTICO__SERVER__HTTP_ADDR=127.0.0.1:9000 portico --profile development
"
    );
}

fn load_config(options: &ServeOptions) -> Result<PorticoConfig, StartupError> {
    let mut loader = ConfigLoader::new();
    loader = match options.profile {
        Profile::Default => loader,
        Profile::Development => loader.with_development(),
        Profile::Production => loader.with_production(),
    };
    if let Some(path) = &options.config {
        loader = loader.with_file(path)?;
    }
    Ok(loader
        .with_dotenv()
        .with_env_prefix(DEFAULT_ENV_PREFIX)
        .load()?)
}

async fn serve(options: ServeOptions) -> Result<(), StartupError> {
    let config = load_config(&options)?;
    init_telemetry(&config.telemetry_config())?;

    info!(version = portico::VERSION, config = ?options.config, "starting portico");
    let gateway = Gateway::builder(config).build()?;

    Server::new(gateway).run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Command::Serve(options)) => options,
        Ok(Command::Help) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Ok(Command::Version) => {
            println!("portico {}", portico::VERSION);
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("portico: {message}\nUse --help for usage information");
            return ExitCode::FAILURE;
        }
    };

    match serve(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Telemetry may not be up yet.
            eprintln!("portico: {e}");
            error!(error = %e, "startup failed");
            ExitCode::FAILURE
        }
    }
}
