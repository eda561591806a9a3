//! route-clap: invoke declared REST routes from the command line.
//!
//! Loads a route document, resolves the application's base URL and hands
//! the remaining arguments to the [`Runner`].

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use route_clap::render::error_chain;
use route_clap::{
    ClientConfig, ConfigError, ConfigResolver, FileConfig, Registry, RestClient, RunError,
    RunReport, Runner,
};

#[derive(Debug, Parser)]
#[command(name = "route-clap", version, about = "Invoke declared REST routes")]
struct Cli {
    /// Route document (YAML or JSON)
    #[arg(long, env = "ROUTE_CLAP_ROUTES", value_name = "FILE")]
    routes: PathBuf,

    /// Application name; selects the configuration file and client type
    #[arg(long, env = "ROUTE_CLAP_APP")]
    app: String,

    /// Base URL, overriding the configuration
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Named remote profile from the application's configuration
    #[arg(long, value_name = "NAME")]
    remote: Option<String>,

    /// Operation and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    args: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            tracing::debug!(failures = report.failures, "run finished with failed requests");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {}", error_chain(&err));
            if let RunError::Binding(bind) = &err {
                eprintln!("\n{}", bind.help());
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<RunReport, RunError> {
    let text = std::fs::read_to_string(&cli.routes).map_err(|source| RunError::FileRead {
        path: cli.routes.clone(),
        source,
    })?;
    let doc: serde_json::Value =
        serde_yaml::from_str(&text).map_err(|source| RunError::InvalidYaml {
            origin: cli.routes.display().to_string(),
            source,
        })?;

    let mut registry = Registry::new();
    registry.declare(&cli.app, &doc)?;
    let registry = registry.install()?;

    let config = FileConfig::from_env()?;
    let base_url = match cli.base_url {
        Some(url) => url,
        // A remote profile replaces the base URL before any request.
        None if cli.remote.is_some() => match config.resolve_base_url(&cli.app) {
            Ok(url) => url,
            Err(ConfigError::MissingUrl { .. }) => String::new(),
            Err(err) => return Err(err.into()),
        },
        None => config.resolve_base_url(&cli.app)?,
    };
    let client_config = ClientConfig::new(base_url).idle_timeout(config.idle_timeout(&cli.app));
    let client = RestClient::connect(registry, cli.app.clone(), &client_config)?;

    let mut argv = Vec::with_capacity(cli.args.len() + 2);
    if let Some(remote) = cli.remote {
        argv.push("--remote".to_owned());
        argv.push(remote);
    }
    argv.extend(cli.args);

    Runner::new(client, cli.app).with_config(config).run(&argv)
}
