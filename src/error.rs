//! Error types for the route-clap crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while declaring routes on a [`Registry`](crate::Registry).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeclarationError {
    #[error("route {client_type}::{name} is already declared as {existing}")]
    ConflictingRoute {
        client_type: String,
        name: String,
        existing: String,
    },

    #[error("no route {client_type}::{name} has been declared")]
    UnknownRoute { client_type: String, name: String },

    #[error("invalid argument specification for {route}: {reason}")]
    InvalidArgs { route: String, reason: String },

    #[error("invalid route document: {0}")]
    InvalidDocument(#[source] serde_json::Error),

    #[error("a process-wide registry is already installed")]
    AlreadyInstalled,
}

/// Failure of a single preprocessing transform.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PreprocessError {
    #[error("value contains a newline and cannot be used as a filename")]
    EmbeddedNewline,

    #[error("expected a filename, got a structured value")]
    NotAFilename,

    #[error("failed to read {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read standard input")]
    StdinRead(#[source] std::io::Error),

    #[error("invalid YAML in {origin}")]
    InvalidYaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot parse {input:?} as a date/time")]
    InvalidDateTime { input: String },
}

/// Errors produced while binding raw arguments against a route's `args`.
///
/// Every variant carries the generated help text for the route so the
/// caller can show it next to the diagnostic.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BindError {
    #[error("missing required argument --{name}")]
    MissingRequiredArgument { name: String, help: String },

    #[error("unknown argument(s): {}", tokens.join(" "))]
    UnknownArgument { tokens: Vec<String>, help: String },

    #[error("option --{name} requires a value")]
    MissingValue { name: String, help: String },

    #[error("cannot preprocess --{name}")]
    PreprocessFailure {
        name: String,
        help: String,
        #[source]
        source: PreprocessError,
    },
}

impl BindError {
    /// Help text for the route the binding was attempted against.
    pub fn help(&self) -> &str {
        match self {
            Self::MissingRequiredArgument { help, .. }
            | Self::UnknownArgument { help, .. }
            | Self::MissingValue { help, .. }
            | Self::PreprocessFailure { help, .. } => help,
        }
    }
}

/// Failures of the HTTP transport itself. Non-2xx statuses are not errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("HTTP request failed")]
    RequestFailed(#[source] reqwest::Error),

    #[error("failed to read response body")]
    ResponseRead(#[source] reqwest::Error),
}

/// Errors returned to library callers of [`RestClient`](crate::RestClient).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("unknown operation {name} on {client_type}")]
    UnknownOperation { client_type: String, name: String },

    #[error(transparent)]
    Binding(#[from] BindError),

    #[error("only one structured payload may be passed per call")]
    MultiplePayloads,

    #[error("only one completion callback may be passed per call")]
    MultipleCallbacks,

    #[error("a completion callback requires the asynchronous call path")]
    CallbackOnBlockingCall,

    #[error("no {0} transport is configured for this client")]
    NoTransport(&'static str),

    #[error("failed to encode request body")]
    EncodeBody(#[source] serde_json::Error),
}

/// Non-zero exit or spawn failure of a remote shell command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RemoteError {
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` on {host} exited with {status}: {diagnostics}")]
    CommandFailed {
        host: String,
        command: String,
        status: String,
        diagnostics: String,
    },
}

/// Errors resolving configuration for an application.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read configuration file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration in {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no configuration found for {app}")]
    UnknownApp { app: String },

    #[error("no url configured for {app}")]
    MissingUrl { app: String },

    #[error("no remote named {remote} configured for {app}")]
    UnknownRemote { app: String, remote: String },

    #[error("cannot locate the configuration directory (set ROUTE_CLAP_CONFIG_DIR or HOME)")]
    NoConfigDir,
}

/// Unrecoverable failures of a command-line run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    #[error("unrecognized argument: {0}")]
    UnrecognizedOperation(String),

    #[error("--remote requires a profile name")]
    MissingRemoteName,

    /// See [`BindError::help`] for the route's help text.
    #[error(transparent)]
    Binding(#[from] BindError),

    #[error(transparent)]
    Client(ClientError),

    #[error("invalid YAML in {origin}")]
    InvalidYaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("failed to read {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read standard input")]
    StdinRead(#[source] std::io::Error),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write output")]
    Output(#[source] std::io::Error),

    #[error("failed to format output")]
    Format(#[source] serde_yaml::Error),
}

impl From<ClientError> for RunError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Binding(err) => Self::Binding(err),
            other => Self::Client(other),
        }
    }
}
