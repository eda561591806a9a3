//! Turn declared REST routes into client operations and a command-line interface.
//!
//! Routes are declared on a [`Registry`], either in code or from a route
//! document, and invoked through a [`RestClient`]. A [`Runner`] maps process
//! arguments onto those routes, binds declared arguments and renders each
//! response.
//!
//! # Usage
//!
//! ```no_run
//! use route_clap::{ClientConfig, Registry, RestClient, Runner};
//!
//! let doc = serde_json::json!({
//!     "routes": [
//!         {"name": "status", "method": "GET", "url": "/status"},
//!         {"name": "greet", "method": "GET", "url": "/greet",
//!          "args": [{"name": "name", "type": "=s", "required": true}]}
//!     ],
//!     "objects": [{"name": "widget", "url": "/widget", "doc": "Widgets"}]
//! });
//!
//! let mut registry = Registry::new();
//! registry.declare("Api", &doc).unwrap();
//! let registry = registry.install().unwrap();
//!
//! let config = ClientConfig::new("https://api.example.com");
//! let client = RestClient::connect(registry, "Api", &config).unwrap();
//!
//! let mut runner = Runner::new(client, "api");
//! let report = runner.run(&["greet", "--name", "world"]).unwrap();
//! assert!(report.is_success());
//! ```

pub mod bind;
pub mod builder;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod object;
pub mod preprocess;
pub mod registry;
pub mod remote;
pub mod render;
pub mod runner;
pub mod spec;
pub mod transport;

pub use bind::{cli_tokens, Binder, Binding, BoundArgs, CallStyle};
pub use builder::{build_route_command, build_usage, route_help, usage};
pub use config::{AppConfig, ConfigResolver, FileConfig, RemoteProfile};
pub use dispatch::{build_bound_request, build_request, CallArg, ClientConfig, Exchange, RestClient};
pub use error::{
    BindError, ClientError, ConfigError, DeclarationError, PreprocessError, RemoteError,
    RunError, TransportError,
};
pub use input::{MockStdin, RealStdin, StdinReader};
pub use object::{ClientHandle, ClientInfo, GenericObject, Reply, ResponseFactory, ResponseObject};
pub use registry::Registry;
pub use remote::{RemoteShell, SshShell};
pub use runner::{RunReport, Runner};
pub use spec::{
    extract_routes, ArgSpec, ArgType, HttpMethod, ObjectSpec, Positional, Preprocess,
    RouteAttribute, RouteAttributes, RouteSpec, UrlPlacement,
};
pub use transport::{
    AsyncHttpTransport, AsyncTransport, BlockingTransport, HttpRequest, HttpResponse, Transport,
};

// Re-export dependencies for downstream crates
pub use clap;
pub use reqwest;
