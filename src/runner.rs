//! Process arguments → route invocations
//!
//! The command-line front end of a [`RestClient`]: resolves the operation
//! from the leading tokens (`help`, `--remote`, `create`/`search`/`delete`
//! verbs), gathers input from files, remote globs or stdin, invokes the
//! route once per input and renders each outcome to the output sink.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::bind::{cli_tokens, Binder, Binding, CallStyle};
use crate::builder::{route_help, usage};
use crate::config::ConfigResolver;
use crate::dispatch::RestClient;
use crate::error::{ConfigError, RunError};
use crate::input::{read_piped, RealStdin, StdinReader};
use crate::object::Reply;
use crate::remote::{is_glob, split_remote, RemoteShell, SshShell};
use crate::render::render_outcome;
use crate::spec::RouteSpec;

const REMOTE_FLAG: &str = "--remote";

/// What a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Requests issued
    pub invocations: usize,
    /// Requests that ended in a transport failure or a non-2xx status
    pub failures: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }
}

/// Runs command lines against one client.
pub struct Runner {
    client: RestClient,
    app: String,
    config: Option<Arc<dyn ConfigResolver>>,
    remote: Box<dyn RemoteShell>,
    stdin: Arc<dyn StdinReader>,
    out: Box<dyn Write + Send>,
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("app", &self.app)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl Runner {
    /// A runner writing to stdout, reading the real stdin and reaching
    /// remote hosts over `ssh`.
    pub fn new(client: RestClient, app: impl Into<String>) -> Self {
        let stdin: Arc<dyn StdinReader> = Arc::new(RealStdin);
        Self {
            client: client.with_binder(Binder::with_shared_stdin(Arc::clone(&stdin))),
            app: app.into(),
            config: None,
            remote: Box::new(SshShell::new()),
            stdin,
            out: Box::new(std::io::stdout()),
        }
    }

    /// Resolver consulted for `--remote <name>`.
    pub fn with_config(mut self, config: impl ConfigResolver + 'static) -> Self {
        self.config = Some(Arc::new(config));
        self
    }

    pub fn with_remote_shell(mut self, shell: impl RemoteShell + 'static) -> Self {
        self.remote = Box::new(shell);
        self
    }

    /// Replace stdin for both payload input and `-` arguments.
    pub fn with_stdin(mut self, reader: impl StdinReader + 'static) -> Self {
        let stdin: Arc<dyn StdinReader> = Arc::new(reader);
        self.client = self
            .client
            .with_binder(Binder::with_shared_stdin(Arc::clone(&stdin)));
        self.stdin = stdin;
        self
    }

    /// Send rendered output to `out`; `std::io::sink()` discards it.
    pub fn with_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Run one command line (without the program name).
    ///
    /// Usage and help display are successful runs. Failed requests are
    /// rendered and counted in the report without stopping later inputs.
    pub fn run<S: AsRef<str>>(&mut self, argv: &[S]) -> Result<RunReport, RunError> {
        let argv: Vec<&str> = argv.iter().map(AsRef::as_ref).collect();
        let mut rest = argv.as_slice();

        while let [flag, tail @ ..] = rest {
            if *flag != REMOTE_FLAG {
                break;
            }
            let [name, tail @ ..] = tail else {
                return Err(RunError::MissingRemoteName);
            };
            self.use_remote(name)?;
            rest = tail;
        }

        match rest {
            [] | ["help"] => {
                self.print_usage()?;
                return Ok(RunReport::default());
            }
            ["help", name] | [name, "--help"] => {
                self.print_route_help(name)?;
                return Ok(RunReport::default());
            }
            _ => {}
        }

        let (name, args) = self.resolve_operation(rest);
        let Some(route) = self.client.route(&name).cloned() else {
            self.print_usage()?;
            return Err(RunError::UnrecognizedOperation(name));
        };
        tracing::debug!(operation = %route.name, args = ?args, "resolved operation");

        let binding =
            self.client
                .binder()
                .bind(&route, cli_tokens(args.iter().copied()), CallStyle::CommandLine)?;

        let mut report = RunReport::default();
        match binding {
            Binding::Bound(bound) => {
                let reply = self.client.call_bound(&route.name, &bound)?;
                self.finish(&route, reply, &mut report)?;
            }
            Binding::PassThrough(_) => {
                for input in self.gather_inputs(&route, args)? {
                    let call_args = input.into_iter().map(Into::into).collect();
                    let reply = self.client.call(&route.name, call_args)?;
                    self.finish(&route, reply, &mut report)?;
                }
            }
        }
        Ok(report)
    }

    fn use_remote(&mut self, remote: &str) -> Result<(), RunError> {
        let url = match &self.config {
            Some(config) => config.resolve_remote_url(&self.app, remote)?,
            None => {
                return Err(ConfigError::UnknownRemote {
                    app: self.app.clone(),
                    remote: remote.to_owned(),
                }
                .into())
            }
        };
        tracing::info!(remote, url = %url, "using remote profile");
        self.client.set_base_url(url);
        Ok(())
    }

    /// `create X` invokes `X`, `search X` and `delete X` their suffixed
    /// routes. A route literally named after a verb takes precedence.
    fn resolve_operation<'a>(&self, tokens: &[&'a str]) -> (String, Vec<&'a str>) {
        match tokens {
            [verb, object, args @ ..] if self.client.route(verb).is_none() => match *verb {
                "create" => ((*object).to_owned(), args.to_vec()),
                "search" => (format!("{object}_search"), args.to_vec()),
                "delete" => (format!("{object}_delete"), args.to_vec()),
                _ => ((*verb).to_owned(), tokens[1..].to_vec()),
            },
            [op, args @ ..] => ((*op).to_owned(), args.to_vec()),
            [] => (String::new(), Vec::new()),
        }
    }

    /// One argument list per invocation, in the order the inputs were given.
    ///
    /// File-like tokens are data sources and every document they hold is a
    /// separate invocation. The remaining tokens are scalars shared by all
    /// of them, placed ahead of the document.
    fn gather_inputs(&self, route: &RouteSpec, args: Vec<&str>) -> Result<Vec<Vec<Value>>, RunError> {
        let read_files = !route.attributes.dont_read_files;
        let (sources, scalars): (Vec<&str>, Vec<&str>) = args
            .into_iter()
            .partition(|a| read_files && is_file_like(a));
        let scalars: Vec<Value> = scalars
            .into_iter()
            .map(|a| Value::String(a.to_owned()))
            .collect();

        if !sources.is_empty() {
            let mut inputs = Vec::new();
            for source in sources {
                for doc in self.load_source(source)? {
                    let mut values = scalars.clone();
                    values.push(doc);
                    inputs.push(values);
                }
            }
            return Ok(inputs);
        }

        let mut values = scalars;
        if read_files {
            if let Some(text) = read_piped(self.stdin.as_ref()).map_err(RunError::StdinRead)? {
                values.push(parse_document(&text, "<stdin>")?);
            }
        }
        Ok(vec![values])
    }

    /// Documents named by a file-like token: a local file, a remote file, or
    /// every remote file matching a glob.
    fn load_source(&self, token: &str) -> Result<Vec<Value>, RunError> {
        if Path::new(token).is_file() {
            let text = std::fs::read_to_string(token).map_err(|source| RunError::FileRead {
                path: token.into(),
                source,
            })?;
            return Ok(vec![parse_document(&text, token)?]);
        }

        let Some((host, path)) = split_remote(token) else {
            return Ok(Vec::new());
        };
        let paths = if is_glob(path) {
            let matches = self.remote.list_glob(host, path)?;
            tracing::info!(host, pattern = path, matches = matches.len(), "expanded remote glob");
            matches
        } else {
            vec![path.to_owned()]
        };

        paths
            .iter()
            .map(|p| -> Result<Value, RunError> {
                let bytes = self.remote.read_file(host, p)?;
                parse_document(&String::from_utf8_lossy(&bytes), &format!("{host}:{p}"))
            })
            .collect()
    }

    fn finish(
        &mut self,
        route: &RouteSpec,
        reply: Option<Reply>,
        report: &mut RunReport,
    ) -> Result<(), RunError> {
        report.invocations += 1;
        let ok = render_outcome(
            self.out.as_mut(),
            reply.as_ref(),
            self.client.last_exchange(),
            route.attributes.quiet_post,
        )?;
        if !ok {
            report.failures += 1;
        }
        Ok(())
    }

    fn print_usage(&mut self) -> Result<(), RunError> {
        let registry = self.client.registry();
        let client_type = self.client.client_type();
        let text = usage(
            &self.app,
            &registry.list_routes(client_type),
            &registry.list_objects(client_type),
        );
        self.out
            .write_all(text.as_bytes())
            .map_err(RunError::Output)
    }

    fn print_route_help(&mut self, name: &str) -> Result<(), RunError> {
        let Some(route) = self.client.route(name) else {
            self.print_usage()?;
            return Err(RunError::UnrecognizedOperation(name.to_owned()));
        };
        let text = route_help(route);
        self.out
            .write_all(text.as_bytes())
            .map_err(RunError::Output)
    }
}

fn is_file_like(token: &str) -> bool {
    Path::new(token).is_file() || split_remote(token).is_some()
}

fn parse_document(text: &str, origin: &str) -> Result<Value, RunError> {
    serde_yaml::from_str(text).map_err(|source| RunError::InvalidYaml {
        origin: origin.to_owned(),
        source,
    })
}
