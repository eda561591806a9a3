//! Call arguments → HTTP request dispatch
//!
//! Looks up a route, binds the call's arguments, builds the request, runs it
//! on the configured transport and decodes the response. The latest exchange
//! is retained on the client whatever its outcome.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::bind::{Binder, Binding, BoundArgs, CallStyle};
use crate::error::{ClientError, TransportError};
use crate::object::{ClientHandle, ClientInfo, Reply};
use crate::registry::Registry;
use crate::spec::{HttpMethod, RouteSpec, UrlPlacement};
use crate::transport::{
    AsyncTransport, BlockingTransport, HttpRequest, HttpResponse, Transport,
    DEFAULT_IDLE_TIMEOUT,
};

/// Completion callback of an asynchronous call: the decoded body (`true` for
/// an empty one) on success, `None` on failure.
pub type Callback = Box<dyn FnOnce(Option<Value>) + Send>;

/// One call-site argument.
pub enum CallArg {
    /// Scalars become path segments (or tokens, for routes with `args`);
    /// objects and arrays become the JSON body.
    Value(Value),
    Callback(Callback),
}

impl CallArg {
    pub fn callback(f: impl FnOnce(Option<Value>) + Send + 'static) -> Self {
        Self::Callback(Box::new(f))
    }
}

impl fmt::Debug for CallArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

impl From<Value> for CallArg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for CallArg {
    fn from(s: &str) -> Self {
        Self::Value(Value::String(s.to_owned()))
    }
}

impl From<String> for CallArg {
    fn from(s: String) -> Self {
        Self::Value(Value::String(s))
    }
}

impl From<i32> for CallArg {
    fn from(n: i32) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<i64> for CallArg {
    fn from(n: i64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<u64> for CallArg {
    fn from(n: u64) -> Self {
        Self::Value(Value::from(n))
    }
}

impl From<bool> for CallArg {
    fn from(b: bool) -> Self {
        Self::Value(Value::Bool(b))
    }
}

/// Construction-time settings of a client.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    /// Prefix of every route URL (e.g. "https://api.example.com")
    pub base_url: String,
    /// Idle timeout handed to the transport
    pub idle_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

/// The latest request a client attempted and how it ended.
#[derive(Debug)]
pub struct Exchange {
    pub method: HttpMethod,
    pub url: String,
    pub outcome: Result<HttpResponse, TransportError>,
}

struct Prepared {
    request: HttpRequest,
    callback: Option<Callback>,
}

/// Invokes the routes of one client type.
pub struct RestClient {
    registry: Arc<Registry>,
    handle: ClientHandle,
    transport: Option<Box<dyn Transport>>,
    async_transport: Option<Box<dyn AsyncTransport>>,
    binder: Binder,
    last: Option<Exchange>,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("client_type", &self.handle.client_type)
            .field("base_url", &self.handle.base_url)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// A client with no transport; add one with [`with_transport`](Self::with_transport)
    /// or [`with_async_transport`](Self::with_async_transport).
    pub fn new(
        registry: Arc<Registry>,
        client_type: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            handle: Arc::new(ClientInfo {
                client_type: client_type.into(),
                base_url: base_url.into(),
            }),
            transport: None,
            async_transport: None,
            binder: Binder::new(),
            last: None,
        }
    }

    /// A client on the blocking reqwest transport.
    pub fn connect(
        registry: Arc<Registry>,
        client_type: impl Into<String>,
        config: &ClientConfig,
    ) -> Result<Self, TransportError> {
        let transport = BlockingTransport::new(config.idle_timeout)?;
        Ok(Self::new(registry, client_type, config.base_url.clone()).with_transport(transport))
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn with_async_transport(mut self, transport: impl AsyncTransport + 'static) -> Self {
        self.async_transport = Some(Box::new(transport));
        self
    }

    pub fn with_binder(mut self, binder: Binder) -> Self {
        self.binder = binder;
        self
    }

    pub fn client_type(&self) -> &str {
        &self.handle.client_type
    }

    pub fn base_url(&self) -> &str {
        &self.handle.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.handle = Arc::new(ClientInfo {
            client_type: self.handle.client_type.clone(),
            base_url: base_url.into(),
        });
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// The declared route `name` of this client's type.
    pub fn route(&self, name: &str) -> Option<&RouteSpec> {
        self.registry.route(&self.handle.client_type, name)
    }

    /// The latest attempted exchange.
    pub fn last_exchange(&self) -> Option<&Exchange> {
        self.last.as_ref()
    }

    /// The latest received response, if the latest exchange got one.
    pub fn last_response(&self) -> Option<&HttpResponse> {
        self.last.as_ref().and_then(|e| e.outcome.as_ref().ok())
    }

    /// Invoke `name` and block until the exchange completes.
    ///
    /// Non-2xx responses and transport failures yield `Ok(None)`; the
    /// detail is in [`last_exchange`](Self::last_exchange).
    pub fn call(&mut self, name: &str, args: Vec<CallArg>) -> Result<Option<Reply>, ClientError> {
        let registry = Arc::clone(&self.registry);
        let route = self.lookup(&registry, name)?;
        let prepared = self.prepare(route, args)?;
        if prepared.callback.is_some() {
            return Err(ClientError::CallbackOnBlockingCall);
        }
        self.execute(route, prepared.request)
    }

    /// Invoke `name` with arguments already bound by a [`Binder`].
    pub fn call_bound(
        &mut self,
        name: &str,
        bound: &BoundArgs,
    ) -> Result<Option<Reply>, ClientError> {
        let registry = Arc::clone(&self.registry);
        let route = self.lookup(&registry, name)?;
        let request = build_bound_request(self.base_url(), route, bound)?;
        self.execute(route, request)
    }

    /// Invoke `name` without blocking the caller's runtime.
    ///
    /// A [`CallArg::Callback`] among the arguments is invoked with the
    /// result after the retained exchange has been updated.
    pub async fn call_async(
        &mut self,
        name: &str,
        args: Vec<CallArg>,
    ) -> Result<Option<Reply>, ClientError> {
        let registry = Arc::clone(&self.registry);
        let route = self.lookup(&registry, name)?;
        let prepared = self.prepare(route, args)?;
        let transport = self
            .async_transport
            .as_ref()
            .ok_or(ClientError::NoTransport("asynchronous"))?;

        tracing::debug!(method = %prepared.request.method, url = %prepared.request.url, "dispatching request");
        let outcome = transport.execute(prepared.request.clone()).await;
        let result = self.record(prepared.request, outcome);
        if let Some(callback) = prepared.callback {
            callback(result.clone());
        }
        Ok(result.map(|v| self.wrap(route, v)))
    }

    fn lookup<'r>(&self, registry: &'r Registry, name: &str) -> Result<&'r RouteSpec, ClientError> {
        registry
            .route(&self.handle.client_type, name)
            .ok_or_else(|| ClientError::UnknownOperation {
                client_type: self.handle.client_type.clone(),
                name: name.to_owned(),
            })
    }

    fn prepare(&self, route: &RouteSpec, args: Vec<CallArg>) -> Result<Prepared, ClientError> {
        let mut values = Vec::with_capacity(args.len());
        let mut callback = None;
        for arg in args {
            match arg {
                CallArg::Value(v) => values.push(v),
                CallArg::Callback(f) => {
                    if callback.replace(f).is_some() {
                        return Err(ClientError::MultipleCallbacks);
                    }
                }
            }
        }

        let request = match self.binder.bind(route, values, CallStyle::Programmatic)? {
            Binding::PassThrough(values) => build_request(self.base_url(), route, values)?,
            Binding::Bound(bound) => build_bound_request(self.base_url(), route, &bound)?,
        };
        Ok(Prepared { request, callback })
    }

    fn execute(
        &mut self,
        route: &RouteSpec,
        request: HttpRequest,
    ) -> Result<Option<Reply>, ClientError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or(ClientError::NoTransport("blocking"))?;

        tracing::debug!(method = %request.method, url = %request.url, "dispatching request");
        let outcome = transport.execute(request.clone());
        let result = self.record(request, outcome);
        Ok(result.map(|v| self.wrap(route, v)))
    }

    /// Retain the exchange and decode its body when it succeeded.
    fn record(
        &mut self,
        request: HttpRequest,
        outcome: Result<HttpResponse, TransportError>,
    ) -> Option<Value> {
        let result = match &outcome {
            Ok(resp) if resp.is_success() => Some(decode_body(resp)),
            Ok(resp) => {
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    status = resp.status.as_u16(),
                    "request failed: {}",
                    resp.status_message()
                );
                None
            }
            Err(err) => {
                tracing::warn!(method = %request.method, url = %request.url, error = %err, "request failed");
                None
            }
        };
        self.last = Some(Exchange {
            method: request.method,
            url: request.url,
            outcome,
        });
        result
    }

    fn wrap(&self, route: &RouteSpec, value: Value) -> Reply {
        match route.response_type {
            Some(factory) => Reply::Object(factory(value, Arc::clone(&self.handle))),
            None => Reply::Value(value),
        }
    }
}

fn route_url(base_url: &str, route: &RouteSpec) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{}{}", base, route.url)
}

/// Build a request from positional call arguments: structured values are
/// the JSON body (forcing POST), scalars are appended as path segments.
pub fn build_request(
    base_url: &str,
    route: &RouteSpec,
    values: Vec<Value>,
) -> Result<HttpRequest, ClientError> {
    let mut url = route_url(base_url, route);
    let mut payload = None;

    for value in values {
        match value {
            Value::Null => {}
            Value::Object(_) | Value::Array(_) => {
                if payload.replace(value).is_some() {
                    return Err(ClientError::MultiplePayloads);
                }
            }
            scalar => {
                url.push('/');
                url.push_str(&urlencoding::encode(&scalar_text(&scalar)));
            }
        }
    }

    finish_request(route.method, url, payload)
}

/// Build a request from bound arguments.
///
/// `modifies_url` arguments go to the path or query string. The others keep
/// the declared method: on a POST route they form the JSON object body, on
/// GET or DELETE scalars join the query string. A structured value always
/// goes to the body, which forces POST.
pub fn build_bound_request(
    base_url: &str,
    route: &RouteSpec,
    bound: &BoundArgs,
) -> Result<HttpRequest, ClientError> {
    let mut url = route_url(base_url, route);
    let mut query = Vec::new();
    let mut body = Map::new();

    for (name, value) in bound {
        match route.arg(name).and_then(|a| a.modifies_url) {
            Some(UrlPlacement::Path) => {
                for segment in segments(value) {
                    url.push('/');
                    url.push_str(&urlencoding::encode(&segment));
                }
            }
            Some(UrlPlacement::Query) => {
                for v in segments(value) {
                    query.push(format!(
                        "{}={}",
                        urlencoding::encode(name),
                        urlencoding::encode(&v)
                    ));
                }
            }
            None if route.method == HttpMethod::Post || is_structured(value) => {
                body.insert(name.clone(), value.clone());
            }
            None => {
                for v in segments(value) {
                    query.push(format!(
                        "{}={}",
                        urlencoding::encode(name),
                        urlencoding::encode(&v)
                    ));
                }
            }
        }
    }

    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    let payload = (!body.is_empty()).then_some(Value::Object(body));
    finish_request(route.method, url, payload)
}

fn finish_request(
    method: HttpMethod,
    url: String,
    payload: Option<Value>,
) -> Result<HttpRequest, ClientError> {
    match payload {
        Some(payload) => Ok(HttpRequest {
            method: HttpMethod::Post,
            url,
            headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
            body: Some(serde_json::to_vec(&payload).map_err(ClientError::EncodeBody)?),
        }),
        None => Ok(HttpRequest {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn segments(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        other => vec![scalar_text(other)],
    }
}

/// Maps, or sequences holding maps or sequences. A flat list of scalars can
/// still be spelled as repeated query pairs.
fn is_structured(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items
            .iter()
            .any(|v| matches!(v, Value::Object(_) | Value::Array(_))),
        _ => false,
    }
}

/// JSON bodies decode to structured values, anything else to text. An
/// empty body is reported as `true`.
fn decode_body(resp: &HttpResponse) -> Value {
    if resp.body.is_empty() {
        return Value::Bool(true);
    }
    if resp.is_json() {
        serde_json::from_slice(&resp.body).unwrap_or_else(|_| Value::String(resp.text()))
    } else {
        Value::String(resp.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::GenericObject;
    use crate::spec::{ArgSpec, Positional, RouteAttribute};
    use crate::transport::AsyncHttpTransport;
    use serde_json::json;
    use std::sync::Mutex;

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry
            .register_route("Api", RouteSpec::new("status", HttpMethod::Get, "/status"))
            .unwrap();
        registry
            .register_object("Api", "obj", "/obj", Some("Objects"))
            .unwrap();
        registry
            .register_route(
                "Api",
                RouteSpec::new("wrapped", HttpMethod::Get, "/wrapped")
                    .response_type(GenericObject::wrap),
            )
            .unwrap();
        registry
            .register_route("Api", RouteSpec::new("search", HttpMethod::Get, "/things"))
            .unwrap();
        registry
            .set_attribute(
                "Api",
                "search",
                RouteAttribute::Args(vec![
                    ArgSpec::string("kind")
                        .positional(Positional::One)
                        .modifies_url(UrlPlacement::Path),
                    ArgSpec::string("color").modifies_url(UrlPlacement::Query),
                    ArgSpec::flag("all").modifies_url(UrlPlacement::Query),
                    ArgSpec::string("note"),
                ]),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn client(server: &mockito::Server) -> RestClient {
        RestClient::connect(registry(), "Api", &ClientConfig::new(server.url())).unwrap()
    }

    #[test]
    fn call_without_arguments_gets_route_url() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create();

        let mut client = client(&server);
        let reply = client.call("status", Vec::new()).unwrap().unwrap();
        assert_eq!(reply.value(), &json!({"ok": true}));
        mock.assert();

        let exchange = client.last_exchange().unwrap();
        assert_eq!(exchange.method, HttpMethod::Get);
        assert_eq!(exchange.url, format!("{}/status", server.url()));
    }

    #[test]
    fn call_appends_scalars_and_posts_payload() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/obj/a/7")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({"set": "v"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"a"}"#)
            .create();

        let mut client = client(&server);
        let reply = client
            .call("obj", vec!["a".into(), 7.into(), json!({"set": "v"}).into()])
            .unwrap();
        assert_eq!(reply.unwrap().value()["id"], "a");
        mock.assert();
    }

    #[test]
    fn payload_forces_post_on_delete_route() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/obj")
            .with_status(200)
            .with_body("")
            .create();

        let mut client = client(&server);
        client
            .call("obj_delete", vec![json!({"id": 1}).into()])
            .unwrap();
        mock.assert();
        assert_eq!(client.last_exchange().unwrap().method, HttpMethod::Post);
    }

    #[test]
    fn delete_route_without_payload_deletes() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("DELETE", "/obj/a")
            .with_status(204)
            .create();

        let mut client = client(&server);
        let reply = client.call("obj_delete", vec!["a".into()]).unwrap();
        assert_eq!(reply.unwrap().value(), &json!(true));
        mock.assert();
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/obj/hello%20world")
            .with_status(200)
            .with_body("x")
            .create();

        let mut client = client(&server);
        client.call("obj", vec!["hello world".into()]).unwrap();
        mock.assert();
    }

    #[test]
    fn non_success_status_yields_none_and_retains_response() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/status")
            .with_status(404)
            .with_body("not found")
            .create();

        let mut client = client(&server);
        let reply = client.call("status", Vec::new()).unwrap();
        assert!(reply.is_none());

        let resp = client.last_response().unwrap();
        assert_eq!(resp.status.as_u16(), 404);
        assert_eq!(resp.status_message(), "Not Found");
        assert_eq!(resp.text(), "not found");
    }

    #[test]
    fn non_json_response_is_returned_as_text() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("plain text response")
            .create();

        let mut client = client(&server);
        let reply = client.call("status", Vec::new()).unwrap().unwrap();
        assert_eq!(reply.into_value(), Value::String("plain text response".into()));
    }

    #[test]
    fn response_type_wraps_decoded_body() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/wrapped")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"n":1}"#)
            .create();

        let mut client = client(&server);
        match client.call("wrapped", Vec::new()).unwrap().unwrap() {
            Reply::Object(obj) => {
                assert_eq!(obj.data(), &json!({"n": 1}));
                assert_eq!(obj.client().client_type, "Api");
                assert_eq!(obj.client().base_url, server.url());
            }
            Reply::Value(v) => panic!("expected wrapped reply, got {v:?}"),
        }
    }

    #[test]
    fn transport_failure_yields_none_and_retains_error() {
        let mut client =
            RestClient::connect(registry(), "Api", &ClientConfig::new("http://127.0.0.1:1"))
                .unwrap();
        let reply = client.call("status", Vec::new()).unwrap();
        assert!(reply.is_none());
        assert!(client.last_response().is_none());
        assert!(client.last_exchange().unwrap().outcome.is_err());
    }

    #[test]
    fn unknown_operation_is_an_error() {
        let server = mockito::Server::new();
        let mut client = client(&server);
        let err = client.call("nope", Vec::new()).unwrap_err();
        assert!(matches!(err, ClientError::UnknownOperation { .. }));
        assert!(client.last_exchange().is_none());
    }

    #[test]
    fn two_payloads_are_rejected() {
        let server = mockito::Server::new();
        let mut client = client(&server);
        let err = client
            .call("obj", vec![json!({"a": 1}).into(), json!({"b": 2}).into()])
            .unwrap_err();
        assert!(matches!(err, ClientError::MultiplePayloads));
    }

    #[test]
    fn callback_requires_async_call() {
        let server = mockito::Server::new();
        let mut client = client(&server);
        let err = client
            .call("status", vec![CallArg::callback(|_| {})])
            .unwrap_err();
        assert!(matches!(err, ClientError::CallbackOnBlockingCall));
    }

    #[test]
    fn bound_arguments_on_get_route_fill_path_and_query() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/things/gear")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("color".into(), "dark red".into()),
                mockito::Matcher::UrlEncoded("all".into(), "true".into()),
                mockito::Matcher::UrlEncoded("note".into(), "hi".into()),
            ]))
            .match_body(mockito::Matcher::Missing)
            .with_status(200)
            .with_body("ok")
            .create();

        let mut client = client(&server);
        client
            .call(
                "search",
                vec![
                    "gear".into(),
                    "color".into(),
                    "dark red".into(),
                    "all".into(),
                    "note".into(),
                    "hi".into(),
                ],
            )
            .unwrap();
        assert_eq!(client.last_exchange().unwrap().method, HttpMethod::Get);
        mock.assert();
    }

    #[test]
    fn bound_arguments_on_post_route_form_the_body() {
        let mut route = RouteSpec::new("note", HttpMethod::Post, "/notes");
        route.attributes.args = Some(vec![
            ArgSpec::string("topic").modifies_url(UrlPlacement::Path),
            ArgSpec::string("text"),
        ]);
        let bound = vec![
            ("topic".to_string(), json!("ops")),
            ("text".to_string(), json!("hello")),
        ];
        let request = build_bound_request("http://x", &route, &bound).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://x/notes/ops");
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"text": "hello"}));
    }

    #[test]
    fn structured_bound_argument_forces_post() {
        let route = registry().route("Api", "search").unwrap().clone();
        let bound = vec![
            ("kind".to_string(), json!("gear")),
            ("note".to_string(), json!({"lines": ["a", "b"]})),
        ];
        let request = build_bound_request("http://x", &route, &bound).unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://x/things/gear");
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"note": {"lines": ["a", "b"]}}));
    }

    #[test]
    fn scalar_list_on_get_route_repeats_query_pairs() {
        let route = registry().route("Api", "search").unwrap().clone();
        let bound = vec![("note".to_string(), json!(["a", "b c"]))];
        let request = build_bound_request("http://x", &route, &bound).unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "http://x/things?note=a&note=b%20c");
        assert!(request.body.is_none());
    }

    #[test]
    fn bound_arguments_without_body_keep_declared_method() {
        let route = registry().route("Api", "search").unwrap().clone();
        let bound = vec![
            ("kind".to_string(), json!("gear")),
            ("color".to_string(), json!("red")),
        ];
        let request = build_bound_request("http://x/", &route, &bound).unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url, "http://x/things/gear?color=red");
        assert!(request.body.is_none());
    }

    #[test]
    fn build_request_without_base_url_uses_template() {
        let route = RouteSpec::new("status", HttpMethod::Get, "/status");
        let request = build_request("", &route, vec![json!("a"), json!(true)]).unwrap();
        assert_eq!(request.url, "/status/a/true");
        assert_eq!(request.method, HttpMethod::Get);
    }

    #[test]
    fn call_bound_rejects_unknown_operation() {
        let server = mockito::Server::new();
        let mut client = client(&server);
        let err = client.call_bound("nope", &Vec::new()).unwrap_err();
        assert!(matches!(err, ClientError::UnknownOperation { .. }));
    }

    #[tokio::test]
    async fn call_async_invokes_callback_with_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"up":1}"#)
            .create_async()
            .await;

        let mut client = RestClient::new(registry(), "Api", server.url())
            .with_async_transport(AsyncHttpTransport::new(DEFAULT_IDLE_TIMEOUT).unwrap());
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let reply = client
            .call_async(
                "status",
                vec![CallArg::callback(move |v| *sink.lock().unwrap() = Some(v))],
            )
            .await
            .unwrap();

        assert_eq!(reply.unwrap().value(), &json!({"up": 1}));
        assert_eq!(*seen.lock().unwrap(), Some(Some(json!({"up": 1}))));
        assert_eq!(client.last_response().unwrap().status.as_u16(), 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn call_async_reports_failure_to_callback() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/status")
            .with_status(500)
            .create_async()
            .await;

        let mut client = RestClient::new(registry(), "Api", server.url())
            .with_async_transport(AsyncHttpTransport::new(DEFAULT_IDLE_TIMEOUT).unwrap());
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let reply = client
            .call_async(
                "status",
                vec![CallArg::callback(move |v| *sink.lock().unwrap() = Some(v))],
            )
            .await
            .unwrap();

        assert!(reply.is_none());
        assert_eq!(*seen.lock().unwrap(), Some(None));
        assert_eq!(client.last_response().unwrap().status.as_u16(), 500);
    }

    #[tokio::test]
    async fn call_async_without_async_transport_fails() {
        let mut client = RestClient::new(registry(), "Api", "http://x");
        let err = client.call_async("status", Vec::new()).await.unwrap_err();
        assert!(matches!(err, ClientError::NoTransport("asynchronous")));
    }
}
