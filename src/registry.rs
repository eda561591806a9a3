//! Route/object registry.
//!
//! Declarations are made once per client type while the registry is
//! exclusively owned; afterwards it is shared read-only (behind an `Arc`,
//! or installed process-wide with [`Registry::install`]).

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::error::DeclarationError;
use crate::spec::{
    extract_routes, validate_args, HttpMethod, ObjectSpec, RouteAttribute, RouteAttributes,
    RouteSpec,
};

static GLOBAL: OnceCell<Arc<Registry>> = OnceCell::new();

/// Suffix of the DELETE route an object declaration adds.
pub const DELETE_SUFFIX: &str = "_delete";

#[derive(Debug, Default)]
struct ClientRoutes {
    routes: Vec<RouteSpec>,
    index: HashMap<String, usize>,
    objects: Vec<ObjectSpec>,
}

/// Catalog of declared routes, keyed by client type and route name.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<String, ClientRoutes>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `self` as the process-wide registry. Only the first call
    /// succeeds; every later one fails with `AlreadyInstalled`.
    pub fn install(self) -> Result<Arc<Registry>, DeclarationError> {
        let shared = Arc::new(self);
        GLOBAL
            .set(Arc::clone(&shared))
            .map_err(|_| DeclarationError::AlreadyInstalled)?;
        Ok(shared)
    }

    /// The process-wide registry, if one was installed.
    pub fn global() -> Option<Arc<Registry>> {
        GLOBAL.get().cloned()
    }

    /// Declare a route.
    ///
    /// Re-declaring the same name with the same method and URL is allowed;
    /// the later doc and response type replace the earlier ones. A different
    /// method or URL is a conflict.
    pub fn register_route(
        &mut self,
        client_type: &str,
        route: RouteSpec,
    ) -> Result<(), DeclarationError> {
        let client = self.clients.entry(client_type.to_owned()).or_default();

        if let Some(&i) = client.index.get(&route.name) {
            let existing = &mut client.routes[i];
            if existing.method != route.method || existing.url != route.url {
                return Err(DeclarationError::ConflictingRoute {
                    client_type: client_type.to_owned(),
                    name: route.name,
                    existing: format!("{} {}", existing.method, existing.url),
                });
            }
            if route.doc.is_some() {
                existing.doc = route.doc;
            }
            if route.response_type.is_some() {
                existing.response_type = route.response_type;
            }
            return Ok(());
        }

        tracing::debug!(client_type, route = %route.name, method = %route.method, url = %route.url, "declared route");
        client.index.insert(route.name.clone(), client.routes.len());
        client.routes.push(route);
        Ok(())
    }

    /// Declare an object: `name` (GET, or POST with a payload) and
    /// `name_delete` (DELETE), both on `url`.
    pub fn register_object(
        &mut self,
        client_type: &str,
        name: &str,
        url: &str,
        doc: Option<&str>,
    ) -> Result<(), DeclarationError> {
        let mut get = RouteSpec::new(name, HttpMethod::Get, url);
        let mut delete = RouteSpec::new(format!("{name}{DELETE_SUFFIX}"), HttpMethod::Delete, url);
        if let Some(doc) = doc {
            get = get.doc(doc);
            delete = delete.doc(format!("Delete: {doc}"));
        }
        self.register_route(client_type, get)?;
        self.register_route(client_type, delete)?;

        let client = self.clients.entry(client_type.to_owned()).or_default();
        let object = ObjectSpec {
            name: name.to_owned(),
            url: url.to_owned(),
            doc: doc.map(str::to_owned),
        };
        match client.objects.iter_mut().find(|o| o.name == name) {
            Some(existing) => *existing = object,
            None => client.objects.push(object),
        }
        Ok(())
    }

    /// Set one attribute of a declared route.
    pub fn set_attribute(
        &mut self,
        client_type: &str,
        name: &str,
        attribute: RouteAttribute,
    ) -> Result<(), DeclarationError> {
        let unknown = || DeclarationError::UnknownRoute {
            client_type: client_type.to_owned(),
            name: name.to_owned(),
        };
        let client = self.clients.get_mut(client_type).ok_or_else(unknown)?;
        let i = *client.index.get(name).ok_or_else(unknown)?;
        let route = &mut client.routes[i];

        match attribute {
            RouteAttribute::Args(args) => {
                validate_args(name, &args)?;
                route.attributes.args = Some(args);
            }
            RouteAttribute::Description(text) => route.attributes.description = Some(text),
            RouteAttribute::DontReadFiles(v) => route.attributes.dont_read_files = v,
            RouteAttribute::QuietPost(v) => route.attributes.quiet_post = v,
        }
        Ok(())
    }

    /// Attributes of a declared route.
    pub fn attributes(&self, client_type: &str, name: &str) -> Option<&RouteAttributes> {
        self.route(client_type, name).map(|r| &r.attributes)
    }

    /// Look up a declared route.
    pub fn route(&self, client_type: &str, name: &str) -> Option<&RouteSpec> {
        let client = self.clients.get(client_type)?;
        client.index.get(name).map(|&i| &client.routes[i])
    }

    /// Routes of a client type, in declaration order.
    pub fn list_routes(&self, client_type: &str) -> Vec<&RouteSpec> {
        self.clients
            .get(client_type)
            .map(|c| c.routes.iter().collect())
            .unwrap_or_default()
    }

    /// Objects of a client type, in declaration order.
    pub fn list_objects(&self, client_type: &str) -> Vec<&ObjectSpec> {
        self.clients
            .get(client_type)
            .map(|c| c.objects.iter().collect())
            .unwrap_or_default()
    }

    /// Declare everything in a route document (see [`extract_routes`]).
    pub fn declare(&mut self, client_type: &str, doc: &Value) -> Result<(), DeclarationError> {
        let parsed = extract_routes(doc)?;
        for object in &parsed.objects {
            self.register_object(client_type, &object.name, &object.url, object.doc.as_deref())?;
        }
        for decl in &parsed.routes {
            let mut route = RouteSpec::new(decl.name.clone(), decl.method, decl.url.clone());
            route.doc = decl.doc.clone();
            self.register_route(client_type, route)?;
            for attribute in decl.attribute_values() {
                self.set_attribute(client_type, &decl.name, attribute)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::GenericObject;
    use crate::spec::{ArgSpec, Positional};
    use serde_json::json;

    #[test]
    fn register_route_keeps_declaration_order() {
        let mut registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register_route("Api", RouteSpec::new(name, HttpMethod::Get, format!("/{name}")))
                .unwrap();
        }

        let names: Vec<&str> = registry
            .list_routes("Api")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn register_route_is_idempotent_and_last_doc_wins() {
        let mut registry = Registry::new();
        registry
            .register_route("Api", RouteSpec::new("status", HttpMethod::Get, "/status").doc("old"))
            .unwrap();
        registry
            .register_route(
                "Api",
                RouteSpec::new("status", HttpMethod::Get, "/status")
                    .doc("new")
                    .response_type(GenericObject::wrap),
            )
            .unwrap();

        assert_eq!(registry.list_routes("Api").len(), 1);
        let route = registry.route("Api", "status").unwrap();
        assert_eq!(route.doc.as_deref(), Some("new"));
        assert!(route.response_type.is_some());
    }

    #[test]
    fn register_route_rejects_conflicting_redeclaration() {
        let mut registry = Registry::new();
        registry
            .register_route("Api", RouteSpec::new("status", HttpMethod::Get, "/status"))
            .unwrap();
        let err = registry
            .register_route("Api", RouteSpec::new("status", HttpMethod::Post, "/status"))
            .unwrap_err();
        assert!(err.to_string().contains("already declared as GET /status"));
    }

    #[test]
    fn client_types_are_separate_namespaces() {
        let mut registry = Registry::new();
        registry
            .register_route("A", RouteSpec::new("status", HttpMethod::Get, "/a"))
            .unwrap();
        registry
            .register_route("B", RouteSpec::new("status", HttpMethod::Delete, "/b"))
            .unwrap();

        assert_eq!(registry.route("A", "status").unwrap().url, "/a");
        assert_eq!(registry.route("B", "status").unwrap().url, "/b");
        assert!(registry.route("C", "status").is_none());
        assert!(registry.list_routes("C").is_empty());
    }

    #[test]
    fn register_object_adds_get_and_delete_routes() {
        let mut registry = Registry::new();
        registry
            .register_object("Api", "widget", "/widget", Some("Widgets"))
            .unwrap();

        let get = registry.route("Api", "widget").unwrap();
        assert_eq!(get.method, HttpMethod::Get);
        assert_eq!(get.url, "/widget");
        let delete = registry.route("Api", "widget_delete").unwrap();
        assert_eq!(delete.method, HttpMethod::Delete);
        assert_eq!(delete.url, "/widget");

        let objects = registry.list_objects("Api");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].doc.as_deref(), Some("Widgets"));
    }

    #[test]
    fn set_attribute_requires_declared_route() {
        let mut registry = Registry::new();
        let err = registry
            .set_attribute("Api", "ghost", RouteAttribute::QuietPost(true))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::UnknownRoute { .. }));
    }

    #[test]
    fn set_attribute_stores_typed_values() {
        let mut registry = Registry::new();
        registry
            .register_route("Api", RouteSpec::new("foo", HttpMethod::Post, "/foo"))
            .unwrap();
        registry
            .set_attribute("Api", "foo", RouteAttribute::Args(vec![ArgSpec::string("name")]))
            .unwrap();
        registry
            .set_attribute("Api", "foo", RouteAttribute::Description("Foo it".into()))
            .unwrap();
        registry
            .set_attribute("Api", "foo", RouteAttribute::QuietPost(true))
            .unwrap();
        registry
            .set_attribute("Api", "foo", RouteAttribute::DontReadFiles(true))
            .unwrap();

        let attrs = registry.attributes("Api", "foo").unwrap();
        assert_eq!(attrs.args.as_ref().unwrap()[0].name, "name");
        assert_eq!(attrs.description.as_deref(), Some("Foo it"));
        assert!(attrs.quiet_post);
        assert!(attrs.dont_read_files);
    }

    #[test]
    fn set_attribute_validates_args() {
        let mut registry = Registry::new();
        registry
            .register_route("Api", RouteSpec::new("foo", HttpMethod::Get, "/foo"))
            .unwrap();
        let err = registry
            .set_attribute(
                "Api",
                "foo",
                RouteAttribute::Args(vec![
                    ArgSpec::string("a").positional(Positional::Many),
                    ArgSpec::string("b").positional(Positional::One),
                ]),
            )
            .unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidArgs { .. }));
        assert!(registry.attributes("Api", "foo").unwrap().args.is_none());
    }

    #[test]
    fn declare_registers_document() {
        let mut registry = Registry::new();
        registry
            .declare(
                "Api",
                &json!({
                    "objects": [{ "name": "widget", "url": "/widget" }],
                    "routes": [
                        { "name": "widget_search", "url": "/widget/search", "doc": "Find widgets",
                          "args": [{ "name": "color", "type": "=s", "modifies_url": "query" }] },
                        { "name": "upload", "method": "POST", "url": "/upload", "quiet_post": true }
                    ]
                }),
            )
            .unwrap();

        let names: Vec<&str> = registry
            .list_routes("Api")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, ["widget", "widget_delete", "widget_search", "upload"]);
        assert!(registry.attributes("Api", "upload").unwrap().quiet_post);
        assert_eq!(
            registry.route("Api", "widget_search").unwrap().args().unwrap()[0].name,
            "color"
        );
    }
}
