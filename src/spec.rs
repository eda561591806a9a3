//! Route declarations → internal IR
//!
//! Holds the route and argument model the registry stores, and parses
//! declarative route documents (YAML or JSON) into it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::DeclarationError;
use crate::object::ResponseFactory;

/// HTTP method of a declared route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "delete")]
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a named argument takes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ArgType {
    /// `--name` with no value; binds to `true`.
    #[default]
    Flag,
    /// `--name value` or `--name=value`.
    String,
}

impl TryFrom<String> for ArgType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "" | "!" | "flag" => Ok(Self::Flag),
            "=s" | ":s" | "s" | "string" => Ok(Self::String),
            other => Err(format!("unsupported argument type {other:?}")),
        }
    }
}

/// How an argument consumes bare (unflagged) tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Positional {
    /// Exactly the next remaining token.
    One,
    /// Every remaining token, as a sequence.
    Many,
}

/// Transform applied to a bound value before dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preprocess {
    /// Filename (or `-` for stdin) → parsed YAML document.
    YamlDocument,
    /// Filename (or `-` for stdin) → sequence of lines.
    LineList,
    /// Date/time string → ISO-8601.
    Datetime,
}

/// Where an argument lands in the request URL instead of the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlPlacement {
    /// Appended as `/value` path segment(s).
    #[serde(alias = "append")]
    Path,
    /// Added as `name=value` query pair(s).
    Query,
}

/// One named or positional parameter of a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct ArgSpec {
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_alt")]
    pub alt: Vec<String>,
    #[serde(default, rename = "type")]
    pub arg_type: ArgType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub positional: Option<Positional>,
    #[serde(default)]
    pub preprocess: Option<Preprocess>,
    #[serde(default)]
    pub modifies_url: Option<UrlPlacement>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub doc: String,
}

impl ArgSpec {
    fn new(name: impl Into<String>, arg_type: ArgType) -> Self {
        Self {
            name: name.into(),
            alt: Vec::new(),
            arg_type,
            required: false,
            positional: None,
            preprocess: None,
            modifies_url: None,
            default: None,
            doc: String::new(),
        }
    }

    /// A string-valued argument (`--name value`).
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::String)
    }

    /// A flag (`--name`).
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Flag)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Add alternate names. `"n|nm"` adds both `n` and `nm`.
    pub fn alt(mut self, names: &str) -> Self {
        self.alt
            .extend(names.split('|').filter(|s| !s.is_empty()).map(str::to_owned));
        self
    }

    pub fn positional(mut self, positional: Positional) -> Self {
        self.positional = Some(positional);
        self
    }

    pub fn preprocess(mut self, preprocess: Preprocess) -> Self {
        self.preprocess = Some(preprocess);
        self
    }

    pub fn modifies_url(mut self, placement: UrlPlacement) -> Self {
        self.modifies_url = Some(placement);
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Whether `name` is the canonical name or one of the alternates.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.alt.iter().any(|a| a == name)
    }

    pub fn is_flag(&self) -> bool {
        self.arg_type == ArgType::Flag
    }
}

fn deserialize_alt<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Alt {
        Joined(String),
        List(Vec<String>),
    }

    let names = match Alt::deserialize(deserializer)? {
        Alt::Joined(s) => s.split('|').map(str::to_owned).collect(),
        Alt::List(list) => list,
    };
    Ok(names.into_iter().filter(|s| !s.is_empty()).collect())
}

/// Check the invariants of one route's `args`.
pub fn validate_args(route: &str, args: &[ArgSpec]) -> Result<(), DeclarationError> {
    let invalid = |reason: String| DeclarationError::InvalidArgs {
        route: route.to_string(),
        reason,
    };

    let mut seen = HashSet::new();
    for spec in args {
        if spec.name.is_empty() {
            return Err(invalid("argument with an empty name".into()));
        }
        for name in std::iter::once(&spec.name).chain(&spec.alt) {
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("name {name:?} is declared twice")));
            }
        }
    }

    let positionals: Vec<&ArgSpec> = args.iter().filter(|a| a.positional.is_some()).collect();
    let many = positionals
        .iter()
        .filter(|a| a.positional == Some(Positional::Many))
        .count();
    if many > 1 {
        return Err(invalid("more than one argument takes many positionals".into()));
    }
    if let Some((last, rest)) = positionals.split_last() {
        if let Some(early) = rest
            .iter()
            .find(|a| a.positional == Some(Positional::Many))
        {
            return Err(invalid(format!(
                "{} takes many positionals but {} follows it",
                early.name, last.name
            )));
        }
    }

    Ok(())
}

/// Known per-route metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct RouteAttributes {
    /// Argument specification; `None` for legacy positional-only routes.
    pub args: Option<Vec<ArgSpec>>,
    /// Long description shown in per-route help.
    pub description: Option<String>,
    /// Never treat trailing CLI tokens or stdin as input documents.
    pub dont_read_files: bool,
    /// Print a condensed status line after a POST instead of the payload.
    pub quiet_post: bool,
}

/// One value for [`Registry::set_attribute`](crate::Registry::set_attribute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAttribute {
    Args(Vec<ArgSpec>),
    Description(String),
    DontReadFiles(bool),
    QuietPost(bool),
}

/// A declared operation.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct RouteSpec {
    /// Unique within a client type (e.g. "widget_search")
    pub name: String,
    /// Declared method; a structured payload at call time forces POST
    pub method: HttpMethod,
    /// Base path (e.g. "/widget")
    pub url: String,
    /// Wrapper applied to the decoded body
    pub response_type: Option<ResponseFactory>,
    /// Summary text for help
    pub doc: Option<String>,
    pub attributes: RouteAttributes,
}

impl RouteSpec {
    pub fn new(name: impl Into<String>, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            url: url.into(),
            response_type: None,
            doc: None,
            attributes: RouteAttributes::default(),
        }
    }

    pub fn response_type(mut self, factory: ResponseFactory) -> Self {
        self.response_type = Some(factory);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn args(&self) -> Option<&[ArgSpec]> {
        self.attributes.args.as_deref()
    }

    /// The ArgSpec a bound name belongs to.
    pub fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args()?.iter().find(|a| a.name == name)
    }
}

/// An object declaration: the GET/POST route plus its `_delete` companion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct ObjectSpec {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub doc: Option<String>,
}

/// A route as written in a declarative route document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct RouteDecl {
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    pub url: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<ArgSpec>>,
    #[serde(default)]
    pub dont_read_files: bool,
    #[serde(default)]
    pub quiet_post: bool,
}

impl RouteDecl {
    pub(crate) fn attribute_values(&self) -> Vec<RouteAttribute> {
        let mut attrs = Vec::new();
        if let Some(args) = &self.args {
            attrs.push(RouteAttribute::Args(args.clone()));
        }
        if let Some(description) = &self.description {
            attrs.push(RouteAttribute::Description(description.clone()));
        }
        if self.dont_read_files {
            attrs.push(RouteAttribute::DontReadFiles(true));
        }
        if self.quiet_post {
            attrs.push(RouteAttribute::QuietPost(true));
        }
        attrs
    }
}

/// Parsed declarative route document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct RouteDocument {
    #[serde(default)]
    pub objects: Vec<ObjectSpec>,
    #[serde(default)]
    pub routes: Vec<RouteDecl>,
}

/// Extract route and object declarations from a document.
pub fn extract_routes(doc: &Value) -> Result<RouteDocument, DeclarationError> {
    if doc.is_null() {
        return Ok(RouteDocument::default());
    }
    RouteDocument::deserialize(doc).map_err(DeclarationError::InvalidDocument)
}
