//! Typed parameter binding and handler invocation for routed endpoints.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use arena_contracts::Contract;
use axum::http::Method;
use chrono::NaiveDate;

use crate::config::WireFormat;
use crate::endpoints::{self, RequestContext};
use crate::error::ApiError;
use crate::routing::{RouteError, RouteTable};
use crate::wire::{self, RequestBody};

pub type Handler = fn(&RequestContext<'_>, &BoundParameters) -> Result<Reply, ApiError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Str,
    Bool,
    Date,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Int,
        }
    }

    pub const fn str(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Str,
        }
    }

    pub const fn bool(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
        }
    }

    pub const fn date(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Date,
        }
    }

    pub const fn body(name: &'static str) -> Self {
        Self {
            name,
            kind: ParamKind::Body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Str(String),
    Bool(bool),
    Date(NaiveDate),
    Body(RequestBody),
}

/// Values bound for one invocation. Parameters with no source are absent.
#[derive(Debug, Default)]
pub struct BoundParameters {
    values: HashMap<&'static str, ParamValue>,
}

impl BoundParameters {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn int(&self, name: &str) -> Option<i32> {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn require_int(&self, name: &str) -> Result<i32, ApiError> {
        self.int(name)
            .ok_or_else(|| ApiError::invalid_params(format!("missing parameter `{}`", name)))
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn require_str(&self, name: &str) -> Result<&str, ApiError> {
        self.str(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ApiError::invalid_params(format!("missing parameter `{}`", name)))
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ParamValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(ParamValue::Date(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn body(&self, name: &str) -> Result<&RequestBody, ApiError> {
        match self.values.get(name) {
            Some(ParamValue::Body(body)) => Ok(body),
            _ => Err(ApiError::invalid_params("request body is required")),
        }
    }
}

/// Raw inputs the binder draws from.
#[derive(Debug, Default)]
pub struct RawParameters<'a> {
    pub captures: &'a [(String, String)],
    pub query: &'a [(String, String)],
    pub body: Option<RequestBody>,
}

/// Binds each declared parameter in order: body, then path capture, then a
/// query key compared case-insensitively. A value that fails coercion
/// rejects the request.
pub fn bind(specs: &[ParamSpec], mut raw: RawParameters<'_>) -> Result<BoundParameters, ApiError> {
    let mut bound = BoundParameters::default();

    for spec in specs {
        if spec.kind == ParamKind::Body {
            if let Some(body) = raw.body.take() {
                bound.values.insert(spec.name, ParamValue::Body(body));
            }
            continue;
        }

        let source = raw
            .captures
            .iter()
            .find(|(name, _)| name == spec.name)
            .or_else(|| {
                raw.query
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(spec.name))
            })
            .map(|(_, value)| value.as_str());

        let Some(text) = source else {
            continue;
        };

        if let Some(value) = coerce(spec, text)? {
            bound.values.insert(spec.name, value);
        }
    }

    Ok(bound)
}

fn coerce(spec: &ParamSpec, text: &str) -> Result<Option<ParamValue>, ApiError> {
    let trimmed = text.trim();
    let invalid = || {
        ApiError::invalid_params(format!(
            "parameter `{}` could not be read as {}",
            spec.name,
            kind_name(spec.kind)
        ))
    };

    // An empty query value means the parameter was not supplied.
    if trimmed.is_empty() && spec.kind != ParamKind::Str {
        return Ok(None);
    }

    let value = match spec.kind {
        ParamKind::Int => ParamValue::Int(trimmed.parse::<i32>().map_err(|_| invalid())?),
        ParamKind::Str => ParamValue::Str(text.to_string()),
        ParamKind::Bool => ParamValue::Bool(match trimmed.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => return Err(invalid()),
        }),
        ParamKind::Date => ParamValue::Date(parse_date(trimmed).ok_or_else(invalid)?),
        ParamKind::Body => return Ok(None),
    };
    Ok(Some(value))
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

fn kind_name(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::Int => "an integer",
        ParamKind::Str => "a string",
        ParamKind::Bool => "a boolean",
        ParamKind::Date => "a date",
        ParamKind::Body => "a body",
    }
}

pub trait RenderContract: Send {
    fn render(&self, format: WireFormat) -> Result<Vec<u8>, String>;
}

impl<T: Contract + Send> RenderContract for T {
    fn render(&self, format: WireFormat) -> Result<Vec<u8>, String> {
        wire::render(self, format)
    }
}

/// What a handler produces: a contract to serialize, or bytes to pass
/// through untouched.
pub enum Reply {
    Raw { content_type: String, bytes: Vec<u8> },
    Contract(Box<dyn RenderContract>),
}

impl Reply {
    pub fn contract<T: Contract + Send + 'static>(value: T) -> Self {
        Reply::Contract(Box::new(value))
    }

    pub fn raw(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Reply::Raw {
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Returns the response content type and body.
    pub fn into_body(self, format: WireFormat) -> Result<(String, Vec<u8>), ApiError> {
        match self {
            Reply::Raw {
                content_type,
                bytes,
            } => Ok((content_type, bytes)),
            Reply::Contract(contract) => {
                let bytes = contract.render(format).map_err(|detail| {
                    tracing::error!(detail, "gateway.render_failed");
                    ApiError::internal()
                })?;
                Ok((format.content_type().to_string(), bytes))
            }
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Raw {
                content_type,
                bytes,
            } => f
                .debug_struct("Raw")
                .field("content_type", content_type)
                .field("len", &bytes.len())
                .finish(),
            Reply::Contract(_) => f.write_str("Contract"),
        }
    }
}

pub struct Endpoint {
    pub params: &'static [ParamSpec],
    pub handler: Handler,
}

pub struct ResolvedRoute<'a> {
    pub route: &'a str,
    pub endpoint: &'a Endpoint,
    pub captures: Vec<(String, String)>,
}

/// The immutable route table plus the invocation boundary.
pub struct Dispatcher {
    table: RouteTable<Endpoint>,
}

impl Dispatcher {
    pub fn new() -> Result<Self, RouteError> {
        let mut table = RouteTable::new();
        endpoints::register(&mut table)?;
        Ok(Self { table })
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Option<ResolvedRoute<'_>> {
        self.table.resolve(method, path).map(|hit| ResolvedRoute {
            route: hit.entry.template.as_str(),
            endpoint: &hit.entry.handler,
            captures: hit.captures,
        })
    }

    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.table
            .entries()
            .iter()
            .map(|entry| (&entry.method, entry.template.as_str()))
    }

    /// Binds and runs the handler. Panics are contained here so one bad
    /// request cannot take the process down.
    pub fn invoke(
        &self,
        route: &ResolvedRoute<'_>,
        ctx: &RequestContext<'_>,
        query: &[(String, String)],
        body: Option<RequestBody>,
    ) -> Result<Reply, ApiError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let params = bind(
                route.endpoint.params,
                RawParameters {
                    captures: &route.captures,
                    query,
                    body,
                },
            )?;
            (route.endpoint.handler)(ctx, &params)
        }));

        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::error!(route = route.route, detail, "gateway.handler_panicked");
                Err(ApiError::internal())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures() -> Vec<(String, String)> {
        vec![("id".to_string(), "12".to_string())]
    }

    #[test]
    fn capture_beats_query_and_query_keys_ignore_case() {
        let captures = captures();
        let query = vec![
            ("ID".to_string(), "99".to_string()),
            ("MAX".to_string(), "5".to_string()),
            ("fields".to_string(), "*,-EMAIL".to_string()),
        ];
        let bound = bind(
            &[
                ParamSpec::int("id"),
                ParamSpec::int("max"),
                ParamSpec::str("fields"),
                ParamSpec::int("start"),
            ],
            RawParameters {
                captures: &captures,
                query: &query,
                body: None,
            },
        )
        .unwrap();

        assert_eq!(bound.int("id"), Some(12));
        assert_eq!(bound.int("max"), Some(5));
        assert_eq!(bound.str("fields"), Some("*,-EMAIL"));
        assert_eq!(bound.int("start"), None);
    }

    #[test]
    fn coercion_failure_is_a_bad_request() {
        let captures = vec![("id".to_string(), "abc".to_string())];
        let err = bind(
            &[ParamSpec::int("id")],
            RawParameters {
                captures: &captures,
                ..RawParameters::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code, "ERR_INVALID_PARAMS");
        assert_eq!(err.status.as_u16(), 400);
    }

    #[test]
    fn bool_and_date_kinds_coerce() {
        let query = vec![
            ("active".to_string(), "TRUE".to_string()),
            ("since".to_string(), "2024-02-29".to_string()),
            ("until".to_string(), "2024-03-01T10:00:00".to_string()),
            ("empty".to_string(), "".to_string()),
        ];
        let bound = bind(
            &[
                ParamSpec::bool("active"),
                ParamSpec::date("since"),
                ParamSpec::date("until"),
                ParamSpec::int("empty"),
            ],
            RawParameters {
                query: &query,
                ..RawParameters::default()
            },
        )
        .unwrap();
        assert_eq!(bound.bool("active"), Some(true));
        assert_eq!(
            bound.date("since"),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(bound.date("until"), NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(bound.int("empty"), None);
    }

    #[test]
    fn body_parameter_takes_the_request_body() {
        let body = RequestBody {
            bytes: b"{}".to_vec(),
            format: WireFormat::Json,
        };
        let bound = bind(
            &[ParamSpec::body("person")],
            RawParameters {
                body: Some(body.clone()),
                ..RawParameters::default()
            },
        )
        .unwrap();
        assert_eq!(bound.body("person").unwrap(), &body);

        let empty = bind(&[ParamSpec::body("person")], RawParameters::default()).unwrap();
        assert_eq!(empty.body("person").unwrap_err().code, "ERR_INVALID_PARAMS");
    }

    #[test]
    fn every_registered_route_resolves_to_itself() {
        let dispatcher = Dispatcher::new().expect("route table should build");
        for (method, template) in dispatcher.routes() {
            let concrete = template
                .split('/')
                .map(|seg| if seg.starts_with('{') { "1" } else { seg })
                .collect::<Vec<_>>()
                .join("/");
            let resolved = dispatcher
                .resolve(method, &concrete)
                .unwrap_or_else(|| panic!("{} {} should resolve", method, concrete));
            // Numeric captures never collide with the literal routes.
            assert_eq!(resolved.route, template);
        }
    }

    #[test]
    fn client_validate_is_not_shadowed_by_client_lookup() {
        let dispatcher = Dispatcher::new().expect("route table should build");
        let resolved = dispatcher
            .resolve(&Method::GET, "/oauth/client/validate")
            .expect("route");
        assert_eq!(resolved.route, "/oauth/client/validate");
        assert!(
            dispatcher
                .resolve(&Method::GET, "/nope/nothing")
                .is_none()
        );
    }
}
