//! URL-template route table.
//!
//! Templates are `/`-separated. A `{name}` segment captures whatever sits in
//! that position; every other segment must match byte for byte. Anything after
//! `?` in a template documents the query string and takes no part in matching.
//! Entries are scanned in registration order and the first full match wins.

use axum::http::Method;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteError {
    pub template: String,
    pub message: &'static str,
}

impl std::fmt::Display for RouteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid route template `{}`: {}", self.template, self.message)
    }
}

impl std::error::Error for RouteError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    path: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(template: &str) -> Result<Self, RouteError> {
        let err = |message| RouteError {
            template: template.to_string(),
            message,
        };

        let path = template.split_once('?').map_or(template, |(path, _)| path);
        let Some(rest) = path.strip_prefix('/') else {
            return Err(err("must start with `/`"));
        };

        let mut segments = Vec::new();
        for raw in rest.split('/') {
            let segment = match raw.strip_prefix('{') {
                Some(inner) => {
                    let Some(name) = inner.strip_suffix('}') else {
                        return Err(err("unterminated capture"));
                    };
                    if name.is_empty() || name.contains(['{', '}']) {
                        return Err(err("capture name must be a plain identifier"));
                    }
                    if segments
                        .iter()
                        .any(|s| matches!(s, Segment::Capture(existing) if existing == name))
                    {
                        return Err(err("duplicate capture name"));
                    }
                    Segment::Capture(name.to_string())
                }
                None => {
                    if raw.contains(['{', '}']) {
                        return Err(err("braces are only allowed around a whole segment"));
                    }
                    Segment::Literal(raw.to_string())
                }
            };
            segments.push(segment);
        }

        Ok(Self {
            path: path.to_string(),
            segments,
        })
    }

    /// The template without its query description, used as the metrics and
    /// log label.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn captures(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Captured values are returned raw, without percent-decoding.
    pub fn match_segments(&self, path: &[&str]) -> Option<Vec<(String, String)>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut captures = Vec::new();
        for (segment, value) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal == value => {}
                Segment::Literal(_) => return None,
                Segment::Capture(name) => captures.push((name.clone(), (*value).to_string())),
            }
        }
        Some(captures)
    }
}

pub fn split_path(path: &str) -> Vec<&str> {
    let path = path.split_once('?').map_or(path, |(path, _)| path);
    path.strip_prefix('/').unwrap_or(path).split('/').collect()
}

pub struct RouteEntry<H> {
    pub method: Method,
    pub template: RouteTemplate,
    pub handler: H,
}

pub struct RouteMatch<'a, H> {
    pub entry: &'a RouteEntry<H>,
    pub captures: Vec<(String, String)>,
}

pub struct RouteTable<H> {
    entries: Vec<RouteEntry<H>>,
}

impl<H> Default for RouteTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> RouteTable<H> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, method: Method, template: &str, handler: H) -> Result<(), RouteError> {
        let template = RouteTemplate::parse(template)?;
        self.entries.push(RouteEntry {
            method,
            template,
            handler,
        });
        Ok(())
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch<'_, H>> {
        let segments = split_path(path);
        self.entries
            .iter()
            .filter(|entry| entry.method == *method)
            .find_map(|entry| {
                entry
                    .template
                    .match_segments(&segments)
                    .map(|captures| RouteMatch { entry, captures })
            })
    }

    pub fn entries(&self) -> &[RouteEntry<H>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable<&'static str> {
        let mut table = RouteTable::new();
        table
            .register(Method::GET, "/oauth/client/validate?clientApiKey={key}", "validate")
            .unwrap();
        table
            .register(Method::GET, "/oauth/client/{clientApiKey}", "client")
            .unwrap();
        table
            .register(Method::GET, "/person/{id}?fields={csv}", "person")
            .unwrap();
        table
            .register(Method::GET, "/person/{id}/groups", "groups")
            .unwrap();
        table
            .register(Method::POST, "/person/imin", "imin")
            .unwrap();
        table
    }

    #[test]
    fn first_registered_match_wins() {
        let table = table();
        let hit = table
            .resolve(&Method::GET, "/oauth/client/validate")
            .expect("route");
        assert_eq!(hit.entry.handler, "validate");
        assert!(hit.captures.is_empty());

        let hit = table
            .resolve(&Method::GET, "/oauth/client/abc123")
            .expect("route");
        assert_eq!(hit.entry.handler, "client");
        assert_eq!(
            hit.captures,
            vec![("clientApiKey".to_string(), "abc123".to_string())]
        );
    }

    #[test]
    fn reversed_registration_shadows_the_literal_route() {
        let mut table = RouteTable::new();
        table
            .register(Method::GET, "/oauth/client/{clientApiKey}", "client")
            .unwrap();
        table
            .register(Method::GET, "/oauth/client/validate", "validate")
            .unwrap();
        let hit = table
            .resolve(&Method::GET, "/oauth/client/validate")
            .expect("route");
        assert_eq!(hit.entry.handler, "client");
    }

    #[test]
    fn segment_count_must_match_exactly() {
        let table = table();
        assert!(table.resolve(&Method::GET, "/person/1/groups/extra").is_none());
        assert!(table.resolve(&Method::GET, "/person").is_none());
        assert!(table.resolve(&Method::GET, "/person/1/").is_none());
        assert_eq!(
            table
                .resolve(&Method::GET, "/person/1/groups")
                .expect("route")
                .entry
                .handler,
            "groups"
        );
    }

    #[test]
    fn method_mismatch_is_skipped() {
        let table = table();
        assert!(table.resolve(&Method::GET, "/person/imin").is_some());
        assert_eq!(
            table
                .resolve(&Method::GET, "/person/imin")
                .expect("route")
                .entry
                .handler,
            "person"
        );
        assert_eq!(
            table
                .resolve(&Method::POST, "/person/imin")
                .expect("route")
                .entry
                .handler,
            "imin"
        );
        assert!(table.resolve(&Method::DELETE, "/person/imin").is_none());
    }

    #[test]
    fn query_description_is_ignored_when_matching() {
        let template = RouteTemplate::parse("/person/{id}?fields={csv}").unwrap();
        assert_eq!(template.as_str(), "/person/{id}");
        assert_eq!(template.captures().collect::<Vec<_>>(), vec!["id"]);

        let table = table();
        let hit = table
            .resolve(&Method::GET, "/person/7?fields=FirstName")
            .expect("route");
        assert_eq!(hit.captures, vec![("id".to_string(), "7".to_string())]);
    }

    #[test]
    fn literals_match_case_sensitively_and_captures_stay_encoded() {
        let table = table();
        assert!(table.resolve(&Method::GET, "/Person/1/groups").is_none());

        let hit = table
            .resolve(&Method::GET, "/oauth/client/a%20b")
            .expect("route");
        assert_eq!(hit.captures[0].1, "a%20b");
    }

    #[test]
    fn malformed_templates_are_rejected() {
        for bad in ["person/{id}", "/person/{id", "/person/x{id}", "/a/{id}/{id}", "/a/{}"] {
            assert!(RouteTemplate::parse(bad).is_err(), "{} should fail", bad);
        }
    }
}
