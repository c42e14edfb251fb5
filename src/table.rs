//! The handler table: compiled route patterns and request matching.
//!
//! A table is built in one go from the registered routes and the converter
//! registries, then published as an immutable snapshot. Matching never
//! takes a lock and never observes a half-built table.
//!
//! # Precedence
//!
//! 1. Exact literal patterns (`/users/me`) win over anything with variables.
//! 2. Otherwise the first matching pattern in specificity order wins:
//!    patterns without a wildcard before wildcard patterns, then more literal
//!    segments first, then a longer literal prefix first.
//! 3. Equal specificity keeps registration order.
//!
//! Segment counts must match exactly unless the pattern ends in a wildcard,
//! which absorbs zero or more remaining segments.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::convert::{InputParser, OutputFormatter};
use crate::method::Method;
use crate::route::{ParamSource, RouteDescriptor};

// ── Pattern ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Var(String),
    Wildcard(Option<String>),
}

/// A parsed route pattern.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    pub(crate) fn parse(raw: &str) -> Result<Self, String> {
        if !raw.starts_with('/') {
            return Err(format!("pattern `{raw}` must start with `/`"));
        }
        let parts = split(raw);
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let last = i + 1 == parts.len();
            let segment = if *part == "*" {
                Segment::Wildcard(None)
            } else if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                match inner.strip_prefix('*') {
                    Some(name) => Segment::Wildcard((!name.is_empty()).then(|| name.to_owned())),
                    None if inner.is_empty() => {
                        return Err(format!("pattern `{raw}` has an unnamed variable"));
                    }
                    None => Segment::Var(inner.to_owned()),
                }
            } else if part.contains(['{', '}']) {
                return Err(format!("pattern `{raw}` has a malformed segment `{part}`"));
            } else {
                Segment::Literal((*part).to_owned())
            };
            if matches!(segment, Segment::Wildcard(_)) && !last {
                return Err(format!("pattern `{raw}` has a wildcard before its last segment"));
            }
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    fn is_literal(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    fn has_wildcard(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Wildcard(_)))
    }

    fn literal_count(&self) -> usize {
        self.segments.iter().filter(|s| matches!(s, Segment::Literal(_))).count()
    }

    fn literal_prefix(&self) -> usize {
        self.segments.iter().take_while(|s| matches!(s, Segment::Literal(_))).count()
    }

    pub(crate) fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Wildcard(name) => name.as_deref(),
            Segment::Literal(_) => None,
        })
    }

    /// The key a literal pattern and a request path share.
    fn literal_key(&self) -> String {
        let parts: Vec<&str> = self.segments.iter()
            .filter_map(|s| match s {
                Segment::Literal(l) => Some(l.as_str()),
                _ => None,
            })
            .collect();
        parts.join("/")
    }

    /// Captured variables if `path` (already split) matches.
    fn captures(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if self.has_wildcard() {
            if path.len() + 1 < self.segments.len() {
                return None;
            }
        } else if path.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if path[i] != lit.as_str() {
                        return None;
                    }
                }
                Segment::Var(name) => {
                    if path[i].is_empty() {
                        return None;
                    }
                    params.insert(name.clone(), decode(path[i]));
                }
                Segment::Wildcard(name) => {
                    if let Some(name) = name {
                        let rest: Vec<String> = path[i..].iter().map(|p| decode(p)).collect();
                        params.insert(name.clone(), rest.join("/"));
                    }
                }
            }
        }
        Some(params)
    }
}

fn split(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() { Vec::new() } else { trimmed.split('/').collect() }
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_owned())
}

// ── HandlerTable ──────────────────────────────────────────────────────────────

/// A route with every converter it needs already resolved.
pub(crate) struct CompiledRoute {
    pub(crate) descriptor: Arc<RouteDescriptor>,
    /// One entry per declared parameter; `None` for injected values.
    pub(crate) parsers: Vec<Option<Arc<dyn InputParser>>>,
    pub(crate) formatter: Option<Arc<dyn OutputFormatter>>,
    pattern: Pattern,
}

/// Result of a successful [`HandlerTable::lookup`].
pub struct RouteMatch<'a> {
    pub(crate) route: &'a CompiledRoute,
    pub(crate) params: HashMap<String, String>,
}

impl RouteMatch<'_> {
    pub fn descriptor(&self) -> &Arc<RouteDescriptor> { &self.route.descriptor }
    pub fn params(&self) -> &HashMap<String, String> { &self.params }
}

#[derive(Default)]
struct MethodRoutes {
    literal: HashMap<String, usize>,
    dynamic: Vec<usize>,
}

/// An immutable snapshot of every servable route.
#[derive(Default)]
pub struct HandlerTable {
    routes: Vec<CompiledRoute>,
    by_method: HashMap<Method, MethodRoutes>,
    pub(crate) formatters: HashMap<String, Arc<dyn OutputFormatter>>,
    problems: Vec<String>,
}

impl HandlerTable {
    /// Compiles `descriptors` (registration order) against the converters.
    ///
    /// Routes with a bad pattern or a missing converter are left out and
    /// reported by [`problems`](HandlerTable::problems).
    pub(crate) fn build(
        descriptors: &[Arc<RouteDescriptor>],
        parsers: &HashMap<String, Arc<dyn InputParser>>,
        formatters: &HashMap<String, Arc<dyn OutputFormatter>>,
    ) -> Self {
        let mut table = Self { formatters: formatters.clone(), ..Self::default() };

        for descriptor in descriptors {
            match compile(descriptor, parsers, formatters) {
                Ok(route) => table.routes.push(route),
                Err(problem) => table.problems.push(format!(
                    "{} {} ({}): {problem}",
                    descriptor.method, descriptor.pattern, descriptor.operation,
                )),
            }
        }

        for (index, route) in table.routes.iter().enumerate() {
            let entry = table.by_method.entry(route.descriptor.method).or_default();
            if route.pattern.is_literal() {
                entry.literal.insert(route.pattern.literal_key(), index);
            } else {
                entry.dynamic.push(index);
            }
        }

        let routes = &table.routes;
        for entry in table.by_method.values_mut() {
            // Stable: equal specificity keeps registration order.
            entry.dynamic.sort_by_key(|&i| {
                let p = &routes[i].pattern;
                (p.has_wildcard(), Reverse(p.literal_count()), Reverse(p.literal_prefix()))
            });
        }

        table
    }

    /// Finds the route for `method` + `path` (path relative to the mount point).
    pub fn lookup(&self, method: Method, path: &str) -> Option<RouteMatch<'_>> {
        let routes = self.by_method.get(&method)?;
        let parts = split(path);

        if let Some(&index) = routes.literal.get(&parts.join("/")) {
            return Some(RouteMatch { route: &self.routes[index], params: HashMap::new() });
        }

        routes.dynamic.iter().find_map(|&index| {
            let route = &self.routes[index];
            route.pattern
                .captures(&parts)
                .map(|params| RouteMatch { route, params })
        })
    }

    /// Number of servable routes, one per distinct (method, pattern).
    pub fn len(&self) -> usize { self.routes.len() }
    pub fn is_empty(&self) -> bool { self.routes.is_empty() }

    /// Routes left out of this table, and why.
    pub fn problems(&self) -> &[String] { &self.problems }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<RouteDescriptor>> {
        self.routes.iter().map(|r| &r.descriptor)
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerTable")
            .field("routes", &self.routes.len())
            .field("problems", &self.problems)
            .finish_non_exhaustive()
    }
}

fn compile(
    descriptor: &Arc<RouteDescriptor>,
    parsers: &HashMap<String, Arc<dyn InputParser>>,
    formatters: &HashMap<String, Arc<dyn OutputFormatter>>,
) -> Result<CompiledRoute, String> {
    let pattern = Pattern::parse(&descriptor.pattern)?;

    let mut resolved = Vec::with_capacity(descriptor.params.len());
    for spec in &descriptor.params {
        if let ParamSource::Path(name) = &spec.source {
            if !pattern.variables().any(|v| v == name) {
                return Err(format!("path parameter `{name}` is not in the pattern"));
            }
        }
        let parser = match &spec.parser {
            Some(name) => Some(
                parsers.get(name)
                    .cloned()
                    .ok_or_else(|| format!("no input parser named `{name}`"))?,
            ),
            None => None,
        };
        resolved.push(parser);
    }

    let formatter = match &descriptor.produces {
        Some(name) => Some(
            formatters.get(name)
                .cloned()
                .ok_or_else(|| format!("no output formatter named `{name}`"))?,
        ),
        None => None,
    };

    Ok(CompiledRoute {
        descriptor: Arc::clone(descriptor),
        parsers: resolved,
        formatter,
        pattern,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;
    use crate::convert::{default_formatters, default_parsers};
    use crate::route::{Controller, Routes};

    struct Patterns(&'static [(Method, &'static str)]);

    impl Controller for Patterns {
        fn routes(routes: &mut Routes<Self>) {
            let patterns = routes.target().0;
            for (i, (method, pattern)) in patterns.iter().enumerate() {
                routes.route(*method, pattern, Self::op).named(&i.to_string());
            }
        }
    }

    impl Patterns {
        async fn op(self: Arc<Self>, _args: Args) -> &'static str { "" }
    }

    /// Builds a table whose operations are named by registration index.
    fn table(patterns: &'static [(Method, &'static str)]) -> HandlerTable {
        let descriptors: Vec<_> = Routes::scan(Arc::new(Patterns(patterns)))
            .into_iter()
            .map(Arc::new)
            .collect();
        HandlerTable::build(&descriptors, &default_parsers(), &default_formatters())
    }

    fn winner(table: &HandlerTable, method: Method, path: &str) -> Option<String> {
        table.lookup(method, path).map(|m| m.descriptor().operation().name().to_owned())
    }

    #[test]
    fn literal_beats_variable_regardless_of_order() {
        let t = table(&[(Method::Get, "/users/{id}"), (Method::Get, "/users/me")]);
        assert_eq!(winner(&t, Method::Get, "/users/me").as_deref(), Some("1"));
        assert_eq!(winner(&t, Method::Get, "/users/42").as_deref(), Some("0"));
        assert_eq!(t.lookup(Method::Get, "/users/42").map(|m| m.params()["id"].clone()).as_deref(), Some("42"));
    }

    #[test]
    fn more_literal_segments_win() {
        let t = table(&[
            (Method::Get, "/{a}/{b}/c"),
            (Method::Get, "/a/{b}/c"),
            (Method::Get, "/a/b/{c}"),
        ]);
        // `/a/{b}/c` and `/a/b/{c}` both have two literals; longer prefix wins.
        assert_eq!(winner(&t, Method::Get, "/a/b/c").as_deref(), Some("2"));
        assert_eq!(winner(&t, Method::Get, "/a/x/c").as_deref(), Some("1"));
        assert_eq!(winner(&t, Method::Get, "/x/y/c").as_deref(), Some("0"));
    }

    #[test]
    fn equal_specificity_keeps_registration_order() {
        let t = table(&[(Method::Get, "/files/{name}"), (Method::Get, "/files/{id}")]);
        for _ in 0..3 {
            assert_eq!(winner(&t, Method::Get, "/files/x").as_deref(), Some("0"));
        }
    }

    #[test]
    fn segment_counts_must_match_without_wildcard() {
        let t = table(&[(Method::Get, "/users/{id}")]);
        assert!(t.lookup(Method::Get, "/users").is_none());
        assert!(t.lookup(Method::Get, "/users/1/posts").is_none());
        assert!(t.lookup(Method::Post, "/users/1").is_none());
    }

    #[test]
    fn variables_never_capture_an_empty_segment() {
        let t = table(&[(Method::Get, "/users/{id}"), (Method::Get, "/users/{id}/posts")]);
        assert!(t.lookup(Method::Get, "/users/").is_none());
        assert!(t.lookup(Method::Get, "/users").is_none());
        assert!(t.lookup(Method::Get, "/users//posts").is_none());
        assert_eq!(winner(&t, Method::Get, "/users/7/posts").as_deref(), Some("1"));
    }

    #[test]
    fn wildcard_absorbs_the_rest_and_ranks_last() {
        let t = table(&[(Method::Get, "/static/{*path}"), (Method::Get, "/static/{file}")]);
        assert_eq!(winner(&t, Method::Get, "/static/app.js").as_deref(), Some("1"));
        let m = t.lookup(Method::Get, "/static/css/site%20main.css");
        assert_eq!(m.map(|m| m.params()["path"].clone()).as_deref(), Some("css/site main.css"));
        assert_eq!(winner(&t, Method::Get, "/static").as_deref(), Some("0"));
    }

    #[test]
    fn root_pattern_matches_root_only() {
        let t = table(&[(Method::Get, "/")]);
        assert!(t.lookup(Method::Get, "/").is_some());
        assert!(t.lookup(Method::Get, "").is_some());
        assert!(t.lookup(Method::Get, "/x").is_none());
    }

    #[test]
    fn bad_patterns_are_reported_not_served() {
        let t = table(&[
            (Method::Get, "/a/{*rest}/b"),
            (Method::Get, "/b/{}"),
            (Method::Get, "no-slash"),
            (Method::Get, "/ok"),
        ]);
        assert_eq!(t.len(), 1);
        assert_eq!(t.problems().len(), 3);
    }

    #[test]
    fn missing_converters_are_reported() {
        struct Broken;
        impl Controller for Broken {
            fn routes(routes: &mut Routes<Self>) {
                routes.get("/a", Self::op).query::<String>("q").parser("nope");
                routes.get("/b", Self::op).produces("csv");
                routes.get("/c/{id}", Self::op).path::<u64>("other");
            }
        }
        impl Broken {
            async fn op(self: Arc<Self>, _args: Args) -> &'static str { "" }
        }

        let descriptors: Vec<_> = Routes::scan(Arc::new(Broken)).into_iter().map(Arc::new).collect();
        let t = HandlerTable::build(&descriptors, &default_parsers(), &default_formatters());
        assert!(t.is_empty());
        assert!(t.problems()[0].contains("no input parser named `nope`"));
        assert!(t.problems()[1].contains("no output formatter named `csv`"));
        assert!(t.problems()[2].contains("`other` is not in the pattern"));
    }
}
