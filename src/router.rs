//! Anchored-regex router (C8): first-match-wins dispatch for both request
//! routes and error routes, each matched against an anchored pattern
//! compiled once at construction.

use crate::handler::Handler;
use regex::Regex;
use std::sync::Arc;

struct Route {
    pattern: Regex,
    handler: Arc<dyn Handler>,
}

/// Ordered table of anchored routes. Insertion order is match order: the
/// first pattern whose anchors cover the whole subject wins (§4.8).
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    error_routes: Vec<Route>,
}

/// A pattern that doesn't compile as a regex, or that isn't anchored at
/// both ends (`^...$`), which §4.8 requires so a prefix match can never
/// silently win over a later, more specific route.
#[derive(Debug)]
pub struct BadPattern(pub String);

impl std::fmt::Display for BadPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "route pattern not anchored or invalid: {}", self.0)
    }
}

impl std::error::Error for BadPattern {}

fn compile_anchored(pattern: &str) -> Result<Regex, BadPattern> {
    if !pattern.starts_with('^') || !pattern.ends_with('$') {
        return Err(BadPattern(pattern.to_string()));
    }
    Regex::new(pattern).map_err(|_| BadPattern(pattern.to_string()))
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new(), error_routes: Vec::new() }
    }

    /// Registers a request route. `pattern` must be anchored (`^...$`).
    pub fn add_route(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), BadPattern> {
        self.routes.push(Route { pattern: compile_anchored(pattern)?, handler });
        Ok(())
    }

    /// Registers an error route, matched against the decimal status code
    /// rendered as text (e.g. `"404"`) rather than against a resource path.
    pub fn add_error_route(&mut self, pattern: &str, handler: Arc<dyn Handler>) -> Result<(), BadPattern> {
        self.error_routes.push(Route { pattern: compile_anchored(pattern)?, handler });
        Ok(())
    }

    /// First route whose pattern matches `resource` in full, plus its
    /// capture groups (group 0 excluded).
    pub fn match_request(&self, resource: &str) -> Option<(Arc<dyn Handler>, Vec<String>)> {
        Self::first_match(&self.routes, resource)
    }

    /// First error route whose pattern matches `code`'s decimal text.
    pub fn match_error(&self, code: u16) -> Option<(Arc<dyn Handler>, Vec<String>)> {
        Self::first_match(&self.error_routes, &code.to_string())
    }

    fn first_match(routes: &[Route], subject: &str) -> Option<(Arc<dyn Handler>, Vec<String>)> {
        for route in routes {
            if let Some(captures) = route.pattern.captures(subject) {
                let groups = captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect();
                return Some((Arc::clone(&route.handler), groups));
            }
        }
        None
    }
}
