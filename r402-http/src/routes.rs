//! Route Compiler: turns a [`Routes`] table into anchored matchers.
//!
//! Pattern grammar: an optional HTTP verb, whitespace, then a path where
//! `*` matches any run of characters and `[name]` matches exactly one
//! non-slash segment. Everything else matches literally. Matching is
//! case-insensitive and first-match-wins.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use regex::{Regex, RegexBuilder};

use crate::error::RouteConfigurationError;
use crate::types::{RouteConfig, Routes};

/// A route pattern compiled for matching.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    verb: String,
    source: String,
    regex: Regex,
    config: RouteConfig,
}

impl CompiledRoute {
    /// Compiles one pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RouteConfigurationError::InvalidPattern`] if the generated
    /// expression does not compile.
    pub fn new(pattern: &str, config: RouteConfig) -> Result<Self, RouteConfigurationError> {
        let (verb, path) = parse_route_pattern(pattern);
        let regex = compile_pattern(&path).map_err(|source| {
            RouteConfigurationError::InvalidPattern {
                pattern: pattern.to_owned(),
                source,
            }
        })?;
        Ok(Self {
            verb,
            source: pattern.to_owned(),
            regex,
            config,
        })
    }

    /// Upper-cased verb, or `*` for any.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// The pattern as configured.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// The route's configuration.
    #[must_use]
    pub const fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Checks the verb and an already-normalized path.
    #[must_use]
    pub fn matches(&self, method: &str, normalized_path: &str) -> bool {
        (self.verb == "*" || self.verb.eq_ignore_ascii_case(method))
            && self.regex.is_match(normalized_path)
    }
}

/// Ordered list of compiled routes. Built once, read concurrently.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    /// Compiles every route, preserving order.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn compile(routes: &Routes) -> Result<Self, RouteConfigurationError> {
        let routes = routes
            .iter()
            .map(|(pattern, config)| CompiledRoute::new(pattern, config.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { routes })
    }

    /// Returns the first route matching `method` and `path`.
    ///
    /// `path` may carry a query string, fragment or percent-escapes; it is
    /// normalized before matching.
    #[must_use]
    pub fn find(&self, method: &str, path: &str) -> Option<&CompiledRoute> {
        let normalized = normalize_path(path);
        self.routes
            .iter()
            .find(|route| route.matches(method, &normalized))
    }

    /// Iterates routes in match order.
    pub fn iter(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter()
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Splits `"GET /weather"` into (`"GET"`, `"/weather"`); a bare path gets
/// the `*` verb.
fn parse_route_pattern(pattern: &str) -> (String, String) {
    let trimmed = pattern.trim();
    if let Some((method, path)) = trimmed.split_once(char::is_whitespace) {
        (method.to_uppercase(), path.trim().to_owned())
    } else {
        ("*".to_owned(), trimmed.to_owned())
    }
}

/// Compiles a path pattern into an anchored, case-insensitive expression.
///
/// # Errors
///
/// Returns the regex error if the expression is rejected.
pub fn compile_pattern(path: &str) -> Result<Regex, regex::Error> {
    let path = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };

    let mut expr = String::with_capacity(path.len() + 8);
    expr.push('^');
    let mut literal = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(".*?");
            }
            '[' => {
                let mut name = String::new();
                let mut closed = false;
                for n in chars.by_ref() {
                    if n == ']' {
                        closed = true;
                        break;
                    }
                    name.push(n);
                }
                if closed && !name.is_empty() && !name.contains('/') {
                    expr.push_str(&regex::escape(&literal));
                    literal.clear();
                    expr.push_str("[^/]+");
                } else {
                    literal.push('[');
                    literal.push_str(&name);
                    if closed {
                        literal.push(']');
                    }
                }
            }
            other => literal.push(other),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');

    RegexBuilder::new(&expr).case_insensitive(true).build()
}

/// Normalizes a request path for matching.
///
/// Strips query and fragment, percent-decodes (keeping the raw text when
/// it is not valid UTF-8), turns `\` into `/`, collapses repeated slashes
/// and drops one trailing slash. The empty path becomes `/`.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let path = path
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(path));

    let mut normalized = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && normalized.ends_with('/') {
            continue;
        }
        normalized.push(c);
    }

    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}
