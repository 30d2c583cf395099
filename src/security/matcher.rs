//! Path classification for the route guard.
//!
//! Two pattern styles are supported:
//!
//! | Pattern            | Example match                              |
//! |--------------------|--------------------------------------------|
//! | `/about`           | `/about`, `/about/`                        |
//! | `/dashboard(.*)`   | `/dashboard`, `/dashboard/settings`, ...   |
//! | `/dashboard/*`     | same as `/dashboard(.*)`                   |
//!
//! Trailing slashes are normalized on both patterns and incoming paths, and
//! matching ignores ASCII case, so `/Dashboard` is as protected as `/dashboard`.

use serde::{Deserialize, Serialize};

/// Routes that require a signed-in session unless configured otherwise.
pub const DEFAULT_PROTECTED: &[&str] = &["/dashboard(.*)", "/settings(.*)", "/profile(.*)"];

/// Outcome of classifying a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteClass {
    Protected,
    Public,
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Pattern {
    // Matches one exact path, e.g. `/about`.
    Exact(String),
    // Matches every path starting with the prefix, e.g. `/dashboard(.*)`.
    Prefix(String),
}

impl Pattern {
    /// Compile a pattern string.
    ///
    /// A `(.*)` or `/*` suffix makes a prefix pattern; anything else is exact.
    pub(crate) fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern
            .strip_suffix("(.*)")
            .or_else(|| pattern.strip_suffix("/*"))
        {
            return Pattern::Prefix(trim_trailing_slash(prefix).to_string());
        }

        Pattern::Exact(pattern.to_string())
    }

    fn matches(&self, path: &str) -> bool {
        let path = trim_trailing_slash(path);
        match self {
            Pattern::Exact(p) => p.eq_ignore_ascii_case(path),
            Pattern::Prefix(prefix) => path
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix)),
        }
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Ordered list of protected-route patterns.
///
/// # Examples
///
/// ```
/// use folio::security::{RouteClass, RouteMatcher};
///
/// let matcher = RouteMatcher::new(["/dashboard(.*)"]);
/// assert_eq!(matcher.classify("/dashboard/settings"), RouteClass::Protected);
/// assert_eq!(matcher.classify("/about"), RouteClass::Public);
/// ```
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    patterns: Vec<Pattern>,
}

impl Default for RouteMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED.iter().copied())
    }
}

impl RouteMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| Pattern::parse(p.as_ref()))
                .collect(),
        }
    }

    /// Protected if any pattern matches, public otherwise.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.patterns.iter().any(|p| p.matches(path)) {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.classify(path) == RouteClass::Protected
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
