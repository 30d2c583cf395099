//! Which request paths the guard evaluates at all.

use serde::{Deserialize, Serialize};

/// Inclusion rule for the route guard.
///
/// The guard runs for every path except framework internals and static
/// files, and always runs for API-prefixed paths (even ones that look like
/// files, such as `/api/export.csv`).
///
/// # Examples
///
/// ```
/// use folio::security::GuardScope;
///
/// let scope = GuardScope::default();
/// assert!(scope.applies_to("/dashboard"));
/// assert!(!scope.applies_to("/_next/static/chunk.js"));
/// assert!(!scope.applies_to("/favicon.ico"));
/// assert!(scope.applies_to("/api/contact"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardScope {
    /// Prefixes the guard never sees.
    pub excluded_prefixes: Vec<String>,
    /// Skip any path containing a `.` (static assets).
    pub skip_static_files: bool,
    /// Prefixes the guard always sees, checked before the exclusions.
    pub always_prefixes: Vec<String>,
}

impl Default for GuardScope {
    fn default() -> Self {
        Self {
            excluded_prefixes: vec!["/_next".to_string()],
            skip_static_files: true,
            always_prefixes: vec!["/api".to_string(), "/trpc".to_string()],
        }
    }
}

impl GuardScope {
    /// `true` when the guard must evaluate `path`.
    pub fn applies_to(&self, path: &str) -> bool {
        if self
            .always_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return true;
        }

        if self
            .excluded_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return false;
        }

        !(self.skip_static_files && is_static_file(path))
    }
}

fn is_static_file(path: &str) -> bool {
    path.strip_prefix('/').unwrap_or(path).contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_assets_are_excluded() {
        let scope = GuardScope::default();
        assert!(!scope.applies_to("/_next/static/chunk.js"));
        assert!(!scope.applies_to("/_next/image"));
    }

    #[test]
    fn static_files_are_excluded() {
        let scope = GuardScope::default();
        assert!(!scope.applies_to("/robots.txt"));
        assert!(!scope.applies_to("/images/avatar.png"));
        assert!(!scope.applies_to("/dashboard/report.pdf"));
    }

    #[test]
    fn pages_are_included() {
        let scope = GuardScope::default();
        assert!(scope.applies_to("/"));
        assert!(scope.applies_to("/about"));
        assert!(scope.applies_to("/dashboard/settings"));
    }

    #[test]
    fn api_paths_always_included() {
        let scope = GuardScope::default();
        assert!(scope.applies_to("/api/github"));
        assert!(scope.applies_to("/api/export.csv"));
        assert!(scope.applies_to("/trpc/posts.list"));
    }

    #[test]
    fn static_file_check_can_be_disabled() {
        let scope = GuardScope {
            skip_static_files: false,
            ..GuardScope::default()
        };
        assert!(scope.applies_to("/robots.txt"));
        assert!(!scope.applies_to("/_next/static/chunk.js"));
    }
}
