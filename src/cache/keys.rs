//! Named cache keys.

/// The GitHub projects collection.
pub const GITHUB_PROJECTS: &str = "/api/github";

/// A single GitHub project within the collection.
pub fn github_project(repo: &str) -> String {
    format!("{GITHUB_PROJECTS}/{repo}")
}
