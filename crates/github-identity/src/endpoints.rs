//! API endpoint derivation from the configured base URL.
//!
//! `https://api.github.com/` serves REST at its root and GraphQL at
//! `/graphql`. Any other base URL is treated as GitHub Enterprise Server,
//! which serves REST under `api/v3/` and GraphQL at `api/graphql`.

const GITHUB_DOT_COM_API: &str = "https://api.github.com/";

fn with_trailing_slash(base_url: &str) -> String {
    if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    }
}

/// Check whether `base_url` points at the public GitHub API.
pub fn is_github_dot_com(base_url: &str) -> bool {
    with_trailing_slash(base_url).eq_ignore_ascii_case(GITHUB_DOT_COM_API)
}

/// REST API root, always ending in `/`.
pub fn rest_api_url(base_url: &str) -> String {
    let base = with_trailing_slash(base_url);
    if is_github_dot_com(&base) || base.ends_with("/api/v3/") {
        base
    } else {
        format!("{}api/v3/", base)
    }
}

/// GraphQL endpoint.
pub fn graphql_api_url(base_url: &str) -> String {
    let base = with_trailing_slash(base_url);
    if is_github_dot_com(&base) {
        format!("{}graphql", base)
    } else {
        let root = base.strip_suffix("api/v3/").unwrap_or(&base);
        format!("{}api/graphql", root)
    }
}

#[cfg(test)]
#[path = "endpoints_tests.rs"]
mod tests;
