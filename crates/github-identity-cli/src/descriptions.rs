//! Help text for provider settings.

/// Help entry for one provider setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescription {
    /// Dotted setting name, e.g. `app_auth.pem_file`.
    pub name: &'static str,

    /// Environment variable that supplies the default, if any.
    pub env: Option<&'static str>,

    pub description: &'static str,
}

/// Every provider setting in declaration order.
pub const FIELD_DESCRIPTIONS: &[FieldDescription] = &[
    FieldDescription {
        name: "token",
        env: Some("GITHUB_TOKEN"),
        description: "The OAuth token used to connect to GitHub. Anonymous mode is enabled if \
                      both `token` and `app_auth` are not set.",
    },
    FieldDescription {
        name: "owner",
        env: Some("GITHUB_OWNER"),
        description: "The GitHub owner name to manage. Use this field instead of \
                      `organization` when managing individual accounts.",
    },
    FieldDescription {
        name: "organization",
        env: Some("GITHUB_ORGANIZATION"),
        description: "The GitHub organization name to manage. Use this field instead of \
                      `owner` when managing organization accounts.",
    },
    FieldDescription {
        name: "base_url",
        env: Some("GITHUB_BASE_URL"),
        description: "The GitHub Base API URL.",
    },
    FieldDescription {
        name: "insecure",
        env: None,
        description: "Enable `insecure` mode for testing purposes.",
    },
    FieldDescription {
        name: "app_auth",
        env: None,
        description: "The GitHub App credentials used to connect to GitHub. Conflicts with \
                      `token`. Anonymous mode is enabled if both `token` and `app_auth` are \
                      not set.",
    },
    FieldDescription {
        name: "app_auth.id",
        env: Some("GITHUB_APP_ID"),
        description: "The GitHub App ID.",
    },
    FieldDescription {
        name: "app_auth.installation_id",
        env: Some("GITHUB_APP_INSTALLATION_ID"),
        description: "The GitHub App installation instance ID.",
    },
    FieldDescription {
        name: "app_auth.pem_file",
        env: Some("GITHUB_APP_PEM_FILE"),
        description: "The GitHub App PEM file path.",
    },
];

/// Look up the help entry for `name`.
pub fn find(name: &str) -> Option<&'static FieldDescription> {
    FIELD_DESCRIPTIONS.iter().find(|field| field.name == name)
}

/// Render one help entry as text.
pub fn render(field: &FieldDescription) -> String {
    match field.env {
        Some(env) => format!("{} (default: ${})\n    {}", field.name, env, field.description),
        None => format!("{}\n    {}", field.name, field.description),
    }
}

#[cfg(test)]
#[path = "descriptions_tests.rs"]
mod tests;
