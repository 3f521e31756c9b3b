use serde::{Deserialize, Serialize};

/// Endpoints of the Propel control plane.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiConfig {
    /// GraphQL API endpoint.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// OAuth2 token endpoint used for the client credentials flow.
    #[serde(default = "default_oauth_url")]
    pub oauth_url: String,
}

impl ApiConfig {
    pub const DEFAULT_API_URL: &'static str = "https://api.us-east-2.propeldata.com/graphql";

    pub const DEFAULT_OAUTH_URL: &'static str =
        "https://auth.us-east-2.propeldata.com/oauth2/token";
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            oauth_url: default_oauth_url(),
        }
    }
}

fn default_api_url() -> String {
    ApiConfig::DEFAULT_API_URL.to_string()
}

fn default_oauth_url() -> String {
    ApiConfig::DEFAULT_OAUTH_URL.to_string()
}
