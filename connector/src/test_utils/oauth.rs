use secrecy::{ExposeSecret, SecretString};

use crate::bail;
use crate::clients::OAuthClient;
use crate::error::{ErrorKind, SyncResult};
use crate::test_utils::api::MockApiClient;

/// [`OAuthClient`] handing out a shared [`MockApiClient`].
///
/// Authentication fails when `reject_credentials` is set or the secret is empty.
#[derive(Debug, Clone, Default)]
pub struct MockOAuthClient {
    api: MockApiClient,
    reject_credentials: bool,
}

impl MockOAuthClient {
    pub fn new(api: MockApiClient) -> Self {
        Self {
            api,
            reject_credentials: false,
        }
    }

    pub fn rejecting() -> Self {
        Self {
            api: MockApiClient::new(),
            reject_credentials: true,
        }
    }
}

impl OAuthClient for MockOAuthClient {
    type Api = MockApiClient;

    async fn authenticate(
        &self,
        application_id: &str,
        application_secret: &SecretString,
    ) -> SyncResult<MockApiClient> {
        if self.reject_credentials || application_secret.expose_secret().is_empty() {
            bail!(
                ErrorKind::AuthenticationError,
                "Generating an access token failed",
                format!("application {application_id}")
            );
        }

        Ok(self.api.clone())
    }
}
