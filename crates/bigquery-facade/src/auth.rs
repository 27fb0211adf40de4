use std::fmt;
use std::path::Path;
use std::sync::Arc;

use gcp_auth::{CustomServiceAccount, Token, TokenProvider};
use http::header::HeaderValue;

use crate::error::ClientError;

pub(crate) const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Hands out bearer headers for the BigQuery scope. Token caching and refreshing is left
/// to the underlying [`TokenProvider`].
#[derive(Clone)]
pub(crate) struct Auth {
    provider: Arc<dyn TokenProvider>,
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth").finish_non_exhaustive()
    }
}

impl Auth {
    pub(crate) fn from_service_account_file(path: &Path) -> Result<Self, ClientError> {
        let service_account = CustomServiceAccount::from_file(path)?;

        Ok(Self {
            provider: Arc::new(service_account),
        })
    }

    /// Only the `project_id` of the credential file is used, the key itself is never parsed.
    /// An explicit `project_id` takes precedence over the one in the file.
    pub(crate) async fn emulator_from_file(
        path: &Path,
        project_id: Option<&str>,
    ) -> Result<Self, ClientError> {
        #[derive(serde::Deserialize)]
        struct CredentialProject {
            #[serde(default)]
            project_id: Option<String>,
        }

        let bytes = tokio::fs::read(path).await?;
        let from_file: CredentialProject = serde_json::from_slice(&bytes)?;

        match project_id.map(str::to_owned).or(from_file.project_id) {
            Some(project_id) => Self::emulator(Arc::from(project_id)),
            None => Err(ClientError::MissingField("project_id")),
        }
    }

    pub(crate) fn emulator(project_id: Arc<str>) -> Result<Self, ClientError> {
        // gcp_auth tokens can only be built by deserializing them
        const FAKE_TOKEN_JSON: &str =
            "{\"access_token\":\"notarealtoken\",\"expires_in\":100000000}";

        let token: Token = serde_json::from_str(FAKE_TOKEN_JSON)?;

        Ok(Self {
            provider: Arc::new(EmulatorTokenProvider {
                project_id,
                fake_token: Arc::new(token),
            }),
        })
    }

    pub(crate) async fn project_id(&self) -> Result<Arc<str>, ClientError> {
        self.provider.project_id().await.map_err(ClientError::from)
    }

    pub(crate) async fn header(&self) -> Result<HeaderValue, ClientError> {
        let token = self.provider.token(&[BIGQUERY_SCOPE]).await?;
        build_header(token.as_str())
    }
}

fn build_header(token: &str) -> Result<HeaderValue, ClientError> {
    let mut header = HeaderValue::try_from(format!("Bearer {token}"))?;
    header.set_sensitive(true);
    Ok(header)
}

struct EmulatorTokenProvider {
    project_id: Arc<str>,
    fake_token: Arc<Token>,
}

#[async_trait::async_trait]
impl TokenProvider for EmulatorTokenProvider {
    async fn token(&self, _scopes: &[&str]) -> Result<Arc<Token>, gcp_auth::Error> {
        Ok(Arc::clone(&self.fake_token))
    }

    async fn project_id(&self) -> Result<Arc<str>, gcp_auth::Error> {
        Ok(Arc::clone(&self.project_id))
    }
}
