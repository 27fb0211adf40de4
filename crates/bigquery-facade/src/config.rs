use std::time::Duration;

use typed_builder::TypedBuilder;

/// Environment variable pointing the facade at a local BigQuery emulator, i.e
/// `localhost:9050`.
pub const EMULATOR_HOST_ENV: &str = "BIGQUERY_EMULATOR_HOST";

const DEFAULT_USER_AGENT: &str = concat!("bigquery-facade/", env!("CARGO_PKG_VERSION"));

/// Tunables for a [`BigQuery`](crate::BigQuery) facade.
///
/// ```
/// use std::time::Duration;
///
/// use bigquery_facade::FacadeOptions;
///
/// let options = FacadeOptions::builder()
///     .query_timeout(Duration::from_secs(30))
///     .location("US")
///     .build();
///
/// assert_eq!(options.location.as_deref(), Some("US"));
/// assert!(options.emulator_host.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct FacadeOptions {
    #[builder(default = DEFAULT_USER_AGENT.to_owned(), setter(into))]
    pub user_agent: String,
    /// When set, requests go to `{emulator_host}/bigquery/v2` with a fake token, and the
    /// credential file is only read for its `project_id`.
    #[builder(default, setter(strip_option, into))]
    pub emulator_host: Option<String>,
    /// How long the service may block on a single query request before it answers with
    /// `jobComplete: false`. Polling continues after that, so this is not a deadline.
    #[builder(default = Duration::from_secs(10))]
    pub query_timeout: Duration,
    /// Max rows per page, for both query results and table listings.
    #[builder(default = 1000)]
    pub page_size: u32,
    #[builder(default, setter(strip_option, into))]
    pub location: Option<String>,
}

impl Default for FacadeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FacadeOptions {
    /// Default options, with the emulator host taken from [`EMULATOR_HOST_ENV`] if it's set
    /// to a non-empty value.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(host) = std::env::var(EMULATOR_HOST_ENV) {
            let host = host.trim();
            if !host.is_empty() {
                options.emulator_host = Some(host.to_owned());
            }
        }

        options
    }

    pub(crate) fn query_timeout_ms(&self) -> u64 {
        self.query_timeout.as_millis().try_into().unwrap_or(u64::MAX)
    }
}
