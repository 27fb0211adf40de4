use std::path::{Path, PathBuf};

use crate::Error;
use crate::client::Connection;
use crate::config::FacadeOptions;

/// Owns the lifecycle of a single BigQuery [`Connection`].
///
/// Constructing a facade only validates the credential path. [`BigQuery::initialize`] loads
/// the credentials and opens the connection, [`BigQuery::terminate`] (or dropping the
/// facade) closes it again. Every record operation borrows the facade, and fails with
/// [`Error::NotInitialized`] while no connection is open. That includes a [`RecordStream`]
/// created before the connection was closed.
///
/// [`RecordStream`]: crate::table::RecordStream
#[derive(Debug)]
pub struct BigQuery {
    credentials_path: PathBuf,
    options: FacadeOptions,
    connection: Option<Connection>,
}

impl BigQuery {
    /// Creates a facade for the service account key at `credentials_path`, using
    /// [`FacadeOptions::from_env`].
    pub fn new(credentials_path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::with_options(credentials_path, FacadeOptions::from_env())
    }

    pub fn with_options(
        credentials_path: impl AsRef<Path>,
        options: FacadeOptions,
    ) -> crate::Result<Self> {
        let credentials_path = credentials_path.as_ref();

        if credentials_path.as_os_str().is_empty() {
            return Err(Error::configuration("credentials path is required"));
        }

        match credentials_path.try_exists() {
            Ok(true) => (),
            Ok(false) => {
                return Err(Error::configuration(format!(
                    "credentials file '{}' does not exist",
                    credentials_path.display()
                )));
            }
            Err(error) => {
                return Err(Error::Configuration {
                    message: format!(
                        "credentials file '{}' is not accessible",
                        credentials_path.display()
                    ),
                    source: Some(error.into()),
                });
            }
        }

        Ok(Self {
            credentials_path: credentials_path.to_path_buf(),
            options,
            connection: None,
        })
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn options(&self) -> &FacadeOptions {
        &self.options
    }

    /// Opens a connection scoped to `project_id`, or to the credential's own project when
    /// `None`.
    ///
    /// If a connection is already open, it's closed before the new one is opened.
    pub async fn initialize(&mut self, project_id: Option<&str>) -> crate::Result<()> {
        if let Some(previous) = self.connection.take() {
            previous.close();
            info!(
                message = "closing previous BigQuery connection before re-initializing",
                project_id = previous.project_id(),
            );
        }

        let connection =
            Connection::open(&self.credentials_path, project_id, self.options.clone())
                .await
                .map_err(|error| {
                    error!(message = "failed to initialize BigQuery client", ?error);
                    Error::Initialization(error)
                })?;

        info!(
            message = "BigQuery client initialized",
            project_id = connection.project_id(),
            emulator = self.options.emulator_host.is_some(),
        );

        self.connection = Some(connection);
        Ok(())
    }

    /// The active connection.
    pub fn connection(&self) -> crate::Result<&Connection> {
        self.connection.as_ref().ok_or(Error::NotInitialized)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Closes the active connection, if any. Calling this on a closed facade is a no-op.
    pub fn terminate(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!(
                message = "BigQuery client terminated",
                project_id = connection.project_id()
            );
        }
    }
}

impl Drop for BigQuery {
    fn drop(&mut self) {
        self.terminate();
    }
}
