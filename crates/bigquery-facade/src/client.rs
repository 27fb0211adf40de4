use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bigquery_resources::{ErrorProto, ErrorResponse, TableReference};
use reqwest::{IntoUrl, Method, Response, Url};

use crate::auth::Auth;
use crate::config::FacadeOptions;
use crate::error::ClientError;
use crate::table::TableRef;

/// Root of the production API, the `bigquery/v2/projects/{project}` path is appended to it.
pub(crate) const BASE_URL: &str = "https://bigquery.googleapis.com";

/// An open connection to the BigQuery REST API, scoped to one project.
///
/// Cheap to clone, clones share the underlying HTTP client and credentials. Closing any
/// clone closes all of them.
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) inner: Arc<InnerConnection>,
}

#[derive(Debug)]
pub(crate) struct InnerConnection {
    client: reqwest::Client,
    auth: Auth,
    project_id: Arc<str>,
    base_url: Url,
    options: FacadeOptions,
    closed: AtomicBool,
}

impl Connection {
    /// Loads credentials from `credentials_path` and builds the HTTP client. Nothing is sent
    /// over the network here, credentials are only exchanged for a token on the first request.
    pub(crate) async fn open(
        credentials_path: &Path,
        project_id: Option<&str>,
        options: FacadeOptions,
    ) -> Result<Self, ClientError> {
        let (auth, root) = match options.emulator_host {
            Some(ref host) => {
                let auth = Auth::emulator_from_file(credentials_path, project_id).await?;
                (auth, emulator_root(host)?)
            }
            None => (
                Auth::from_service_account_file(credentials_path)?,
                Url::parse(BASE_URL)?,
            ),
        };

        let project_id = match project_id {
            Some(project_id) => Arc::from(project_id),
            None => auth.project_id().await?,
        };

        let mut builder = reqwest::Client::builder().user_agent(options.user_agent.as_str());

        // emulators run locally, and shouldn't be routed through any system proxy
        if options.emulator_host.is_some() {
            builder = builder.no_proxy();
        }

        let client = builder.build()?;

        Self::from_parts(client, auth, project_id, root, options)
    }

    fn from_parts(
        client: reqwest::Client,
        auth: Auth,
        project_id: Arc<str>,
        mut base_url: Url,
        options: FacadeOptions,
    ) -> Result<Self, ClientError> {
        base_url
            .path_segments_mut()
            .map_err(|()| ClientError::invalid_request("BigQuery root URL cannot be a base"))?
            .pop_if_empty()
            .extend(["bigquery", "v2", "projects", &*project_id]);

        Ok(Self {
            inner: Arc::new(InnerConnection {
                client,
                auth,
                project_id,
                base_url,
                options,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Marks the connection closed. Streams still holding a clone fail on their next page.
    pub(crate) fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    /// The `projects/{project}` URL all requests are made relative to.
    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    #[inline]
    pub fn options(&self) -> &FacadeOptions {
        &self.inner.options
    }

    pub(crate) fn table_reference(&self, table: &TableRef) -> TableReference {
        TableReference {
            project_id: self.inner.project_id.to_string(),
            dataset_id: table.dataset_id().to_owned(),
            table_id: table.table_id().to_owned(),
        }
    }

    pub(crate) fn make_url<P>(&self, path: P) -> Url
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        crate::util::append_to_path(&self.inner.base_url, path)
    }

    pub(crate) fn table_url<P>(&self, table: &TableRef, rest: P) -> Url
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let mut url = self.make_url([
            "datasets",
            table.dataset_id(),
            "tables",
            table.table_id(),
        ]);
        url.path_segments_mut().expect("can be a base").extend(rest);
        url
    }

    #[inline]
    pub(crate) async fn request(
        &self,
        method: Method,
        url: impl IntoUrl,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let header = self.inner.auth.header().await?;

        let builder = self
            .inner
            .client
            .request(method, url)
            .header(http::header::AUTHORIZATION, header);

        Ok(builder)
    }

    /// Sends a built request, turning non-2xx responses into [`ClientError::Api`].
    pub(crate) async fn send(builder: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let resp = builder.send().await?;

        if !resp.status().is_success() {
            Err(handle_error(resp).await)
        } else {
            Ok(resp)
        }
    }

    #[inline]
    pub(crate) async fn get(&self, url: impl IntoUrl) -> Result<Response, ClientError> {
        Self::send(self.request(Method::GET, url).await?).await
    }

    #[inline]
    pub(crate) async fn delete(&self, url: impl IntoUrl) -> Result<Response, ClientError> {
        Self::send(self.request(Method::DELETE, url).await?).await
    }

    #[inline]
    pub(crate) async fn post<S>(&self, url: impl IntoUrl, payload: &S) -> Result<Response, ClientError>
    where
        S: serde::Serialize + ?Sized,
    {
        Self::send(self.request(Method::POST, url).await?.json(payload)).await
    }

    #[inline]
    pub(crate) async fn patch<S>(&self, url: impl IntoUrl, payload: &S) -> Result<Response, ClientError>
    where
        S: serde::Serialize + ?Sized,
    {
        Self::send(self.request(Method::PATCH, url).await?.json(payload)).await
    }

    pub(crate) async fn get_json<T>(&self, url: impl IntoUrl) -> Result<T, ClientError>
    where
        T: serde::de::DeserializeOwned,
    {
        deserialize_json(self.get(url).await?).await
    }
}

fn emulator_root(host: &str) -> Result<Url, ClientError> {
    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(Url::parse(host)?)
    } else {
        Ok(Url::parse(&format!("http://{host}"))?)
    }
}

pub(crate) async fn handle_error(response: Response) -> ClientError {
    let status = response.status().as_u16();
    let text = match response.text().await {
        Ok(text) => text,
        Err(error) => return error.into(),
    };

    let error = match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(ErrorResponse { error }) => error.main_error(),
        // this is if the response is text based, or some other json shape
        Err(error) => {
            if text.trim_start().starts_with('{') {
                warn!(message = "failed to deserialize error json, falling back to raw text", ?error);
            }
            ErrorProto::new(text)
        }
    };

    ClientError::Api { status, error }
}

pub(crate) async fn deserialize_json<T>(response: Response) -> Result<T, ClientError>
where
    T: serde::de::DeserializeOwned,
{
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::from)
}
