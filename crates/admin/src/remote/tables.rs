//! Row-level table access against the backend's `/rest/v1` endpoints.

use reqwest::{Method, RequestBuilder};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use shelfdesk_core::ProductId;

use crate::catalog::TableStore;
use crate::error::RemoteError;

use super::{API_KEY_HEADER, RestAuth, check_status, endpoint, transport_error};

/// Ask the backend to echo affected rows so inserts return the assigned id
/// and empty results reveal a missing row.
const RETURN_REPRESENTATION: &str = "return=representation";

/// Table store backed by the hosted backend, authenticated with the session
/// held by [`RestAuth`].
#[derive(Clone)]
pub struct RestTableStore {
    auth: RestAuth,
}

impl RestTableStore {
    /// Create a table store that authenticates through `auth`.
    #[must_use]
    pub const fn new(auth: RestAuth) -> Self {
        Self { auth }
    }

    fn table_url(&self, collection: &str, id: Option<ProductId>) -> Result<Url, RemoteError> {
        let mut url = endpoint(self.auth.base_url(), &format!("rest/v1/{collection}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            if let Some(id) = id {
                query.append_pair("id", &format!("eq.{id}"));
            }
        }
        Ok(url)
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder, RemoteError> {
        let token = self.auth.access_token().await?;
        Ok(self
            .auth
            .client()
            .request(method, url)
            .header(API_KEY_HEADER, self.auth.api_key())
            .bearer_auth(token.expose_secret()))
    }

    /// Send, classify and decode the affected rows.
    async fn rows(&self, request: RequestBuilder) -> Result<Vec<Value>, RemoteError> {
        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let response = match check_status(response).await {
            Err(e) if session_rejected(&e) => {
                self.auth.invalidate().await;
                return Err(e);
            }
            other => other?,
        };
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

/// Whether the backend no longer accepts the session's token. A permission
/// denial on one row leaves the session intact.
const fn session_rejected(err: &RemoteError) -> bool {
    matches!(err, RemoteError::Unauthorized(_))
}

/// The single row an id filter matched.
fn single_row(rows: Vec<Value>) -> Result<Value, RemoteError> {
    rows.into_iter().next().ok_or(RemoteError::NotFound)
}

impl TableStore for RestTableStore {
    #[instrument(skip(self))]
    async fn select_all(&self, collection: &str) -> Result<Vec<Value>, RemoteError> {
        let url = self.table_url(collection, None)?;
        let rows = self.rows(self.request(Method::GET, url).await?).await?;
        debug!(count = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn select_one(&self, collection: &str, id: ProductId) -> Result<Value, RemoteError> {
        let url = self.table_url(collection, Some(id))?;
        single_row(self.rows(self.request(Method::GET, url).await?).await?)
    }

    #[instrument(skip(self, fields))]
    async fn insert(&self, collection: &str, fields: &Value) -> Result<Value, RemoteError> {
        let url = self.table_url(collection, None)?;
        let request = self
            .request(Method::POST, url)
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(fields);
        single_row(self.rows(request).await?)
            .map_err(|_| RemoteError::Malformed("insert returned no row".to_string()))
    }

    #[instrument(skip(self, fields))]
    async fn update_by_id(
        &self,
        collection: &str,
        id: ProductId,
        fields: &Value,
    ) -> Result<(), RemoteError> {
        let url = self.table_url(collection, Some(id))?;
        let request = self
            .request(Method::PATCH, url)
            .await?
            .header("Prefer", RETURN_REPRESENTATION)
            .json(fields);
        single_row(self.rows(request).await?).map(drop)
    }

    #[instrument(skip(self))]
    async fn delete_by_id(&self, collection: &str, id: ProductId) -> Result<(), RemoteError> {
        let url = self.table_url(collection, Some(id))?;
        let request = self
            .request(Method::DELETE, url)
            .await?
            .header("Prefer", RETURN_REPRESENTATION);
        single_row(self.rows(request).await?).map(drop)
    }
}
