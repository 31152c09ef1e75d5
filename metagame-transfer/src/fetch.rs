//! Paginated fetching from a listing endpoint.
//!
//! Pages are requested one at a time, newest first:
//! - every request carries `per_page` plus whichever cursor halves are set
//! - a page shorter than `per_page` is the last one
//! - otherwise the cursor moves to the page's `last_timestamp` / `last_id`
//!
//! Failures are not retried; the first error aborts the whole fetch.

use std::future::Future;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use metagame_common::{Cursor, Page};

use crate::client::ApiClient;
use crate::error::{Error, Result};

/// Something that can return one page of a listing
pub trait PageSource<T>: Send + Sync {
    /// URL of the listing, for logs and errors
    fn url(&self) -> &str;

    /// Fetch one page with the given query parameters
    fn fetch_page(
        &self,
        query: &[(&'static str, String)],
    ) -> impl Future<Output = Result<Page<T>>> + Send;
}

/// Listing endpoint reached over HTTP
pub struct HttpPageSource {
    client: ApiClient,
    url: String,
}

impl HttpPageSource {
    pub fn new(client: ApiClient, url: String) -> Self {
        Self { client, url }
    }
}

impl<T> PageSource<T> for HttpPageSource
where
    T: DeserializeOwned + Send,
{
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_page(&self, query: &[(&'static str, String)]) -> Result<Page<T>> {
        let response = self
            .client
            .http()
            .get(&self.url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::http(&self.url, e))?;

        debug!(
            "Status: {}, content-type: {}",
            response.status(),
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
        );

        response
            .error_for_status()
            .map_err(|e| Error::http(&self.url, e))?
            .json::<Page<T>>()
            .await
            .map_err(|e| Error::http(&self.url, e))
    }
}

fn render_query(query: &[(&'static str, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Walk a listing to the end and return every item in the order received
pub async fn fetch_all<T, S>(source: &S, per_page: usize) -> Result<Vec<T>>
where
    S: PageSource<T>,
{
    let mut cursor = Cursor::default();
    let mut items = Vec::new();

    loop {
        let mut query = vec![("per_page", per_page.to_string())];
        query.extend(cursor.query_pairs());
        info!("Querying {}?{}", source.url(), render_query(&query));

        let Page {
            items: page,
            last_timestamp,
            last_id,
        } = source.fetch_page(&query).await?;

        let count = page.len();
        items.extend(page);
        debug!("Received {} items ({} total)", count, items.len());

        if count < per_page {
            break;
        }

        if !cursor.advance(last_timestamp, last_id) {
            return Err(Error::StalledCursor {
                url: source.url().to_string(),
                cursor,
            });
        }
    }

    Ok(items)
}
