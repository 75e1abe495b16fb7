use std::sync::Arc;

use reqwest_cookie_store::CookieStoreMutex;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::IgnoredAny, Serialize};

pub const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

pub fn watch_url(video_id: &str) -> String {
    format!("{}{}", WATCH_URL_PREFIX, video_id)
}

pub struct HttpClient {
    pub client: ClientWithMiddleware,
    pub cookies: Arc<CookieStoreMutex>,
}

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("reqwest middleware error: {0}")]
    ReqwestMiddlewareError(#[from] reqwest_middleware::Error),
    #[error("unexpected HTTP status {0}")]
    StatusError(reqwest::StatusCode),
    #[error("could not encode request body: {0}")]
    EncodeError(#[from] serde_json::Error),
}

impl HttpClient {
    /// Builds a cookie-carrying client that retries transient failures up to
    /// `max_retries` times. A budget of zero disables retrying.
    pub fn new(user_agent: &str, max_retries: u32) -> reqwest::Result<HttpClient> {
        let cookies = Arc::new(CookieStoreMutex::default());
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .cookie_provider(cookies.clone())
            .build()?;

        let client = reqwest_middleware::ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(HttpClient { client, cookies })
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, HttpError> {
        let resp = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(HttpError::StatusError(resp.status()));
        }

        resp.text().await.map_err(|e| e.into())
    }

    /// POSTs `body` as JSON with any extra headers and returns the response
    /// text. Non-2xx responses are errors.
    pub async fn post_json<T>(
        &self,
        url: &str,
        body: &T,
        headers: &[(&str, &str)],
    ) -> Result<String, HttpError>
    where
        T: Serialize + ?Sized,
    {
        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(body)?);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }

        let resp = req.send().await?;
        if !resp.status().is_success() {
            return Err(HttpError::StatusError(resp.status()));
        }

        resp.text().await.map_err(|e| e.into())
    }
}

/// Finds the JSON object assigned to `marker` inside an inline `<script>`,
/// e.g. `var ytInitialPlayerResponse = {...};`.
pub fn extract_json_assignment<'a>(html: &'a str, marker: &str) -> Option<&'a str> {
    let idx_marker = html.find(marker)? + marker.len();
    let idx_start = html[idx_marker..].find('{')? + idx_marker;
    let rest = &html[idx_start..];

    // Let the JSON parser find where the object ends; braces inside strings
    // would fool a plain search for "};".
    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<IgnoredAny>();
    match stream.next() {
        Some(Ok(_)) => Some(&rest[..stream.byte_offset()]),
        _ => None,
    }
}
