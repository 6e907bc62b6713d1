//! Outbound HTTPS transport shared by the status probe and the document
//! lookup path. Every request carries a bounded timeout; transient transport
//! failures are retried with capped exponential backoff, HTTP-level
//! responses never are.

use crate::config::SefazConfig;
use crate::error::RequestError;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tokio::time::{Duration, sleep, timeout};

type HttpsClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Raw upstream response. Non-success statuses are returned as-is; the
/// caller decides whether they are failures.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct HttpClient {
    inner: HttpsClient,
    request_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpClient {
    pub fn new(sefaz: &SefazConfig) -> Self {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        Self {
            inner: Client::builder(TokioExecutor::new()).build(https),
            request_timeout: Duration::from_secs(sefaz.request_timeout_secs),
            max_retries: sefaz.max_retries,
            retry_base_delay: Duration::from_millis(sefaz.retry_base_delay_ms),
        }
    }

    /// Issue a request, retrying transient transport failures up to
    /// `max_retries` times with delay `base * 2^(attempt - 1)`.
    #[tracing::instrument(skip(self, body), fields(url = %url))]
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        bearer: Option<&str>,
    ) -> Result<UpstreamResponse, RequestError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(method.clone(), url, body.clone(), bearer).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_base_delay * 2u32.pow(attempt - 1);
                    tracing::debug!(
                        name = "client.request.retry",
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "transient transport failure, backing off"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        bearer: Option<&str>,
    ) -> Result<UpstreamResponse, RequestError> {
        let uri: hyper::Uri = url
            .parse()
            .map_err(|_| RequestError::InvalidUrl(url.to_string()))?;

        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::USER_AGENT, "nfe-monitor/0.1")
            .header(header::ACCEPT, "application/json, application/xml");
        if body.is_some() {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| RequestError::Network(e.to_string()))?;

        let response = timeout(self.request_timeout, self.inner.request(request))
            .await
            .map_err(|_| RequestError::Timeout(self.request_timeout))?
            .map_err(|e| RequestError::Network(e.to_string()))?;

        let status = response.status();
        let body = timeout(self.request_timeout, response.into_body().collect())
            .await
            .map_err(|_| RequestError::Timeout(self.request_timeout))?
            .map_err(|e| RequestError::Network(e.to_string()))?
            .to_bytes();

        Ok(UpstreamResponse { status, body })
    }
}
