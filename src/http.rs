//! HTTP client utilities for talking to media backends.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, RequestBuilder};
use tokio::io::AsyncReadExt;

use crate::client::ClientError;
use crate::options::TransportOptions;

/// Build a configured HTTP client from transport options.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    match transport_options {
        TransportOptions::Http { timeout, proxy, .. } => {
            if let Some(t) = timeout {
                builder = builder.timeout(*t);
            }
            if let Some(proxy_url) = proxy {
                match reqwest::Proxy::all(proxy_url) {
                    Ok(p) => builder = builder.proxy(p),
                    Err(e) => tracing::warn!("Ignoring invalid proxy {}: {}", proxy_url, e),
                }
            }
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    transport_options: &TransportOptions,
) -> RequestBuilder {
    match transport_options {
        TransportOptions::Http { headers, .. } => {
            if let Some(h) = headers {
                for (key, value) in h {
                    request = request.header(key, value);
                }
            }
        }
    }
    request
}

/// Extension trait for RequestBuilder that logs request bodies.
pub trait RequestBuilderExt {
    /// Set JSON request body and log it. Returns the RequestBuilder for chaining.
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self;

    /// Set a raw binary body, logging only its size.
    fn bytes_logged(self, body: Bytes) -> Self;

    /// Stream `len` bytes of `file` as the body, logging only its size.
    fn file_logged(self, file: tokio::fs::File, len: u64) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn json_logged<T: serde::Serialize + ?Sized>(self, json: &T) -> Self {
        if let Ok(req_body) = serde_json::to_string_pretty(json) {
            tracing::debug!("API request body ({} bytes):\n{}", req_body.len(), req_body);
        }

        self.json(json)
    }

    fn bytes_logged(self, body: Bytes) -> Self {
        tracing::debug!("API request body: {} bytes of binary data", body.len());
        self.body(body)
    }

    fn file_logged(self, file: tokio::fs::File, len: u64) -> Self {
        tracing::debug!("API request body: {} bytes streamed from disk", len);
        self.header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(file_chunks(file)))
    }
}

const FILE_CHUNK_SIZE: usize = 64 * 1024;

fn file_chunks(mut file: tokio::fs::File) -> impl Stream<Item = std::io::Result<Bytes>> + Send {
    async_stream::try_stream! {
        let mut buf = BytesMut::with_capacity(FILE_CHUNK_SIZE);
        loop {
            buf.reserve(FILE_CHUNK_SIZE);
            if file.read_buf(&mut buf).await? == 0 {
                break;
            }
            yield buf.split().freeze();
        }
    }
}

/// Extension trait for Response that logs response bodies.
#[async_trait::async_trait]
pub trait ResponseExt {
    /// Get response text and log it. Consumes the response.
    async fn text_logged(self) -> Result<String, reqwest::Error>;

    /// Parse response as JSON and log it. Consumes the response.
    async fn json_logged<T: serde::de::DeserializeOwned>(self) -> Result<T, ClientError>;
}

#[async_trait::async_trait]
impl ResponseExt for reqwest::Response {
    async fn text_logged(self) -> Result<String, reqwest::Error> {
        let text = self.text().await?;
        tracing::debug!("API response ({} bytes):\n{}", text.len(), text);
        Ok(text)
    }

    async fn json_logged<T: serde::de::DeserializeOwned>(self) -> Result<T, ClientError> {
        let bytes = self.bytes().await?;

        if let Ok(text) = std::str::from_utf8(&bytes) {
            tracing::debug!("API response ({} bytes):\n{}", text.len(), text);
        }

        serde_json::from_slice(&bytes).map_err(ClientError::from)
    }
}
