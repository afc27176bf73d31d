//! HTTP transport for sending calls.

use crate::config::Config;
use crate::Error;
use async_trait::async_trait;
use tracing::debug;

/// An outgoing `POST` request, ready to send.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Look up a header by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// What the SDK reads from a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self { status }
    }
}

/// Sends requests to the Postlog API.
///
/// The client owns one of these. Inject a custom implementation with
/// [`PostlogBuilder::transport`](crate::PostlogBuilder::transport) to test
/// without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response status.
    async fn send(&self, request: Request) -> Result<Response, Error>;
}

/// HTTP transport backed by reqwest.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        debug!(url = %request.url, bytes = request.body.len(), "sending request");

        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }

        let response = builder.body(request.body).send().await?;

        // The body is not part of the contract; only the status is read.
        Ok(Response::new(response.status().as_u16()))
    }
}
