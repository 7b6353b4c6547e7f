//! `HttpClient` over reqwest.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result, TransportFailure},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, StreamingResponse},
};
use futures_util::TryStreamExt;
use reqwest::Client;
use std::collections::HashMap;
use std::error::Error as _;
use std::io;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("drive-migration/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One attempt per call; failures are classified into [`TransportFailure`]
/// and left to the engine's retry controller.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Client whose requests time out after `timeout` unless the request
    /// carries its own.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(4)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<reqwest::Response> {
        debug!(method = ?request.method, url = %request.url, "Sending request");

        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (key, value) in request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder.send().await.map_err(|e| {
            let error = transport_error(e);
            warn!(error = %error, "Request failed before a response arrived");
            error
        })
    }
}

fn headers_of(response: &reqwest::Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.as_str().to_string(), s.to_string())))
        .collect()
}

/// Map a reqwest error onto the transport failure categories.
///
/// The io error kind wins when one is found in the source chain; resolver and
/// TLS failures are recognised by their message.
fn classify(error: &reqwest::Error) -> TransportFailure {
    if error.is_timeout() {
        return TransportFailure::Timeout;
    }

    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<io::Error>() {
            match io.kind() {
                io::ErrorKind::TimedOut => return TransportFailure::Timeout,
                io::ErrorKind::ConnectionRefused | io::ErrorKind::AddrNotAvailable => {
                    return TransportFailure::Unreachable
                }
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof => return TransportFailure::Interrupted,
                _ => {}
            }
        }

        let text = inner.to_string().to_lowercase();
        if text.contains("dns") || text.contains("resolve") {
            return TransportFailure::Unreachable;
        }
        if text.contains("tls") || text.contains("certificate") || text.contains("handshake") {
            return TransportFailure::Tls;
        }
        source = inner.source();
    }

    if error.is_connect() {
        TransportFailure::Unreachable
    } else if error.is_body() || error.is_decode() || error.is_request() {
        TransportFailure::Interrupted
    } else {
        TransportFailure::Other
    }
}

fn transport_error(error: reqwest::Error) -> BridgeError {
    BridgeError::Transport {
        failure: classify(&error),
        message: error.to_string(),
    }
}

/// Stream read errors keep enough of the classification for the fetcher to
/// tell a stalled download from a dropped one.
fn stream_error(error: reqwest::Error) -> io::Error {
    let kind = match classify(&error) {
        TransportFailure::Timeout => io::ErrorKind::TimedOut,
        _ => io::ErrorKind::ConnectionAborted,
    };
    io::Error::new(kind, error)
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers = headers_of(&response);
        let body = response.bytes().await.map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn download_stream(&self, request: HttpRequest) -> Result<StreamingResponse> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let headers = headers_of(&response);
        let reader = StreamReader::new(response.bytes_stream().map_err(stream_error));

        Ok(StreamingResponse {
            status,
            headers,
            body: Box::new(reader),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Put), reqwest::Method::PUT);
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Port 9 on loopback is the discard port and normally closed.
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let request = HttpRequest::new(HttpMethod::Get, "http://127.0.0.1:9/");

        match client.execute(request).await {
            Err(BridgeError::Transport { failure, .. }) => {
                assert!(matches!(
                    failure,
                    TransportFailure::Unreachable | TransportFailure::Timeout
                ));
            }
            other => panic!("expected transport error, got {:?}", other.map(|r| r.status)),
        }
    }

    #[tokio::test]
    async fn test_refused_download_is_unreachable() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_secs(2)).unwrap();
        let request = HttpRequest::new(HttpMethod::Get, "http://127.0.0.1:9/file");

        let err = client.download_stream(request).await.unwrap_err();
        assert!(err.kind().is_fatal_connectivity() || err.kind().is_retryable());
    }
}
