//! Docker Engine API client.
//!
//! Speaks HTTP/1.1 directly over the engine socket. Every request opens its
//! own connection; streamed responses keep that connection alive until the
//! body has been consumed.

use async_trait::async_trait;
use http::{header, Method, Request, Response, StatusCode};
use hyper::body::HttpBody;
use hyper::Body;
use serde::Deserialize;

use d2w_core::error::{ConvertError, Result};
use d2w_core::ConvertConfig;

use super::endpoint::EngineEndpoint;
use super::{ByteStream, ImageEngine};
use crate::reference::ImageReference;

/// Error body returned by the engine on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Response body of `POST /containers/create`.
#[derive(Debug, Deserialize)]
struct CreatedContainer {
    #[serde(rename = "Id")]
    id: String,
    #[serde(default, rename = "Warnings")]
    warnings: Option<Vec<String>>,
}

/// Image engine backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    endpoint: EngineEndpoint,
}

impl DockerEngine {
    pub fn new(endpoint: EngineEndpoint) -> Self {
        Self { endpoint }
    }

    /// Create a client from a `DOCKER_HOST`-style URI.
    pub fn from_host(host: &str) -> Result<Self> {
        Ok(Self::new(EngineEndpoint::parse(host)?))
    }

    /// Create a client for the configured endpoint.
    ///
    /// Fails when the configuration asks for a transport the client cannot
    /// provide.
    pub fn from_config(config: &ConvertConfig) -> Result<Self> {
        let endpoint = EngineEndpoint::parse(&config.engine_host)?;
        endpoint.check_transport(config.engine_tls_verify)?;
        Ok(Self::new(endpoint))
    }

    pub fn endpoint(&self) -> &EngineEndpoint {
        &self.endpoint
    }

    fn unavailable(&self, err: impl std::fmt::Display) -> ConvertError {
        ConvertError::EngineUnavailable {
            endpoint: self.endpoint.to_string(),
            message: err.to_string(),
        }
    }

    fn request(&self, method: Method, path_and_query: &str) -> http::request::Builder {
        Request::builder()
            .method(method)
            .uri(path_and_query)
            .header(header::HOST, self.endpoint.host_header())
    }

    /// Send a request over a fresh connection and check the status.
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        tracing::debug!(
            method = %request.method(),
            uri = %request.uri(),
            endpoint = %self.endpoint,
            "Engine request"
        );

        let io = self.endpoint.connect().await?;
        let (mut sender, connection) = hyper::client::conn::handshake(io)
            .await
            .map_err(|e| self.unavailable(e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::debug!(error = %e, "Engine connection closed with error");
            }
        });

        let response = sender
            .send_request(request)
            .await
            .map_err(|e| self.unavailable(e))?;

        check_status(response).await
    }
}

/// Turn a non-success response into an `EngineApi` error.
async fn check_status(response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = hyper::body::to_bytes(response.into_body())
        .await
        .unwrap_or_default();
    Err(ConvertError::EngineApi {
        status: status.as_u16(),
        message: api_error_message(status, &body),
    })
}

fn api_error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(err) = serde_json::from_slice::<ApiError>(body) {
        return err.message;
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        text
    }
}

/// Adapt a response body into a [`ByteStream`].
fn body_stream(body: Body) -> ByteStream {
    Box::pin(futures::stream::unfold(body, |mut body| async move {
        let chunk = body.data().await?;
        let chunk = chunk.map_err(|e| {
            ConvertError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e))
        });
        Some((chunk, body))
    }))
}

/// Percent-encode a query string from key/value pairs.
fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

fn build_request_error(e: http::Error) -> ConvertError {
    ConvertError::ConfigError(format!("Failed to build engine request: {e}"))
}

#[async_trait]
impl ImageEngine for DockerEngine {
    async fn ping(&self) -> Result<()> {
        let request = self
            .request(Method::GET, "/_ping")
            .body(Body::empty())
            .map_err(build_request_error)?;
        self.send(request).await?;
        Ok(())
    }

    async fn build_image(&self, context: Vec<u8>, dockerfile: &str, tag: &str) -> Result<ByteStream> {
        let query = encode_query(&[("t", tag), ("dockerfile", dockerfile), ("rm", "0")]);
        let request = self
            .request(Method::POST, &format!("/build?{query}"))
            .header(header::CONTENT_TYPE, "application/x-tar")
            .body(Body::from(context))
            .map_err(build_request_error)?;

        let response = self.send(request).await?;
        Ok(body_stream(response.into_body()))
    }

    async fn pull_image(&self, reference: &ImageReference) -> Result<ByteStream> {
        let (from_image, tag) = reference.pull_params();
        let query = encode_query(&[("fromImage", from_image.as_str()), ("tag", tag.as_str())]);
        let request = self
            .request(Method::POST, &format!("/images/create?{query}"))
            .body(Body::empty())
            .map_err(build_request_error)?;

        let response = self.send(request).await?;
        Ok(body_stream(response.into_body()))
    }

    async fn create_container(&self, image: &str, name: &str) -> Result<String> {
        let query = encode_query(&[("name", name)]);
        let body = serde_json::to_vec(&serde_json::json!({ "Image": image }))?;
        let request = self
            .request(Method::POST, &format!("/containers/create?{query}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(build_request_error)?;

        let response = self.send(request).await?;
        let bytes = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|e| self.unavailable(e))?;
        let created: CreatedContainer = serde_json::from_slice(&bytes)?;

        for warning in created.warnings.unwrap_or_default() {
            tracing::warn!(container = %name, %warning, "Engine warning on container create");
        }
        Ok(created.id)
    }

    async fn export_container(&self, id: &str) -> Result<ByteStream> {
        let request = self
            .request(Method::GET, &format!("/containers/{}/export", encode_component(id)))
            .body(Body::empty())
            .map_err(build_request_error)?;

        let response = self.send(request).await?;
        Ok(body_stream(response.into_body()))
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        let query = encode_query(&[("force", "true"), ("v", "true")]);
        let request = self
            .request(
                Method::DELETE,
                &format!("/containers/{}?{query}", encode_component(id)),
            )
            .body(Body::empty())
            .map_err(build_request_error)?;

        self.send(request).await?;
        Ok(())
    }
}
