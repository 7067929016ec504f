//! JSON-RPC 2.0 over plain HTTP/1.1.
//!
//! One TCP connection per call with `Connection: close`. The response body
//! is delimited by `Content-Length` or by the peer closing the socket;
//! chunked transfer encoding is rejected.

use async_trait::async_trait;
use log::trace;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::{ShhConfig, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_RPC_PATH};
use crate::error::ShhError;
use crate::gateway::RpcGateway;

const HEADER_END: &[u8] = b"\r\n\r\n";

#[derive(Debug)]
pub struct HttpGateway {
    endpoint: String,
    path: String,
    request_timeout: Duration,
    next_request_id: AtomicU64,
}

impl HttpGateway {
    /// `endpoint` is `host:port`. A leading `http://` is accepted and stripped,
    /// and a path after the authority (`http://host:8545/rpc`) becomes the
    /// request path.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let without_scheme = endpoint.strip_prefix("http://").unwrap_or(&endpoint);
        let (authority, path) = match without_scheme.split_once('/') {
            Some((authority, rest)) if !rest.trim_end_matches('/').is_empty() => {
                (authority, format!("/{}", rest.trim_end_matches('/')))
            }
            Some((authority, _)) => (authority, DEFAULT_RPC_PATH.to_owned()),
            None => (without_scheme, DEFAULT_RPC_PATH.to_owned()),
        };
        Self {
            endpoint: authority.to_owned(),
            path,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// A non-default `rpc_path` wins over a path embedded in `endpoint`.
    pub fn from_config(config: &ShhConfig) -> Result<Self, ShhError> {
        config.validate()?;
        let mut gateway =
            Self::new(config.endpoint.clone()).with_request_timeout(config.request_timeout());
        if config.rpc_path != DEFAULT_RPC_PATH {
            gateway = gateway.with_path(config.rpc_path.clone());
        }
        Ok(gateway)
    }

    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>, ShhError> {
        let mut stream = TcpStream::connect(&self.endpoint)
            .await
            .map_err(|err| ShhError::transport(format!("connect {}: {err}", self.endpoint)))?;
        stream.write_all(request).await.map_err(|err| ShhError::transport(err.to_string()))?;
        let mut response = Vec::new();
        stream
            .read_to_end(&mut response)
            .await
            .map_err(|err| ShhError::transport(err.to_string()))?;
        Ok(response)
    }
}

#[async_trait]
impl RpcGateway for HttpGateway {
    async fn call(&self, method: &str, params: Vec<JsonValue>) -> Result<JsonValue, ShhError> {
        let request_id = self.next_request_id();
        let frame = build_request_frame(request_id, method, params)?;
        let request = build_http_post(&self.path, &self.endpoint, &frame);
        trace!("rpc request id={request_id} method={method}");

        let response = tokio::time::timeout(self.request_timeout, self.round_trip(&request))
            .await
            .map_err(|_| ShhError::Timeout { operation: method.to_owned() })??;
        let body = parse_http_response_body(&response)?;
        parse_rpc_response(&body)
    }
}

pub(crate) fn build_request_frame(
    request_id: u64,
    method: &str,
    params: Vec<JsonValue>,
) -> Result<Vec<u8>, ShhError> {
    let frame = json!({
        "jsonrpc": "2.0",
        "id": request_id,
        "method": method,
        "params": params,
    });
    serde_json::to_vec(&frame).map_err(|err| ShhError::invalid_params(err.to_string()))
}

pub(crate) fn build_http_post(path: &str, host: &str, body: &[u8]) -> Vec<u8> {
    let mut request = Vec::new();
    request.extend_from_slice(format!("POST {path} HTTP/1.1\r\n").as_bytes());
    request.extend_from_slice(format!("Host: {host}\r\n").as_bytes());
    request.extend_from_slice(b"Content-Type: application/json\r\n");
    request.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    request.extend_from_slice(b"Connection: close\r\n");
    request.extend_from_slice(b"\r\n");
    request.extend_from_slice(body);
    request
}

pub(crate) fn parse_http_response_body(response: &[u8]) -> Result<Vec<u8>, ShhError> {
    let header_end = find_header_end(response)
        .ok_or_else(|| ShhError::transport("response is missing http headers"))?;
    let headers = String::from_utf8_lossy(&response[..header_end]);
    let body = &response[header_end + HEADER_END.len()..];

    let mut lines = headers.lines();
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| ShhError::transport(format!("invalid status line: {status_line}")))?;
    if !(200..300).contains(&status) {
        return Err(ShhError::transport(format!("http status {status}")));
    }

    let mut content_length = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();
        if name == "content-length" {
            content_length = Some(value.parse::<usize>().map_err(|_| {
                ShhError::transport(format!("invalid content-length: {value}"))
            })?);
        } else if name == "transfer-encoding" && value.eq_ignore_ascii_case("chunked") {
            return Err(ShhError::transport("chunked responses are not supported"));
        }
    }

    match content_length {
        Some(length) if body.len() < length => {
            Err(ShhError::transport("response body incomplete"))
        }
        Some(length) => Ok(body[..length].to_vec()),
        None => Ok(body.to_vec()),
    }
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<JsonValue>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    #[serde(default)]
    message: String,
}

pub(crate) fn parse_rpc_response(body: &[u8]) -> Result<JsonValue, ShhError> {
    let response: RpcResponse = serde_json::from_slice(body)
        .map_err(|err| ShhError::invalid_response(format!("malformed json-rpc response: {err}")))?;
    if let Some(error) = response.error {
        return Err(ShhError::Rpc { code: error.code, message: error.message });
    }
    Ok(response.result.unwrap_or(JsonValue::Null))
}

fn find_header_end(response: &[u8]) -> Option<usize> {
    response.windows(HEADER_END.len()).position(|window| window == HEADER_END)
}
