//! Minimal aria2 JSON-RPC client over libcurl.
//!
//! Each call is a blocking POST run on the blocking pool, off the async workers.

use serde_json::{json, Value};
use std::str;
use std::time::Duration;

use crate::engine::EngineError;

fn transport(e: curl::Error) -> EngineError {
    EngineError::Transport(e.to_string())
}

#[derive(Debug, Clone)]
pub(crate) struct RpcClient {
    url: String,
    secret: Option<String>,
    timeout: Duration,
}

impl RpcClient {
    pub(crate) fn new(url: impl Into<String>, secret: Option<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            secret,
            timeout,
        }
    }

    /// Invoke `method` with `params`; the secret token, if any, is prepended.
    pub(crate) async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, EngineError> {
        let body = self.request_body(method, params);
        let url = self.url.clone();
        let timeout = self.timeout;
        let method_name = method.to_string();
        let bytes = tokio::task::spawn_blocking(move || post_json(&url, &body, timeout))
            .await
            .map_err(|e| EngineError::Transport(format!("rpc task join: {e}")))??;
        let result = parse_response(&bytes);
        if let Err(ref e) = result {
            tracing::debug!(method = %method_name, "aria2 rpc failed: {}", e);
        }
        result
    }

    fn request_body(&self, method: &str, params: Vec<Value>) -> Vec<u8> {
        let mut full = Vec::with_capacity(params.len() + 1);
        if let Some(secret) = &self.secret {
            full.push(Value::String(format!("token:{secret}")));
        }
        full.extend(params);
        json!({
            "jsonrpc": "2.0",
            "id": "mdq",
            "method": method,
            "params": full,
        })
        .to_string()
        .into_bytes()
    }
}

/// POST `body` to `url` and return the response body.
/// aria2 answers RPC errors with HTTP 400 and a JSON error object, so the
/// body is returned for any status that carries one.
fn post_json(url: &str, body: &[u8], timeout: Duration) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(transport)?;
    easy.post(true).map_err(transport)?;
    easy.post_fields_copy(body).map_err(transport)?;
    easy.connect_timeout(timeout).map_err(transport)?;
    easy.timeout(timeout).map_err(transport)?;

    let mut headers = curl::easy::List::new();
    headers
        .append("Content-Type: application/json")
        .map_err(transport)?;
    easy.http_headers(headers).map_err(transport)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                out.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(transport)?;
        transfer.perform().map_err(transport)?;
    }

    let code = easy.response_code().map_err(transport)?;
    if out.is_empty() && !(200..300).contains(&code) {
        return Err(EngineError::Transport(format!("HTTP {code} from {url}")));
    }
    Ok(out)
}

/// Extract `result` from a JSON-RPC response, or map `error` to [`EngineError::Rpc`].
pub(crate) fn parse_response(bytes: &[u8]) -> Result<Value, EngineError> {
    let mut value: Value = serde_json::from_slice(bytes).map_err(|e| {
        let preview = str::from_utf8(bytes).unwrap_or("<binary>");
        EngineError::Protocol(format!("invalid JSON ({e}): {preview:.120}"))
    })?;
    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        return Err(EngineError::Rpc(format!("{message} (code {code})")));
    }
    match value.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(EngineError::Protocol("response has neither result nor error".to_string())),
    }
}
