use std::fmt;
use std::time::Duration;

use policy_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
}

impl OllamaClient {
    /// Create a client for an Ollama server given as `http(s)://host[:port]`.
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();

        let authority = base_url
            .strip_prefix("http://")
            .or_else(|| base_url.strip_prefix("https://"))
            .ok_or_else(|| invalid_url(&base_url, "scheme must be http or https"))?;

        if authority.is_empty() {
            return Err(invalid_url(&base_url, "host is required"));
        }
        if authority.contains(['/', '@', '?', '#']) {
            return Err(invalid_url(&base_url, "only scheme, host and port are allowed"));
        }

        let (host, port) =
            split_host_port(authority).ok_or_else(|| invalid_url(&base_url, "malformed host"))?;
        if host.is_empty() {
            return Err(invalid_url(&base_url, "host is required"));
        }
        if let Some(port) = port {
            match port.parse::<u16>() {
                Ok(p) if p != 0 => {}
                _ => return Err(invalid_url(&base_url, "port must be within 1..=65535")),
            }
        }

        Ok(Self { base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn health_check(&self) -> Result<(), AppError> {
        let url = format!("{}/api/tags", self.base_url);
        let resp = ureq::get(&url).timeout(Duration::from_millis(800)).call();

        match resp {
            Ok(r) if r.status() == 200 => Ok(()),
            Ok(r) => Err(
                AppError::new("OLLAMA_UNHEALTHY", "Ollama health check failed")
                    .with_details(format!("status={}", r.status())),
            ),
            Err(e) => Err(AppError::new("OLLAMA_UNREACHABLE", "Failed to reach Ollama")
                .with_details(format!("base_url={}; err={}", self.base_url, e))
                .with_retryable(true)),
        }
    }
}

/// Why a JSON call to Ollama failed. Callers map it onto their own error codes.
#[derive(Debug)]
pub(crate) enum CallFailure {
    Encode(String),
    Status { code: u16, body: String },
    Timeout,
    Transport(String),
    Decode(String),
}

impl CallFailure {
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, CallFailure::Timeout | CallFailure::Transport(_))
    }
}

impl fmt::Display for CallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallFailure::Encode(e) => write!(f, "encode: {e}"),
            CallFailure::Status { code, body } => write!(f, "status={code}; body={body}"),
            CallFailure::Timeout => write!(f, "timed out"),
            CallFailure::Transport(e) => write!(f, "transport: {e}"),
            CallFailure::Decode(e) => write!(f, "decode: {e}"),
        }
    }
}

impl OllamaClient {
    /// POST `body` as JSON to `path` (e.g. `/api/generate`) and decode the JSON reply.
    pub(crate) fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
        timeout: Duration,
    ) -> Result<Resp, CallFailure>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let value = serde_json::to_value(body).map_err(|e| CallFailure::Encode(e.to_string()))?;

        match ureq::post(&url).timeout(timeout).send_json(value) {
            Ok(r) if r.status() == 200 => r
                .into_json::<Resp>()
                .map_err(|e| CallFailure::Decode(e.to_string())),
            Ok(r) => Err(CallFailure::Status {
                code: r.status(),
                body: String::new(),
            }),
            Err(ureq::Error::Status(code, r)) => Err(CallFailure::Status {
                code,
                body: r.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(t)) if is_timeout(&t) => Err(CallFailure::Timeout),
            Err(ureq::Error::Transport(t)) => Err(CallFailure::Transport(t.to_string())),
        }
    }
}

fn invalid_url(base_url: &str, reason: &str) -> AppError {
    AppError::new("CONFIG_OLLAMA_URL_INVALID", "Ollama base URL is invalid")
        .with_details(format!("base_url={base_url}; reason={reason}"))
}

/// Split `host[:port]`, accepting bracketed IPv6 hosts.
fn split_host_port(authority: &str) -> Option<(&str, Option<&str>)> {
    if let Some(inner) = authority.strip_prefix('[') {
        let end = inner.find(']')?;
        let host = &authority[..end + 2];
        let after = &inner[end + 1..];
        if after.is_empty() {
            return Some((host, None));
        }
        return after.strip_prefix(':').map(|p| (host, Some(p)));
    }
    match authority.split_once(':') {
        Some((host, port)) => Some((host, Some(port))),
        None => Some((authority, None)),
    }
}

/// `true` when a transport failure was caused by a read/connect timeout.
fn is_timeout(err: &ureq::Transport) -> bool {
    use std::error::Error;

    let mut src = err.source();
    while let Some(s) = src {
        if let Some(io) = s.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        src = s.source();
    }
    false
}
