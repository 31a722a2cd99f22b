use std::time::Duration;

use scr_core::config::ModelConfig;
use scr_core::error::{AppError, CONFIG_API_KEY_MISSING, CONFIG_INVALID};
use serde::Serialize;

/// Connection settings for an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Plain `http` is only accepted for a loopback host; everything else must be `https`.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;

        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(AppError::new(CONFIG_API_KEY_MISSING, "API key must not be empty"));
        }

        Ok(Self {
            base_url,
            api_key: api_key.to_string(),
            timeout: Duration::from_secs(60),
        })
    }

    pub fn from_config(cfg: &ModelConfig) -> Result<Self, AppError> {
        let key = cfg.api_key.as_deref().unwrap_or("");
        if key.trim().is_empty() {
            return Err(AppError::new(
                CONFIG_API_KEY_MISSING,
                "OPENAI_API_KEY is not set; export it or add it to the environment file",
            ));
        }
        Ok(Self::new(&cfg.api_base, key)?.with_timeout(Duration::from_secs(cfg.timeout_secs.max(1))))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body to `{base_url}/{path}` and decode the JSON reply.
    /// Transport errors, 429 and 5xx are marked retryable.
    pub(crate) fn post_json<Req, Resp>(&self, path: &str, body: &Req, code: &str) -> Result<Resp, AppError>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let value = serde_json::to_value(body).map_err(|e| {
            AppError::new(code, "Failed to encode request").with_details(e.to_string())
        })?;

        let resp = ureq::post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .timeout(self.timeout)
            .send_json(value);

        match resp {
            Ok(r) => r.into_json::<Resp>().map_err(|e| {
                AppError::new(code, "Failed to decode response")
                    .with_details(format!("path={path}; err={e}"))
            }),
            Err(ureq::Error::Status(status, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(AppError::new(code, "Request was rejected by the API")
                    .with_details(format!("path={path}; status={status}; body={}", clip(&body, 300)))
                    .with_retryable(status == 429 || status >= 500))
            }
            Err(e) => Err(AppError::new(code, "Failed to reach the API")
                .with_details(format!("path={path}; err={e}"))
                .with_retryable(true)),
        }
    }
}

fn validate_base_url(base_url: &str) -> Result<(), AppError> {
    let reject = |why: &str| {
        Err(AppError::new(CONFIG_INVALID, "API base URL is not allowed")
            .with_details(format!("base_url={base_url}; reason={why}")))
    };

    let (secure, rest) = if let Some(r) = base_url.strip_prefix("https://") {
        (true, r)
    } else if let Some(r) = base_url.strip_prefix("http://") {
        (false, r)
    } else {
        return reject("scheme must be http or https");
    };

    if rest.chars().any(|c| c.is_whitespace() || c == '?' || c == '#') {
        return reject("query, fragment and whitespace are not allowed");
    }

    let authority = rest.split('/').next().unwrap_or("");
    if authority.contains('@') {
        return reject("credentials in URL are not allowed");
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((h, p)) => (h, Some(p)),
        None => (authority, None),
    };
    if host.is_empty() {
        return reject("missing host");
    }
    if let Some(p) = port {
        match p.parse::<u16>() {
            Ok(n) if n > 0 => {}
            _ => return reject("invalid port"),
        }
    }

    if !secure && host != "127.0.0.1" && host != "localhost" {
        return reject("plain http is only allowed for 127.0.0.1 or localhost");
    }
    Ok(())
}

pub(crate) fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte, _)) => &s[..byte],
        None => s,
    }
}
