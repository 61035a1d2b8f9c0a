use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::api::types::ErrorBody;
use crate::api::ApiError;
use crate::config::Config;
use crate::logging::{self, obj, token_fingerprint, v_num, v_str, Domain, ProfileScope};

/// Per-call options. Defaults to POST with no body and no token.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Serialized JSON, sent as-is.
    pub body: Option<String>,
    pub token: Option<String>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::POST,
            body: None,
            token: None,
        }
    }
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            ..Default::default()
        }
    }

    pub fn post<B: Serialize + ?Sized>(body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Encode(e.to_string()))?;
        Ok(Self {
            body: Some(body),
            ..Default::default()
        })
    }

    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.token = token.map(str::to_string);
        self
    }

    fn bearer(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.is_empty())
    }
}

/// The only component that talks to the network.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base: String,
}

impl HttpClient {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(cfg.http_timeout())
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base: cfg.api_base_url.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub async fn request<T: DeserializeOwned>(&self, path: &str, opts: RequestOptions) -> Result<T, ApiError> {
        let url = self.url(path);
        let _scope = ProfileScope::with_context("http.request", &[("path", v_str(path))]);

        let mut req = self
            .client
            .request(opts.method.clone(), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(token) = opts.bearer() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &opts.body {
            req = req.body(body.clone());
        }

        logging::debug(
            Domain::Http,
            "http.request",
            obj(&[
                ("path", v_str(path)),
                ("method", v_str(opts.method.as_str())),
                ("has_body", logging::v_bool(opts.body.is_some())),
                ("token_fp", opts.bearer().map(|t| v_str(&token_fingerprint(t))).unwrap_or(Value::Null)),
            ]),
        );

        let resp = req.send().await.map_err(|e| {
            logging::warn(Domain::Http, "http.error", obj(&[("path", v_str(path)), ("error", v_str(&e.to_string()))]));
            ApiError::Transport(e.to_string())
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| ApiError::Transport(e.to_string()))?;
        logging::debug(
            Domain::Http,
            "http.response",
            obj(&[("path", v_str(path)), ("status", v_num(status.as_u16() as f64))]),
        );

        if !status.is_success() {
            let message = error_message(status.as_u16(), &body);
            logging::warn(
                Domain::Http,
                "http.error",
                obj(&[
                    ("path", v_str(path)),
                    ("status", v_num(status.as_u16() as f64)),
                    ("msg", v_str(&message)),
                ]),
            );
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Human-readable text for a non-success response: the first non-empty
/// `message` or `error` string in the body, else a generic status line.
pub fn error_message(status: u16, body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    [parsed.message, parsed.error]
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| format!("Request failed with status {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_then_error() {
        assert_eq!(error_message(401, r#"{"message":"Invalid credentials"}"#), "Invalid credentials");
        assert_eq!(error_message(400, r#"{"error":"Bad request"}"#), "Bad request");
        assert_eq!(error_message(400, r#"{"message":"first","error":"second"}"#), "first");
        assert_eq!(error_message(400, r#"{"message":"","error":"second"}"#), "second");
    }

    #[test]
    fn test_error_message_falls_back_to_status() {
        assert_eq!(error_message(500, "<html>oops</html>"), "Request failed with status 500");
        assert_eq!(error_message(502, ""), "Request failed with status 502");
        assert_eq!(error_message(404, r#"{"detail":"nope"}"#), "Request failed with status 404");
        assert_eq!(error_message(418, r#"{"message":42}"#), "Request failed with status 418");
    }

    #[test]
    fn test_url_is_plain_concatenation() {
        let cfg = Config::default().with_api_base_url("http://api.local/v1");
        let client = HttpClient::new(&cfg).unwrap();
        assert_eq!(client.url("/auth/login"), "http://api.local/v1/auth/login");
    }

    #[test]
    fn test_empty_token_is_not_sent() {
        let opts = RequestOptions::get().with_token(Some(""));
        assert_eq!(opts.bearer(), None);
        let opts = RequestOptions::default().with_token(Some("abc"));
        assert_eq!(opts.bearer(), Some("abc"));
        assert_eq!(opts.method, Method::POST);
    }
}
