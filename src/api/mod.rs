use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;
use crate::facts::{FactCatalog, RiskRequest};

pub mod http;
pub mod types;

pub use http::{HttpClient, RequestOptions};
pub use types::{LoginRequest, LoginResponse, RiskLevel, RiskResult};

pub const LOGIN_PATH: &str = "/auth/login";
pub const FACTS_PATH: &str = "/expert-system/facts";
pub const DROPOUT_RISK_PATH: &str = "/expert-system/dropout-risk";

/// Failure of a backend call. `Display` is the text shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("{0}")]
    Transport(String),

    #[error("Invalid response from server: {0}")]
    Decode(String),

    #[error("Could not encode request: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The three operations the backend exposes to this client.
#[async_trait]
pub trait ExpertSystem: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
    async fn facts(&self) -> Result<FactCatalog, ApiError>;
    async fn evaluate_dropout_risk(&self, request: &RiskRequest, token: Option<&str>) -> Result<RiskResult, ApiError>;
}

pub struct ExpertSystemClient {
    http: HttpClient,
}

impl ExpertSystemClient {
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        Ok(Self {
            http: HttpClient::new(cfg)?,
        })
    }
}

#[async_trait]
impl ExpertSystem for ExpertSystemClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let opts = RequestOptions::post(&LoginRequest { email, password })?;
        self.http.request(LOGIN_PATH, opts).await
    }

    async fn facts(&self) -> Result<FactCatalog, ApiError> {
        self.http.request(FACTS_PATH, RequestOptions::get()).await
    }

    async fn evaluate_dropout_risk(&self, request: &RiskRequest, token: Option<&str>) -> Result<RiskResult, ApiError> {
        let opts = RequestOptions::post(request)?.with_token(token);
        self.http.request(DROPOUT_RISK_PATH, opts).await
    }
}
