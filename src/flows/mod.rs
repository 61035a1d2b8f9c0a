//! Page state machines. Each flow owns its view state, talks to the backend
//! only through [`ExpertSystem`](crate::api::ExpertSystem), and publishes its
//! phase on a `watch` channel so a loading indicator can follow it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::api::ApiError;

pub mod knowledge_base;
pub mod login;
pub mod risk_detector;

pub use knowledge_base::{KnowledgeBaseView, KnowledgePhase};
pub use login::{LoginFlow, LoginPhase};
pub use risk_detector::{RiskDetector, RiskPhase};

/// Liveness flag shared between a page and whoever mounted it. Results that
/// resolve after `unmount` are dropped instead of applied.
#[derive(Debug, Clone)]
pub struct MountHandle(Arc<AtomicBool>);

impl MountHandle {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn unmount(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_mounted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for MountHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Please enter both email and password.")]
    MissingCredentials,

    #[error("Please provide at least {required} facts before running the expert system.")]
    NotEnoughFacts { provided: usize, required: usize },

    #[error("Unknown fact: {0}")]
    UnknownFact(String),

    #[error("{value:?} is not an allowed value for {fact}")]
    UnknownOption { fact: String, value: String },

    #[error("Facts are not loaded yet")]
    NotReady,

    #[error("A request is already in flight")]
    Busy,

    #[error("Page was closed before the response arrived")]
    Unmounted,

    #[error("Could not update session: {0}")]
    Session(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("{0}")]
    Api(#[from] ApiError),
}

/// Text to show for a failed call, falling back when the error carries none.
pub(crate) fn display_error(err: &ApiError, fallback: &str) -> String {
    let text = err.to_string();
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_handle_is_shared() {
        let handle = MountHandle::new();
        let copy = handle.clone();
        assert!(copy.is_mounted());
        handle.unmount();
        assert!(!copy.is_mounted());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(FormError::MissingCredentials.to_string(), "Please enter both email and password.");
        assert_eq!(
            FormError::NotEnoughFacts { provided: 2, required: 3 }.to_string(),
            "Please provide at least 3 facts before running the expert system."
        );
    }

    #[test]
    fn test_display_error_fallback() {
        let empty = ApiError::Transport(String::new());
        assert_eq!(display_error(&empty, "Failed to load facts"), "Failed to load facts");
        let http = ApiError::Http { status: 401, message: "Invalid credentials".into() };
        assert_eq!(display_error(&http, "unused"), "Invalid credentials");
    }
}
