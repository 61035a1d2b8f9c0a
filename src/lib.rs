//! Client for the student dropout-risk expert system.
//!
//! All inference lives behind the backend's HTTP API; this crate collects
//! facts, keeps the session, and renders what the backend returns.

pub mod api;
pub mod app;
pub mod config;
pub mod delay;
pub mod facts;
pub mod flows;
pub mod logging;
pub mod nav;
pub mod render;
pub mod session;
pub mod storage;
