use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

use crate::api::ExpertSystem;
use crate::delay;
use crate::flows::{display_error, FormError, MountHandle};
use crate::logging::{self, obj, v_bool, v_str, Domain};
use crate::nav::Route;
use crate::session::SessionContext;

const LOGIN_FALLBACK: &str = "Login failed. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginPhase {
    Idle,
    Submitting,
    /// Idle with an inline error message; the form stays usable.
    Error(String),
    Redirecting,
}

pub struct LoginFlow {
    api: Arc<dyn ExpertSystem>,
    session: SessionContext,
    min_visible: Duration,
    pub email: String,
    pub password: String,
    phase: watch::Sender<LoginPhase>,
    mount: MountHandle,
}

impl LoginFlow {
    pub fn new(api: Arc<dyn ExpertSystem>, session: SessionContext, min_visible: Duration) -> Self {
        let (phase, _rx) = watch::channel(LoginPhase::Idle);
        Self {
            api,
            session,
            min_visible,
            email: String::new(),
            password: String::new(),
            phase,
            mount: MountHandle::new(),
        }
    }

    /// An existing session skips the form entirely.
    pub fn mount(&mut self) -> Option<Route> {
        if self.session.read().is_logged_in() {
            self.phase.send_replace(LoginPhase::Redirecting);
            return Some(Route::RiskDetector);
        }
        self.phase.send_replace(LoginPhase::Idle);
        None
    }

    pub fn mount_handle(&self) -> MountHandle {
        self.mount.clone()
    }

    pub fn phase(&self) -> LoginPhase {
        self.phase.borrow().clone()
    }

    pub fn watch_phase(&self) -> watch::Receiver<LoginPhase> {
        self.phase.subscribe()
    }

    pub fn error(&self) -> Option<String> {
        match &*self.phase.borrow() {
            LoginPhase::Error(msg) => Some(msg.clone()),
            _ => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        matches!(*self.phase.borrow(), LoginPhase::Submitting)
    }

    /// The submit control is disabled while a request is in flight.
    pub fn can_submit(&self) -> bool {
        matches!(*self.phase.borrow(), LoginPhase::Idle | LoginPhase::Error(_))
    }

    pub fn set_credentials(&mut self, email: &str, password: &str) {
        self.email = email.to_string();
        self.password = password.to_string();
    }

    pub async fn submit(&mut self) -> Result<Route, FormError> {
        if !self.can_submit() {
            return Err(FormError::Busy);
        }
        if self.email.is_empty() || self.password.is_empty() {
            let err = FormError::MissingCredentials;
            self.phase.send_replace(LoginPhase::Error(err.to_string()));
            return Err(err);
        }

        self.phase.send_replace(LoginPhase::Submitting);
        logging::info(Domain::Login, "login.submit", obj(&[("email", v_str(&self.email))]));

        let outcome = delay::at_least_ok(self.min_visible, self.api.login(&self.email, &self.password)).await;

        match outcome {
            Ok(resp) => {
                // The backend accepted the credentials; record that even if
                // the page has gone away meanwhile.
                self.session
                    .sign_in(&resp.token, resp.user_name.as_deref())
                    .map_err(|e| FormError::Session(e.to_string()))?;
                logging::info(
                    Domain::Login,
                    "login.success",
                    obj(&[("has_display_name", v_bool(resp.user_name.is_some()))]),
                );
                if !self.mount.is_mounted() {
                    return Err(FormError::Unmounted);
                }
                self.password.clear();
                self.phase.send_replace(LoginPhase::Redirecting);
                Ok(Route::RiskDetector)
            }
            Err(err) => {
                let message = display_error(&err, LOGIN_FALLBACK);
                logging::warn(Domain::Login, "login.failure", obj(&[("msg", v_str(&message))]));
                if !self.mount.is_mounted() {
                    return Err(FormError::Unmounted);
                }
                self.phase.send_replace(LoginPhase::Error(message));
                Err(FormError::Api(err))
            }
        }
    }
}
