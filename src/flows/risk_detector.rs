use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

use crate::api::{ExpertSystem, RiskResult};
use crate::delay;
use crate::facts::{Draft, Fact, FactCatalog};
use crate::flows::{display_error, FormError, MountHandle};
use crate::logging::{self, obj, v_bool, v_num, v_str, Domain};
use crate::nav::{guard, Route};
use crate::session::SessionContext;

/// Fixed threshold, independent of how many facts the backend offers.
pub const MIN_FACTS: usize = 3;

pub const NOT_SPECIFIED: &str = "Not specified";

const FACTS_FALLBACK: &str = "Failed to load facts";
const EVALUATE_FALLBACK: &str = "Failed to evaluate dropout risk. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskPhase {
    CheckingAuth,
    Unauthenticated,
    LoadingFacts,
    Ready,
    Submitting,
    ResultShown,
}

/// One entry of a fact selector. The empty value means "not specified".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption<'a> {
    pub value: &'a str,
    pub label: &'a str,
}

pub fn selector_options(fact: &Fact) -> Vec<SelectOption<'_>> {
    std::iter::once(SelectOption {
        value: "",
        label: NOT_SPECIFIED,
    })
    .chain(fact.options.iter().map(|o| SelectOption {
        value: o.as_str(),
        label: o.as_str(),
    }))
    .collect()
}

pub struct RiskDetector {
    api: Arc<dyn ExpertSystem>,
    session: SessionContext,
    min_visible: Duration,
    reveal_settle: Duration,
    phase: watch::Sender<RiskPhase>,
    catalog: Option<FactCatalog>,
    draft: Draft,
    error: Option<String>,
    result: Option<RiskResult>,
    mount: MountHandle,
}

impl RiskDetector {
    pub fn new(
        api: Arc<dyn ExpertSystem>,
        session: SessionContext,
        min_visible: Duration,
        reveal_settle: Duration,
    ) -> Self {
        let (phase, _rx) = watch::channel(RiskPhase::CheckingAuth);
        Self {
            api,
            session,
            min_visible,
            reveal_settle,
            phase,
            catalog: None,
            draft: Draft::default(),
            error: None,
            result: None,
            mount: MountHandle::new(),
        }
    }

    /// Route guard, run once per mount. A missing token redirects to login
    /// before any fact is fetched.
    pub fn mount(&mut self) -> Option<Route> {
        self.phase.send_replace(RiskPhase::CheckingAuth);
        if let Some(redirect) = guard(Route::RiskDetector, &self.session.read()) {
            self.phase.send_replace(RiskPhase::Unauthenticated);
            logging::info(Domain::Risk, "risk.unauthenticated", obj(&[("route", v_str(redirect.path()))]));
            return Some(redirect);
        }
        self.phase.send_replace(RiskPhase::LoadingFacts);
        None
    }

    /// Fetch the catalog. On failure the page stays in `LoadingFacts` with
    /// the error shown; nothing retries.
    pub async fn load_facts(&mut self) -> Result<(), FormError> {
        if self.phase() != RiskPhase::LoadingFacts {
            return Err(FormError::NotReady);
        }
        let fetched = self.api.facts().await;
        if !self.mount.is_mounted() {
            logging::debug(Domain::Risk, "risk.discarded", obj(&[("msg", v_str("facts"))]));
            return Err(FormError::Unmounted);
        }
        match fetched {
            Ok(catalog) => {
                logging::info(Domain::Risk, "risk.facts_loaded", obj(&[("count", v_num(catalog.len() as f64))]));
                self.catalog = Some(catalog);
                self.error = None;
                self.phase.send_replace(RiskPhase::Ready);
                Ok(())
            }
            Err(err) => {
                let message = display_error(&err, FACTS_FALLBACK);
                logging::warn(Domain::Risk, "risk.facts_failed", obj(&[("msg", v_str(&message))]));
                self.error = Some(message);
                Err(FormError::Api(err))
            }
        }
    }

    pub fn mount_handle(&self) -> MountHandle {
        self.mount.clone()
    }

    pub fn phase(&self) -> RiskPhase {
        *self.phase.borrow()
    }

    pub fn watch_phase(&self) -> watch::Receiver<RiskPhase> {
        self.phase.subscribe()
    }

    pub fn catalog(&self) -> Option<&FactCatalog> {
        self.catalog.as_ref()
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn result(&self) -> Option<&RiskResult> {
        self.result.as_ref()
    }

    pub fn filled_count(&self) -> usize {
        self.draft.filled_count()
    }

    pub fn total_facts(&self) -> usize {
        self.catalog.as_ref().map(FactCatalog::len).unwrap_or(0)
    }

    pub fn can_submit(&self) -> bool {
        self.catalog.is_some() && self.phase() != RiskPhase::Submitting && self.filled_count() >= MIN_FACTS
    }

    /// Change one selector. `None` or an empty value clears it; any other
    /// value must be one of the options the backend offered for that fact.
    pub fn select(&mut self, fact_id: &str, value: Option<&str>) -> Result<(), FormError> {
        let catalog = self.catalog.as_ref().ok_or(FormError::NotReady)?;
        let fact = catalog
            .get(fact_id)
            .ok_or_else(|| FormError::UnknownFact(fact_id.to_string()))?;
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            if !fact.allows(v) {
                return Err(FormError::UnknownOption {
                    fact: fact_id.to_string(),
                    value: v.to_string(),
                });
            }
        }
        self.draft.set(fact_id, value);
        Ok(())
    }

    pub async fn submit(&mut self) -> Result<&RiskResult, FormError> {
        if self.catalog.is_none() {
            return Err(FormError::NotReady);
        }
        if self.phase() == RiskPhase::Submitting {
            return Err(FormError::Busy);
        }
        self.error = None;
        self.result = None;

        let provided = self.filled_count();
        if provided < MIN_FACTS {
            let err = FormError::NotEnoughFacts {
                provided,
                required: MIN_FACTS,
            };
            self.error = Some(err.to_string());
            self.phase.send_replace(RiskPhase::Ready);
            return Err(err);
        }

        self.phase.send_replace(RiskPhase::Submitting);
        let request = self.draft.to_request();
        let session = self.session.read();
        logging::info(
            Domain::Risk,
            "risk.submit",
            obj(&[
                ("facts", v_num(request.len() as f64)),
                ("authenticated", v_bool(session.is_logged_in())),
            ]),
        );

        let outcome = delay::at_least_ok(
            self.min_visible,
            self.api.evaluate_dropout_risk(&request, session.token()),
        )
        .await;

        if !self.mount.is_mounted() {
            logging::debug(Domain::Risk, "risk.discarded", obj(&[("msg", v_str("evaluation"))]));
            return Err(FormError::Unmounted);
        }

        match outcome {
            Ok(result) => {
                logging::info(
                    Domain::Risk,
                    "risk.result",
                    obj(&[
                        ("risk_level", v_str(&result.risk_level.to_string())),
                        ("will_dropout", v_bool(result.will_dropout)),
                        ("remedies", v_num(result.remedies.len() as f64)),
                    ]),
                );
                self.phase.send_replace(RiskPhase::ResultShown);
                Ok(self.result.insert(result))
            }
            Err(err) => {
                let message = display_error(&err, EVALUATE_FALLBACK);
                logging::warn(Domain::Risk, "risk.failure", obj(&[("msg", v_str(&message))]));
                self.error = Some(message);
                self.phase.send_replace(RiskPhase::Ready);
                Err(FormError::Api(err))
            }
        }
    }

    /// Delay before the result panel is brought into view, once a result is
    /// on screen.
    pub fn reveal_after(&self) -> Option<Duration> {
        match self.phase() {
            RiskPhase::ResultShown => Some(self.reveal_settle),
            _ => None,
        }
    }
}
