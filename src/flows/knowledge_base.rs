use std::sync::Arc;

use crate::api::ExpertSystem;
use crate::facts::FactCatalog;
use crate::flows::{display_error, FormError, MountHandle};
use crate::logging::{self, obj, v_num, v_str, Domain};

/// Minimum this page tells readers about. The risk detector enforces its own
/// threshold of three; the two are kept as they are stated.
pub const STATED_MINIMUM_FACTS: usize = 2;

const FACTS_FALLBACK: &str = "Failed to load facts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgePhase {
    Loading,
    Loaded,
    Failed,
}

/// Read-only listing of the fact catalog, fetched once per mount.
pub struct KnowledgeBaseView {
    api: Arc<dyn ExpertSystem>,
    phase: KnowledgePhase,
    catalog: Option<FactCatalog>,
    error: Option<String>,
    mount: MountHandle,
}

impl KnowledgeBaseView {
    pub fn new(api: Arc<dyn ExpertSystem>) -> Self {
        Self {
            api,
            phase: KnowledgePhase::Loading,
            catalog: None,
            error: None,
            mount: MountHandle::new(),
        }
    }

    pub fn mount_handle(&self) -> MountHandle {
        self.mount.clone()
    }

    pub async fn load(&mut self) -> Result<(), FormError> {
        let fetched = self.api.facts().await;
        if !self.mount.is_mounted() {
            return Err(FormError::Unmounted);
        }
        match fetched {
            Ok(catalog) => {
                logging::info(Domain::Knowledge, "knowledge.loaded", obj(&[("count", v_num(catalog.len() as f64))]));
                self.catalog = Some(catalog);
                self.phase = KnowledgePhase::Loaded;
                Ok(())
            }
            Err(err) => {
                let message = display_error(&err, FACTS_FALLBACK);
                logging::warn(Domain::Knowledge, "knowledge.failed", obj(&[("msg", v_str(&message))]));
                self.error = Some(message);
                self.phase = KnowledgePhase::Failed;
                Err(FormError::Api(err))
            }
        }
    }

    pub fn phase(&self) -> KnowledgePhase {
        self.phase
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn catalog(&self) -> Option<&FactCatalog> {
        self.catalog.as_ref()
    }

    /// `(label, "a / b / c")` per fact, in backend order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.catalog
            .iter()
            .flat_map(|c| c.iter())
            .map(|f| (f.label.clone(), f.options_line()))
            .collect()
    }
}
