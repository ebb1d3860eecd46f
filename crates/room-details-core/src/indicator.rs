use std::sync::Mutex;

use tracing::{debug, warn};

use crate::{error::ProxyError, types::UserIndicator};

/// Sink for loading/progress indicators shown above the screen.
pub trait UserIndicatorController: Send + Sync {
    /// Show `indicator`, replacing any active indicator with the same id.
    fn submit_indicator(&self, indicator: UserIndicator);

    /// Hide the indicator with `id`. Unknown ids are ignored.
    fn retract_indicator(&self, id: &str);
}

/// Entry in the [`IndicatorQueue`] history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorEvent {
    Submitted(UserIndicator),
    Retracted(String),
}

#[derive(Debug, Default)]
struct IndicatorQueueInner {
    active: Vec<UserIndicator>,
    history: Vec<IndicatorEvent>,
}

/// In-memory indicator controller that keeps the active stack and a history.
#[derive(Debug, Default)]
pub struct IndicatorQueue {
    inner: Mutex<IndicatorQueueInner>,
}

impl IndicatorQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indicators currently shown, oldest first.
    pub fn active(&self) -> Result<Vec<UserIndicator>, ProxyError> {
        self.read(|inner| inner.active.clone())
    }

    /// Every submit/retract in call order.
    pub fn history(&self) -> Result<Vec<IndicatorEvent>, ProxyError> {
        self.read(|inner| inner.history.clone())
    }

    pub fn is_active(&self, id: &str) -> Result<bool, ProxyError> {
        self.read(|inner| inner.active.iter().any(|indicator| indicator.id == id))
    }

    fn read<T>(&self, f: impl FnOnce(&IndicatorQueueInner) -> T) -> Result<T, ProxyError> {
        self.inner
            .lock()
            .map(|inner| f(&inner))
            .map_err(|_| ProxyError::poisoned("indicator queue"))
    }
}

impl UserIndicatorController for IndicatorQueue {
    fn submit_indicator(&self, indicator: UserIndicator) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!(id = %indicator.id, "indicator queue poisoned; dropping submit");
            return;
        };
        debug!(id = %indicator.id, kind = ?indicator.kind, "submitting indicator");
        inner.active.retain(|active| active.id != indicator.id);
        inner.active.push(indicator.clone());
        inner.history.push(IndicatorEvent::Submitted(indicator));
    }

    fn retract_indicator(&self, id: &str) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!(%id, "indicator queue poisoned; dropping retract");
            return;
        };
        debug!(%id, "retracting indicator");
        inner.active.retain(|active| active.id != id);
        inner.history.push(IndicatorEvent::Retracted(id.to_owned()));
    }
}
