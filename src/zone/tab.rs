use crate::config::ConsentConfig;
use crate::consent::{ConsentController, ControllerState, DataLayer};
use crate::cookies::CookieJarHandle;
use crate::monitor::{ChannelPort, CookieMonitor};
use std::fmt::Display;
use std::sync::Arc;
use uuid::Uuid;

/// A unique identifier for a tab (an execution context of the zone's origin).
///
/// Treat it as an opaque handle; the UUID inside is an implementation detail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(Uuid);

impl TabId {
    /// Create a new unique `TabId` using a random UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One open page of the zone's origin.
///
/// A tab owns its cookie monitor (the interception point for its script writes), its
/// data layer and, when consent mode is enabled, the controller feeding that data layer.
#[derive(Debug)]
pub struct Tab {
    pub id: TabId,
    monitor: Arc<CookieMonitor>,
    data_layer: Arc<DataLayer>,
    controller: Option<ConsentController>,
}

impl Tab {
    pub(crate) fn open(id: TabId, jar: CookieJarHandle, port: Option<ChannelPort>, config: &ConsentConfig) -> Self {
        let monitor = Arc::new(CookieMonitor::new(id, jar, port));
        let data_layer = Arc::new(DataLayer::new());

        let controller = config.consent_mode.then(|| {
            let mut controller = ConsentController::new(config.clone(), data_layer.clone());
            controller.start(monitor.clone());
            controller
        });

        Self {
            id,
            monitor,
            data_layer,
            controller,
        }
    }

    pub fn monitor(&self) -> &Arc<CookieMonitor> {
        &self.monitor
    }

    pub fn data_layer(&self) -> &Arc<DataLayer> {
        &self.data_layer
    }

    /// The controller's state; `None` when consent mode is disabled.
    pub fn controller_state(&self) -> Option<ControllerState> {
        self.controller.as_ref().map(ConsentController::state)
    }

    /// Script-visible cookie string of this tab.
    pub fn cookie(&self) -> String {
        self.monitor.cookie()
    }

    /// Assigns `document.cookie` from this tab.
    pub fn set_cookie(&self, assignment: &str) {
        self.monitor.set_cookie(assignment);
    }
}
