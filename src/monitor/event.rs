use crate::zone::TabId;
use serde::{Deserialize, Serialize};

/// Name of the unified local notification.
pub const COOKIE_CHANGE_EVENT: &str = "cookiechange";

/// Full cookie strings before and after a change. This is also the JSON payload sent
/// over the cross-tab channel (`{"oldValue": ..., "newValue": ...}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieChange {
    pub old_value: String,
    pub new_value: String,
}

/// Where a cookie change was first observed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A write through this tab's interception point, or a reconcile in this tab
    Local,
    /// Relayed from another tab of the same origin
    CrossContext { sender: TabId },
}

/// The unified "cookie changed" notification delivered to listeners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieChangeEvent {
    pub detail: CookieChange,
    pub origin: ChangeOrigin,
}

impl CookieChangeEvent {
    pub fn name(&self) -> &'static str {
        COOKIE_CHANGE_EVENT
    }

    pub fn is_local(&self) -> bool {
        matches!(self.origin, ChangeOrigin::Local)
    }
}
