use crate::config::ConsentConfig;
use crate::cookies::{CookieJarHandle, DefaultCookieJar};
use crate::errors::ConsentError;
use crate::monitor::BroadcastHub;
use crate::zone::tab::{Tab, TabId};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError};
use uuid::Uuid;

/// A unique identifier for a zone, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(Uuid);

impl ZoneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ZoneId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// A zone is one origin as seen by the browser: all of its tabs share a single cookie jar
// and can talk to each other over the broadcast hub. Tabs never see the zone; they only
// hold the jar handle and their own channel port.
pub struct Zone {
    /// ID of the zone
    pub id: ZoneId,
    /// Origin all tabs of this zone belong to
    origin: url::Origin,
    /// Configuration handed to every tab
    config: ConsentConfig,
    /// Cookie jar shared between all tabs
    cookie_jar: CookieJarHandle,
    /// Cross-tab channels; may be shared with other zones
    hub: Arc<BroadcastHub>,
    /// Tabs in the zone, ordered by id
    tabs: BTreeMap<TabId, Tab>,
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("origin", &self.origin.ascii_serialization())
            .field("tabs", &self.tabs.len())
            .finish_non_exhaustive()
    }
}

impl Zone {
    /// Creates a zone for `origin` with an empty cookie jar and its own broadcast hub.
    pub fn new(origin: url::Origin, config: ConsentConfig) -> Result<Self, ConsentError> {
        let hub = Arc::new(BroadcastHub::new(config.channel_capacity));
        Self::with_hub(origin, config, hub)
    }

    /// Creates a zone that joins channels on an existing hub.
    pub fn with_hub(origin: url::Origin, config: ConsentConfig, hub: Arc<BroadcastHub>) -> Result<Self, ConsentError> {
        config.validate()?;

        Ok(Self {
            id: ZoneId::new(),
            origin,
            config,
            cookie_jar: DefaultCookieJar::new().into_handle(),
            hub,
            tabs: BTreeMap::new(),
        })
    }

    pub fn origin(&self) -> &url::Origin {
        &self.origin
    }

    pub fn config(&self) -> &ConsentConfig {
        &self.config
    }

    pub fn cookie_jar(&self) -> CookieJarHandle {
        self.cookie_jar.clone()
    }

    // Open a new tab into the zone
    pub fn open_tab(&mut self) -> Result<TabId, ConsentError> {
        if self.tabs.len() >= self.config.max_tabs {
            return Err(ConsentError::TabLimitExceeded);
        }

        let tab_id = TabId::new();
        let port = self
            .config
            .cross_context_sync
            .then(|| self.hub.join(&self.origin, &self.config.channel_name, tab_id));

        let tab = Tab::open(tab_id, self.cookie_jar.clone(), port, &self.config);
        log::debug!("Zone[{}]: opened tab {}", self.id, tab_id);
        self.tabs.insert(tab_id, tab);
        Ok(tab_id)
    }

    /// Closes a tab, dropping its controller and channel membership.
    pub fn close_tab(&mut self, tab_id: TabId) -> Result<(), ConsentError> {
        self.tabs.remove(&tab_id).map(|_| ()).ok_or(ConsentError::InvalidTabId)
    }

    pub fn tab(&self, tab_id: TabId) -> Option<&Tab> {
        self.tabs.get(&tab_id)
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.keys().copied().collect()
    }

    /// Performs a script cookie write from `tab_id`.
    pub fn set_cookie(&self, tab_id: TabId, assignment: &str) -> Result<(), ConsentError> {
        let tab = self.tabs.get(&tab_id).ok_or(ConsentError::InvalidTabId)?;
        tab.set_cookie(assignment);
        Ok(())
    }

    /// Applies `Set-Cookie` headers of a network response. This path is not intercepted;
    /// tabs only notice it on [`Zone::reconcile`].
    pub fn store_response_cookies(&self, headers: &HeaderMap) {
        self.cookie_jar
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .store_response_cookies(headers);
    }

    /// Drops every cookie of the zone, like clearing site data. Tabs notice it on
    /// [`Zone::reconcile`].
    pub fn clear_cookies(&self) {
        self.cookie_jar.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Lets `tab_id` compare the jar against its last observed state. Returns whether a
    /// change was announced.
    pub fn reconcile(&self, tab_id: TabId) -> Result<bool, ConsentError> {
        let tab = self.tabs.get(&tab_id).ok_or(ConsentError::InvalidTabId)?;
        Ok(tab.monitor().reconcile())
    }

    // Read every tab's channel port and dispatch relayed cookie changes
    pub fn pump_channel_messages(&self) -> usize {
        self.tabs.values().map(|tab| tab.monitor().pump_channel_messages()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::{ControllerState, Decision, GtagCommand, SignalBatch, SignalKey};
    use crate::monitor::ChangeSource;
    use http::HeaderValue;
    use std::sync::Mutex;

    fn o(s: &str) -> url::Origin {
        url::Url::parse(s).expect("valid URL").origin()
    }

    fn zone() -> Zone {
        Zone::new(o("https://shop.example"), ConsentConfig::default()).unwrap()
    }

    fn ads_granted() -> SignalBatch {
        [SignalKey::AdStorage, SignalKey::AdUserData, SignalKey::AdPersonalization]
            .into_iter()
            .map(|key| (key, Decision::Granted))
            .collect()
    }

    #[test]
    fn tab_limit_is_enforced() {
        let config = ConsentConfig { max_tabs: 2, ..Default::default() };
        let mut zone = Zone::new(o("https://shop.example"), config).unwrap();

        zone.open_tab().unwrap();
        zone.open_tab().unwrap();
        assert!(matches!(zone.open_tab(), Err(ConsentError::TabLimitExceeded)));
        assert_eq!(zone.tab_ids().len(), 2);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ConsentConfig { channel_name: String::new(), ..Default::default() };
        assert!(matches!(
            Zone::new(o("https://shop.example"), config),
            Err(ConsentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_tab_is_an_error() {
        let mut zone = zone();
        let tab = zone.open_tab().unwrap();
        zone.close_tab(tab).unwrap();

        assert!(matches!(zone.close_tab(tab), Err(ConsentError::InvalidTabId)));
        assert!(matches!(zone.set_cookie(tab, "a=1"), Err(ConsentError::InvalidTabId)));
        assert!(matches!(zone.reconcile(tab), Err(ConsentError::InvalidTabId)));
        assert!(zone.tab(tab).is_none());
    }

    #[test]
    fn tabs_share_the_jar() {
        let mut zone = zone();
        let t1 = zone.open_tab().unwrap();
        let t2 = zone.open_tab().unwrap();

        zone.set_cookie(t1, "theme=dark").unwrap();
        assert_eq!(zone.tab(t2).unwrap().cookie(), "theme=dark");
        assert_eq!(zone.tab(t1).unwrap().controller_state(), Some(ControllerState::Live));
    }

    #[test]
    fn change_in_one_tab_reaches_the_other() {
        let mut zone = zone();
        let t1 = zone.open_tab().unwrap();
        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:yes,advertisement:no").unwrap();
        let t2 = zone.open_tab().unwrap();
        zone.pump_channel_messages();

        let (tab1, tab2) = (zone.tab(t1).unwrap(), zone.tab(t2).unwrap());
        tab1.data_layer().drain();
        tab2.data_layer().drain();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        tab2.monitor().add_listener(Arc::new(move |ev: &crate::monitor::CookieChangeEvent| {
            recorder.lock().unwrap().push(ev.detail.clone())
        }));

        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:yes,advertisement:yes").unwrap();

        // t2 has not pumped yet: nothing emitted there.
        assert!(tab2.data_layer().is_empty());
        assert_eq!(zone.pump_channel_messages(), 1);

        let expected = vec![GtagCommand::update(ads_granted()), GtagCommand::set("ads_data_redaction", false)];
        assert_eq!(tab1.data_layer().commands(), expected);
        assert_eq!(tab2.data_layer().commands(), expected);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].old_value, "cookieyes-consent=action:yes,analytics:yes,advertisement:no");
        assert_eq!(seen[0].new_value, "cookieyes-consent=action:yes,analytics:yes,advertisement:yes");
    }

    #[test]
    fn tab_opened_after_decision_declares_it_on_load() {
        let mut zone = zone();
        let t1 = zone.open_tab().unwrap();
        zone.set_cookie(t1, "cookieyes-consent=action:yes,advertisement:yes").unwrap();

        let t2 = zone.open_tab().unwrap();
        let entries = zone.tab(t2).unwrap().data_layer().entries();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[3][2]["ad_storage"], "granted");
        assert_eq!(entries[4], serde_json::json!(["set", "ads_data_redaction", false]));
    }

    #[test]
    fn without_cross_context_sync_other_tabs_stay_quiet() {
        let config = ConsentConfig { cross_context_sync: false, ..Default::default() };
        let mut zone = Zone::new(o("https://shop.example"), config).unwrap();
        let t1 = zone.open_tab().unwrap();
        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:no").unwrap();
        let t2 = zone.open_tab().unwrap();
        zone.tab(t1).unwrap().data_layer().drain();
        zone.tab(t2).unwrap().data_layer().drain();

        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:yes").unwrap();
        assert_eq!(zone.pump_channel_messages(), 0);

        assert_eq!(zone.tab(t1).unwrap().data_layer().len(), 1);
        assert!(zone.tab(t2).unwrap().data_layer().is_empty());
    }

    #[test]
    fn zones_of_different_origins_do_not_hear_each_other() {
        let hub = Arc::new(BroadcastHub::default());
        let mut a = Zone::with_hub(o("https://a.example"), ConsentConfig::default(), hub.clone()).unwrap();
        let mut b = Zone::with_hub(o("https://b.example"), ConsentConfig::default(), hub).unwrap();
        let ta = a.open_tab().unwrap();
        b.open_tab().unwrap();

        a.set_cookie(ta, "x=1").unwrap();
        assert_eq!(b.pump_channel_messages(), 0);
    }

    #[test]
    fn network_writes_are_reconciled_lazily() {
        let mut zone = zone();
        let t1 = zone.open_tab().unwrap();
        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:no").unwrap();
        let t2 = zone.open_tab().unwrap();
        zone.pump_channel_messages();
        zone.tab(t1).unwrap().data_layer().drain();
        zone.tab(t2).unwrap().data_layer().drain();

        let mut headers = HeaderMap::new();
        headers.append(
            http::header::SET_COOKIE,
            HeaderValue::from_static("cookieyes-consent=action:yes,analytics:yes; Path=/"),
        );
        zone.store_response_cookies(&headers);
        assert!(zone.tab(t1).unwrap().data_layer().is_empty());

        assert!(zone.reconcile(t1).unwrap());
        zone.pump_channel_messages();

        let analytics: SignalBatch = [(SignalKey::AnalyticsStorage, Decision::Granted)].into_iter().collect();
        assert_eq!(zone.tab(t1).unwrap().data_layer().commands(), vec![GtagCommand::update(analytics.clone())]);
        assert_eq!(zone.tab(t2).unwrap().data_layer().commands(), vec![GtagCommand::update(analytics)]);
        assert!(!zone.reconcile(t2).unwrap());
    }

    #[test]
    fn relay_superseded_by_network_write_emits_nothing() {
        let mut zone = zone();
        let t1 = zone.open_tab().unwrap();
        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:no").unwrap();
        let t2 = zone.open_tab().unwrap();
        zone.tab(t1).unwrap().data_layer().drain();
        zone.tab(t2).unwrap().data_layer().drain();

        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:yes").unwrap();
        let mut headers = HeaderMap::new();
        headers.append(
            http::header::SET_COOKIE,
            HeaderValue::from_static("cookieyes-consent=action:yes,analytics:no; Path=/"),
        );
        zone.store_response_cookies(&headers);
        assert!(!zone.reconcile(t2).unwrap());

        zone.pump_channel_messages();

        let tab2 = zone.tab(t2).unwrap();
        assert!(tab2.data_layer().is_empty());
        assert_eq!(tab2.monitor().last_observed(), "cookieyes-consent=action:yes,analytics:no");
        assert_eq!(tab2.monitor().last_observed(), tab2.cookie());
    }

    #[test]
    fn cleared_jar_withdraws_nothing() {
        let mut zone = zone();
        let t1 = zone.open_tab().unwrap();
        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:yes").unwrap();
        zone.tab(t1).unwrap().data_layer().drain();

        zone.clear_cookies();
        assert_eq!(zone.tab(t1).unwrap().cookie(), "");

        // The consent cookie is gone, so there is no decision to diff against.
        assert!(zone.reconcile(t1).unwrap());
        assert!(zone.tab(t1).unwrap().data_layer().is_empty());
        assert_eq!(zone.tab(t1).unwrap().monitor().last_observed(), "");
    }

    #[test]
    fn consent_mode_can_be_disabled() {
        let config = ConsentConfig { consent_mode: false, ..Default::default() };
        let mut zone = Zone::new(o("https://shop.example"), config).unwrap();
        let t1 = zone.open_tab().unwrap();
        zone.set_cookie(t1, "cookieyes-consent=action:yes,analytics:no").unwrap();

        let tab = zone.tab(t1).unwrap();
        assert_eq!(tab.controller_state(), None);
        assert!(tab.data_layer().is_empty());
    }
}
