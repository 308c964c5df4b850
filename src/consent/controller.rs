use super::diff::diff;
use super::signals::{map_category, map_to_signals, ConsentCategory, SignalBatch};
use super::sink::{ConsentMode, ConsentSink, GtagCommand, ADS_DATA_REDACTION, URL_PASSTHROUGH};
use crate::config::{BulkChangePolicy, ConsentConfig};
use crate::cookies::{parse_consent_details, parse_cookies, ConsentMap};
use crate::monitor::{ChangeSource, CookieChange, CookieChangeEvent, ListenerId};
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Created, nothing sent yet
    Uninitialized,
    /// Defaults declared and listening for cookie changes
    Live,
}

/// Keeps the consent API in sync with the widget's consent cookie.
///
/// [`ConsentController::start`] declares the defaults, reads the current decision and
/// subscribes to the change source. From then on every cookie change is diffed against
/// the previous cookie, and each changed category is sent as its own `update` call.
///
/// Nothing in here returns an error: unreadable cookies and failing sinks are logged
/// and the event is dropped.
pub struct ConsentController {
    inner: Arc<ControllerInner>,
    subscription: Option<(Arc<dyn ChangeSource>, ListenerId)>,
}

struct ControllerInner {
    config: ConsentConfig,
    sink: Arc<dyn ConsentSink>,
    state: Mutex<ControllerState>,
}

impl Debug for ConsentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentController")
            .field("state", &self.state())
            .field("consent_cookie", &self.inner.config.consent_cookie)
            .finish_non_exhaustive()
    }
}

impl ConsentController {
    pub fn new(config: ConsentConfig, sink: Arc<dyn ConsentSink>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                config,
                sink,
                state: Mutex::new(ControllerState::Uninitialized),
            }),
            subscription: None,
        }
    }

    /// Moves the controller to [`ControllerState::Live`]. Returns `false` if it already was.
    pub fn start(&mut self, source: Arc<dyn ChangeSource>) -> bool {
        if self.state() == ControllerState::Live {
            return false;
        }

        self.inner.declare_defaults();
        self.inner.initial_page_load(&source.current_cookie());

        self.inner.set_state(ControllerState::Live);
        let inner = self.inner.clone();
        let id = source.add_listener(Arc::new(move |event: &CookieChangeEvent| {
            inner.on_cookie_change(&event.detail);
        }));
        self.subscription = Some((source, id));
        true
    }

    /// Detaches from the change source. No further signals are sent.
    pub fn stop(&mut self) {
        if let Some((source, id)) = self.subscription.take() {
            source.remove_listener(id);
        }
        self.inner.set_state(ControllerState::Uninitialized);
    }

    pub fn state(&self) -> ControllerState {
        *self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Processes one cookie change directly. Returns the number of `update` calls sent;
    /// always 0 unless the controller is [`ControllerState::Live`].
    pub fn handle_change(&self, change: &CookieChange) -> usize {
        self.inner.on_cookie_change(change)
    }
}

impl Drop for ConsentController {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ControllerInner {
    fn set_state(&self, state: ControllerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn is_live(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) == ControllerState::Live
    }

    fn declare_defaults(&self) {
        self.emit(GtagCommand::Consent {
            mode: ConsentMode::Default,
            signals: SignalBatch::default_declaration(),
        });
        if self.config.ads_data_redaction {
            self.emit(GtagCommand::set(ADS_DATA_REDACTION, true));
        }
        if self.config.url_passthrough {
            self.emit(GtagCommand::set(URL_PASSTHROUGH, true));
        }
    }

    fn initial_page_load(&self, cookie: &str) -> usize {
        match self.consent_details(cookie) {
            Some(details) => self.declare(&details),
            None => {
                log::debug!("no {} cookie yet, waiting for a decision", self.config.consent_cookie);
                0
            }
        }
    }

    /// Sends the full decision set as one update.
    fn declare(&self, details: &ConsentMap) -> usize {
        if !details.has_decision() {
            log::debug!("consent cookie carries no decision, nothing to declare");
            return 0;
        }

        let signals = map_to_signals(details);
        if signals.is_empty() {
            return 0;
        }

        log::info!("declaring consent: {}", serde_json::to_string(&signals).unwrap_or_default());
        let sent = self.emit(GtagCommand::update(signals)) as usize;

        if details.get(ConsentCategory::Advertisement.as_str()) == Some("yes") {
            self.emit(GtagCommand::set(ADS_DATA_REDACTION, false));
        }
        sent
    }

    fn on_cookie_change(&self, change: &CookieChange) -> usize {
        if !self.is_live() {
            log::debug!("controller not live, cookie change ignored");
            return 0;
        }

        let (Some(old), Some(new)) = (
            self.consent_details(&change.old_value),
            self.consent_details(&change.new_value),
        ) else {
            log::debug!("cookie change without consent cookie on both sides, ignored");
            return 0;
        };

        let changes = diff(&old, &new);
        if changes.is_empty() {
            return 0;
        }

        if changes.is_bulk() {
            return match self.config.bulk_change_policy {
                BulkChangePolicy::Discard => {
                    log::debug!("consent cookie rewritten ({} changes), event discarded", changes.len());
                    0
                }
                BulkChangePolicy::Redeclare => self.declare(&new),
            };
        }

        let mut sent = 0;
        for change in &changes {
            let mut signals = SignalBatch::new();
            map_category(&mut signals, &change.category, change.new_value.as_deref());
            if signals.is_empty() {
                log::debug!("no consent signal for {:?}", change.category);
                continue;
            }

            if self.emit(GtagCommand::update(signals)) {
                sent += 1;
            }

            if change.category == ConsentCategory::Advertisement.as_str() && change.new_value.as_deref() == Some("yes") {
                self.emit(GtagCommand::set(ADS_DATA_REDACTION, false));
            }
        }
        sent
    }

    /// The parsed consent cookie, `None` when absent or empty.
    fn consent_details(&self, cookie: &str) -> Option<ConsentMap> {
        let cookies = parse_cookies(cookie);
        let consent = cookies.get(&self.config.consent_cookie).filter(|value| !value.is_empty())?;
        Some(parse_consent_details(consent))
    }

    fn emit(&self, command: GtagCommand) -> bool {
        match self.sink.gtag(command) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("consent sink rejected command: {:#}", e);
                false
            }
        }
    }
}
