use super::channel::ChannelPort;
use super::event::{ChangeOrigin, CookieChange, CookieChangeEvent};
use crate::cookies::CookieJarHandle;
use crate::errors::ConsentError;
use crate::zone::TabId;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Callback invoked with every unified cookie-change notification.
pub type ChangeListener = Arc<dyn Fn(&CookieChangeEvent) + Send + Sync>;

/// Identifies a registered listener so it can be removed again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Anything that can tell the consent controller what the cookie jar holds and when
/// it changes.
pub trait ChangeSource: Send + Sync {
    /// Returns the current script-visible cookie string.
    fn current_cookie(&self) -> String;

    /// Registers `listener` for every subsequent change notification.
    fn add_listener(&self, listener: ChangeListener) -> ListenerId;

    /// Removes a listener. Returns `false` when it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Cookie mutation monitor for one tab.
///
/// All script writes go through [`CookieMonitor::set_cookie`]. After each write the
/// jar is compared with the last observed cookie string; on a difference listeners are
/// notified, the change is posted to the other tabs and the baseline moves forward.
/// Changes relayed by other tabs arrive through [`CookieMonitor::pump_channel_messages`];
/// each one makes the monitor re-read the jar and deliver the difference against its own
/// baseline to the same listeners.
pub struct CookieMonitor {
    context: TabId,
    jar: CookieJarHandle,
    last_cookie: Mutex<String>,
    listeners: RwLock<Vec<(ListenerId, ChangeListener)>>,
    next_listener: AtomicU64,
    port: Option<ChannelPort>,
}

impl Debug for CookieMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieMonitor")
            .field("context", &self.context)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

/// Moves the baseline from `expected` to `value` when dropped, so it happens even if a
/// listener panics. A listener that wrote cookies itself has already moved the baseline
/// further; that newer value is kept.
struct BaselineUpdate<'a> {
    slot: &'a Mutex<String>,
    expected: String,
    value: String,
}

impl Drop for BaselineUpdate<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if *slot == self.expected {
            *slot = std::mem::take(&mut self.value);
        }
    }
}

impl CookieMonitor {
    /// Creates a monitor whose baseline is the jar's current content. Without a `port`
    /// changes are only delivered inside this tab.
    pub fn new(context: TabId, jar: CookieJarHandle, port: Option<ChannelPort>) -> Self {
        let last_cookie = jar.read().unwrap_or_else(PoisonError::into_inner).cookie_string();

        Self {
            context,
            jar,
            last_cookie: Mutex::new(last_cookie),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            port,
        }
    }

    pub fn context(&self) -> TabId {
        self.context
    }

    /// Returns the script-visible cookie string, like reading `document.cookie`.
    pub fn cookie(&self) -> String {
        self.jar.read().unwrap_or_else(PoisonError::into_inner).cookie_string()
    }

    /// The cookie string as of the last observed change.
    pub fn last_observed(&self) -> String {
        self.last_cookie.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Writes a cookie, like assigning `document.cookie`, and notifies on change.
    pub fn set_cookie(&self, assignment: &str) {
        self.jar.write().unwrap_or_else(PoisonError::into_inner).set_cookie(assignment);
        self.observe();
    }

    /// Picks up writes that bypassed [`CookieMonitor::set_cookie`] (network responses,
    /// other jar handles). Returns `true` when a change was found and announced.
    pub fn reconcile(&self) -> bool {
        self.observe()
    }

    /// Drains messages relayed by other tabs and delivers them to listeners. Returns the
    /// number of notifications dispatched.
    pub fn pump_channel_messages(&self) -> usize {
        let Some(port) = &self.port else {
            return 0;
        };

        let mut dispatched = 0;
        loop {
            match port.try_recv::<CookieChange>() {
                Ok(Some((sender, change))) => {
                    if self.receive(sender, change) {
                        dispatched += 1;
                    }
                }
                Ok(None) => break,
                Err(ConsentError::Serialization(e)) => {
                    log::warn!("Tab[{}]: dropping malformed cookie-change message: {}", self.context, e);
                }
                Err(ConsentError::ChannelLagged(skipped)) => {
                    log::warn!("Tab[{}]: cookie channel lagged, {} messages lost", self.context, skipped);
                }
                Err(e) => {
                    log::warn!("Tab[{}]: cookie channel unavailable: {}", self.context, e);
                    break;
                }
            }
        }
        dispatched
    }

    fn observe(&self) -> bool {
        let cookie = self.cookie();
        let old = self.last_observed();
        if cookie == old {
            return false;
        }

        let _commit = BaselineUpdate {
            slot: &self.last_cookie,
            expected: old.clone(),
            value: cookie.clone(),
        };

        let change = CookieChange { old_value: old, new_value: cookie };
        self.dispatch(&CookieChangeEvent {
            detail: change.clone(),
            origin: ChangeOrigin::Local,
        });

        if let Some(port) = &self.port {
            if let Err(e) = port.post_message(&change) {
                log::warn!("Tab[{}]: cannot relay cookie change to other tabs: {}", self.context, e);
            }
        }
        true
    }

    // The message only signals that another tab wrote. The jar is shared and may already
    // be ahead of the payload, so the dispatched change is this tab's baseline against the
    // jar as it is now.
    fn receive(&self, sender: TabId, change: CookieChange) -> bool {
        let cookie = self.cookie();
        let old = self.last_observed();
        if cookie == old {
            log::debug!("Tab[{}]: change from tab {} already observed", self.context, sender);
            return false;
        }
        if change.new_value != cookie {
            log::debug!("Tab[{}]: change from tab {} superseded by later writes", self.context, sender);
        }

        let _commit = BaselineUpdate {
            slot: &self.last_cookie,
            expected: old.clone(),
            value: cookie.clone(),
        };

        self.dispatch(&CookieChangeEvent {
            detail: CookieChange { old_value: old, new_value: cookie },
            origin: ChangeOrigin::CrossContext { sender },
        });
        true
    }

    fn dispatch(&self, event: &CookieChangeEvent) {
        // Listeners run without the registry lock held, so they may (un)register.
        let listeners: Vec<ChangeListener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        log::debug!("Tab[{}]: {} ({:?}) to {} listener(s)", self.context, event.name(), event.origin, listeners.len());
        for listener in listeners {
            listener(event);
        }
    }
}

impl ChangeSource for CookieMonitor {
    fn current_cookie(&self) -> String {
        self.cookie()
    }

    fn add_listener(&self, listener: ChangeListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }
}
