//! Consent mode bridge.
//!
//! Watches the consent cookie written by a cookie-consent widget, detects when the
//! stored decision changes (also when the change happens in another tab of the same
//! origin) and forwards the difference as consent-mode signals to an external
//! analytics/advertising API.
//!
//! The pipeline, leaf first:
//!
//! - [`cookies`]: the cookie jar abstraction and the consent parser.
//! - [`consent`]: diff engine, signal mapper, signal sink and the controller.
//! - [`monitor`]: the cookie mutation monitor and the cross-tab channel.
//! - [`zone`]: wires everything together for one origin and its tabs.

pub mod config;
pub mod consent;
pub mod cookies;
pub mod errors;
pub mod logging;
pub mod monitor;
pub mod zone;

/// Default capacity of broadcast channels created by the crate.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

pub use config::{BulkChangePolicy, ConsentConfig, LogLevel};
pub use consent::{ConsentController, ConsentSink, DataLayer, GtagCommand, SignalBatch};
pub use cookies::{ConsentMap, CookieJar, CookieJarHandle, DefaultCookieJar};
pub use errors::ConsentError;
pub use monitor::{ChangeSource, CookieChange, CookieChangeEvent, CookieMonitor};
pub use zone::{Tab, TabId, Zone, ZoneId};
