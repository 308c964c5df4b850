//! Runtime configuration for the consent bridge.
//!
//! Every field has a default matching the CookieYes widget and Google consent mode,
//! so an empty JSON object (`{}`) is a valid configuration.

use crate::errors::ConsentError;
use crate::DEFAULT_CHANNEL_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the cookie the CookieYes widget stores its decision in.
pub const DEFAULT_CONSENT_COOKIE: &str = "cookieyes-consent";
/// Name of the broadcast channel used to relay cookie changes between tabs.
pub const DEFAULT_CHANNEL_NAME: &str = "cookie-channel";

/// Log verbosity, mapped onto [`log::LevelFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// What the controller does with a changeset that touches a meta-field
/// (`action` or `consent`), i.e. a rewrite of the whole consent cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkChangePolicy {
    /// Drop the event, no signal is emitted.
    #[default]
    Discard,
    /// Emit the full decision set again, as on initial page load.
    Redeclare,
}

/// Consent bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentConfig {
    /// Cookie holding the widget's consent decision
    pub consent_cookie: String,
    /// Name of the cross-tab broadcast channel
    pub channel_name: String,
    /// Relay cookie changes to other tabs of the same origin
    pub cross_context_sync: bool,
    /// Attach a consent controller to every opened tab
    pub consent_mode: bool,
    /// Send `set("ads_data_redaction", true)` with the default declaration
    pub ads_data_redaction: bool,
    /// Send `set("url_passthrough", true)` with the default declaration
    pub url_passthrough: bool,
    /// Handling of changesets touching `action`/`consent`
    pub bulk_change_policy: BulkChangePolicy,
    /// Capacity of the broadcast channel, per receiver
    pub channel_capacity: usize,
    /// How many tabs might be opened in a zone
    pub max_tabs: usize,
    /// Verbosity used by [`crate::logging::init_logging`]
    pub log_level: LogLevel,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            consent_cookie: DEFAULT_CONSENT_COOKIE.to_string(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            cross_context_sync: true,
            consent_mode: true,
            ads_data_redaction: true,
            url_passthrough: true,
            bulk_change_policy: BulkChangePolicy::Discard,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_tabs: 16,
            log_level: LogLevel::Warn,
        }
    }
}

impl ConsentConfig {
    /// Parses and validates a JSON configuration. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConsentError> {
        let config: ConsentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConsentError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConsentError> {
        if self.consent_cookie.trim().is_empty() {
            return Err(ConsentError::InvalidConfig("consent_cookie is empty".into()));
        }
        if self.consent_cookie.contains(['=', ';']) {
            return Err(ConsentError::InvalidConfig(format!(
                "consent_cookie {:?} contains '=' or ';'",
                self.consent_cookie
            )));
        }
        if self.channel_name.trim().is_empty() {
            return Err(ConsentError::InvalidConfig("channel_name is empty".into()));
        }
        if self.channel_capacity == 0 {
            return Err(ConsentError::InvalidConfig("channel_capacity must be at least 1".into()));
        }
        if self.max_tabs == 0 {
            return Err(ConsentError::InvalidConfig("max_tabs must be at least 1".into()));
        }
        Ok(())
    }
}
