//! The external consent API.
//!
//! Consent-mode signals leave the crate as [`GtagCommand`]s handed to a [`ConsentSink`].
//! [`DataLayer`] is the in-process sink: it records commands in call order, the way
//! `gtag()` pushes its arguments onto `window.dataLayer`.

use super::signals::SignalBatch;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::{Mutex, PoisonError};

/// `set` key toggling redaction of ad click identifiers while ads are denied.
pub const ADS_DATA_REDACTION: &str = "ads_data_redaction";
/// `set` key passing ad click information through URLs while storage is denied.
pub const URL_PASSTHROUGH: &str = "url_passthrough";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentMode {
    /// Initial declaration, issued once before any cookie is read
    Default,
    /// Partial update after a decision is read or changed
    Update,
}

impl ConsentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentMode::Default => "default",
            ConsentMode::Update => "update",
        }
    }
}

/// A single call into the consent API.
#[derive(Debug, Clone, PartialEq)]
pub enum GtagCommand {
    /// `gtag("consent", mode, signals)`
    Consent { mode: ConsentMode, signals: SignalBatch },
    /// `gtag("set", key, value)`
    Set { key: String, value: Value },
}

impl GtagCommand {
    pub fn update(signals: SignalBatch) -> Self {
        GtagCommand::Consent { mode: ConsentMode::Update, signals }
    }

    pub fn set(key: &str, value: impl Into<Value>) -> Self {
        GtagCommand::Set { key: key.to_string(), value: value.into() }
    }

    /// Renders the JSON argument array, e.g. `["consent", "update", {"ad_storage": "granted"}]`.
    pub fn to_args(&self) -> Value {
        match self {
            GtagCommand::Consent { mode, signals } => json!(["consent", mode.as_str(), signals]),
            GtagCommand::Set { key, value } => json!(["set", key, value]),
        }
    }
}

/// Receiver of consent-mode commands.
pub trait ConsentSink: Send + Sync {
    fn gtag(&self, command: GtagCommand) -> Result<()>;
}

/// In-memory data layer recording every command.
#[derive(Debug, Default)]
pub struct DataLayer {
    commands: Mutex<Vec<GtagCommand>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands, oldest first.
    pub fn commands(&self) -> Vec<GtagCommand> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recorded commands rendered as `dataLayer` argument arrays.
    pub fn entries(&self) -> Vec<Value> {
        self.commands().iter().map(GtagCommand::to_args).collect()
    }

    /// Removes and returns the recorded commands.
    pub fn drain(&self) -> Vec<GtagCommand> {
        std::mem::take(&mut *self.commands.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConsentSink for DataLayer {
    fn gtag(&self, command: GtagCommand) -> Result<()> {
        log::trace!("dataLayer.push({})", command.to_args());
        self.commands.lock().unwrap_or_else(PoisonError::into_inner).push(command);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::signals::{Decision, SignalKey};

    #[test]
    fn renders_argument_arrays() {
        let signals: SignalBatch = [(SignalKey::AnalyticsStorage, Decision::Granted)].into_iter().collect();

        assert_eq!(
            GtagCommand::update(signals).to_args(),
            json!(["consent", "update", { "analytics_storage": "granted" }])
        );
        assert_eq!(GtagCommand::set(ADS_DATA_REDACTION, false).to_args(), json!(["set", "ads_data_redaction", false]));
    }

    #[test]
    fn data_layer_records_in_order() {
        let layer = DataLayer::new();
        assert!(layer.is_empty());

        layer.gtag(GtagCommand::Consent { mode: ConsentMode::Default, signals: SignalBatch::default_declaration() }).unwrap();
        layer.gtag(GtagCommand::set(URL_PASSTHROUGH, true)).unwrap();

        let entries = layer.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0][1], "default");
        assert_eq!(entries[0][2]["security_storage"], "granted");
        assert_eq!(entries[1], json!(["set", "url_passthrough", true]));

        assert_eq!(layer.drain().len(), 2);
        assert!(layer.is_empty());
    }
}
