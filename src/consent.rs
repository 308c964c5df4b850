// src/consent.rs
//! Consent: diffing, signal mapping and the controller that drives the consent API.

pub mod diff;
pub mod signals;
pub mod sink;
mod controller;

pub use controller::ConsentController;
pub use controller::ControllerState;

pub use diff::{diff, Changeset, ConsentChange};
pub use signals::{map_to_signals, ConsentCategory, Decision, SignalBatch, SignalKey, SIGNAL_MAPPING};
pub use sink::{ConsentMode, ConsentSink, DataLayer, GtagCommand};
