// src/zone.rs
//! Zone system: [`Zone`], [`ZoneId`], and the [`Tab`]s opened in a zone.
//!
//! A zone stands for one origin. Its tabs share the cookie jar and the cross-tab
//! channel, which is exactly the setting in which a consent decision made in one tab
//! must show up in all the others.

mod tab;
#[allow(clippy::module_inception)]
mod zone;

pub use tab::Tab;
pub use tab::TabId;
pub use zone::Zone;
pub use zone::ZoneId;
