//! Cookie mutation monitor.
//!
//! The cookie jar has no change notification of its own and is writable by any code in
//! any tab. The monitor gives the rest of the crate an edge-triggered
//! [`CookieChangeEvent`] anyway:
//!
//! - [`CookieMonitor`] is the single interception point for script writes in one tab.
//!   It keeps the last observed cookie string and notifies listeners when a write
//!   changes it.
//! - Every change is also posted on a named [`BroadcastHub`] channel, so other tabs of
//!   the same origin receive it and re-dispatch it as the same local notification.
//!
//! Writes that bypass the interception point (network responses) are only picked up
//! by [`CookieMonitor::reconcile`].

pub mod channel;
pub mod event;
#[allow(clippy::module_inception)]
mod monitor;

pub use channel::{BroadcastHub, ChannelMessage, ChannelPort};
pub use event::{ChangeOrigin, CookieChange, CookieChangeEvent, COOKIE_CHANGE_EVENT};
pub use monitor::{ChangeListener, ChangeSource, CookieMonitor, ListenerId};
