//! Named same-origin broadcast channels.
//!
//! A [`BroadcastHub`] hands out [`ChannelPort`]s. All ports joined with the same
//! `(origin, name)` pair share one tokio broadcast channel; a port never receives the
//! messages it posted itself. Messages travel as JSON strings so the payload crosses
//! the channel exactly as it would between browser tabs.

use crate::errors::ConsentError;
use crate::zone::TabId;
use crate::DEFAULT_CHANNEL_CAPACITY;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

/// A message as it travels over the channel.
#[derive(Clone, Debug)]
pub struct ChannelMessage {
    pub sender: TabId,
    pub data: String,
}

/// Registry of broadcast channels keyed by origin and channel name.
pub struct BroadcastHub {
    capacity: usize,
    channels: Mutex<HashMap<(String, String), broadcast::Sender<ChannelMessage>>>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub").field("capacity", &self.capacity).finish_non_exhaustive()
    }
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Joins the channel `name` of `origin` on behalf of `context`.
    pub fn join(&self, origin: &url::Origin, name: &str, context: TabId) -> ChannelPort {
        let key = (origin.ascii_serialization(), name.to_string());
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();
        let rx = tx.subscribe();

        ChannelPort {
            name: name.to_string(),
            context,
            tx,
            rx: Mutex::new(rx),
        }
    }
}

/// One context's membership of a broadcast channel.
pub struct ChannelPort {
    name: String,
    context: TabId,
    tx: broadcast::Sender<ChannelMessage>,
    rx: Mutex<broadcast::Receiver<ChannelMessage>>,
}

impl Debug for ChannelPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelPort")
            .field("name", &self.name)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

impl ChannelPort {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serializes `payload` to JSON and posts it to every other member.
    pub fn post_message<T: Serialize>(&self, payload: &T) -> Result<(), ConsentError> {
        let data = serde_json::to_string(payload)?;
        // Our own receiver keeps the channel open, so send() only fails once the
        // port itself is gone.
        self.tx
            .send(ChannelMessage { sender: self.context, data })
            .map(|_| ())
            .map_err(|_| ConsentError::ChannelClosed)
    }

    /// Returns the next message from another member without blocking.
    ///
    /// `Ok(None)` means the queue is empty. A payload that does not deserialize is
    /// consumed and reported as [`ConsentError::Serialization`]; the next call moves on.
    pub fn try_recv<T: DeserializeOwned>(&self) -> Result<Option<(TabId, T)>, ConsentError> {
        let mut rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match rx.try_recv() {
                Ok(msg) if msg.sender == self.context => continue,
                Ok(msg) => return Ok(Some((msg.sender, serde_json::from_str(&msg.data)?))),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Lagged(skipped)) => return Err(ConsentError::ChannelLagged(skipped)),
                Err(TryRecvError::Closed) => return Err(ConsentError::ChannelClosed),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::CookieChange;

    fn o(s: &str) -> url::Origin {
        url::Url::parse(s).expect("valid URL").origin()
    }

    fn change(old: &str, new: &str) -> CookieChange {
        CookieChange { old_value: old.into(), new_value: new.into() }
    }

    #[test]
    fn other_members_receive_sender_does_not() {
        let hub = BroadcastHub::default();
        let origin = o("https://shop.example");
        let (t1, t2) = (TabId::new(), TabId::new());
        let p1 = hub.join(&origin, "cookie-channel", t1);
        let p2 = hub.join(&origin, "cookie-channel", t2);

        p1.post_message(&change("", "a=1")).unwrap();

        let (sender, payload) = p2.try_recv::<CookieChange>().unwrap().unwrap();
        assert_eq!(sender, t1);
        assert_eq!(payload, change("", "a=1"));
        assert!(p2.try_recv::<CookieChange>().unwrap().is_none());
        assert!(p1.try_recv::<CookieChange>().unwrap().is_none());
    }

    #[test]
    fn channels_are_isolated_by_origin_and_name() {
        let hub = BroadcastHub::default();
        let a = hub.join(&o("https://a.example"), "cookie-channel", TabId::new());
        let b = hub.join(&o("https://b.example"), "cookie-channel", TabId::new());
        let other_name = hub.join(&o("https://a.example"), "other", TabId::new());

        a.post_message(&change("", "x=1")).unwrap();

        assert!(b.try_recv::<CookieChange>().unwrap().is_none());
        assert!(other_name.try_recv::<CookieChange>().unwrap().is_none());
    }

    #[test]
    fn malformed_payload_is_reported_then_skipped() {
        let hub = BroadcastHub::default();
        let origin = o("https://a.example");
        let p1 = hub.join(&origin, "c", TabId::new());
        let p2 = hub.join(&origin, "c", TabId::new());

        p1.post_message(&"not a change").unwrap();
        p1.post_message(&change("a=1", "a=2")).unwrap();

        assert!(matches!(p2.try_recv::<CookieChange>(), Err(ConsentError::Serialization(_))));
        let (_, payload) = p2.try_recv::<CookieChange>().unwrap().unwrap();
        assert_eq!(payload.new_value, "a=2");
    }

    #[test]
    fn slow_receiver_reports_lag_then_continues() {
        let hub = BroadcastHub::new(2);
        let origin = o("https://a.example");
        let p1 = hub.join(&origin, "c", TabId::new());
        let p2 = hub.join(&origin, "c", TabId::new());

        for i in 0..4 {
            p1.post_message(&change("", &format!("a={i}"))).unwrap();
        }

        assert!(matches!(p2.try_recv::<CookieChange>(), Err(ConsentError::ChannelLagged(2))));
        let (_, payload) = p2.try_recv::<CookieChange>().unwrap().unwrap();
        assert_eq!(payload.new_value, "a=2");
    }
}
