// Bazaar Node: peer-to-peer decentralized marketplace
//
// SPDX-License-Identifier: Apache-2.0

//! Listener registry (§4.6, §9). The original verifies listener capability
//! dynamically (`zope.interface`); here capability is a static enum tag, so
//! "does this listener implement notifications" becomes a `matches!` on the
//! variant rather than a runtime interface check.

use std::sync::Arc;

use crate::external::{BroadcastSink, MessageSink, NotificationSink};

pub enum Listener {
    Notification(Arc<dyn NotificationSink + Send + Sync>),
    Message(Arc<dyn MessageSink + Send + Sync>),
    Broadcast(Arc<dyn BroadcastSink + Send + Sync>),
}

#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Listener>,
}

impl ListenerRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, listener: Listener) { self.listeners.push(listener); }

    pub fn notification_sink(&self) -> Option<Arc<dyn NotificationSink + Send + Sync>> {
        self.listeners.iter().find_map(|l| match l {
            Listener::Notification(sink) => Some(Arc::clone(sink)),
            _ => None,
        })
    }

    pub fn message_sinks(&self) -> impl Iterator<Item = &Arc<dyn MessageSink + Send + Sync>> {
        self.listeners.iter().filter_map(|l| match l {
            Listener::Message(sink) => Some(sink),
            _ => None,
        })
    }

    pub fn broadcast_sinks(&self) -> impl Iterator<Item = &Arc<dyn BroadcastSink + Send + Sync>> {
        self.listeners.iter().filter_map(|l| match l {
            Listener::Broadcast(sink) => Some(sink),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bazaarrpc::Guid;

    use super::*;

    struct CountingBroadcast(Arc<AtomicUsize>);
    impl BroadcastSink for CountingBroadcast {
        fn broadcast(&self, _guid: Guid, _message: &[u8]) { self.0.fetch_add(1, Ordering::SeqCst); }
    }

    #[test]
    fn missing_role_yields_no_sinks() {
        let registry = ListenerRegistry::new();
        assert!(registry.notification_sink().is_none());
        assert_eq!(registry.broadcast_sinks().count(), 0);
    }

    #[test]
    fn broadcast_fans_out_to_every_registered_sink() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ListenerRegistry::new();
        registry.register(Listener::Broadcast(Arc::new(CountingBroadcast(Arc::clone(&counter)))));
        registry.register(Listener::Broadcast(Arc::new(CountingBroadcast(Arc::clone(&counter)))));
        for sink in registry.broadcast_sinks() {
            sink.broadcast(Guid([0u8; 20]), b"hi");
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
