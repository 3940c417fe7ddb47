//! Book-keeping of live action channels.
//!
//! There is no shared identity map of entities. When a write succeeds,
//! whoever performed it walks the registered channels and pushes a keyed
//! transform into each one; every cache stays the single owner of its state.

use crate::action::ActionChannel;
use tokio::sync::Mutex;

/// Live action channels of one resource type, each tagged with a key.
///
/// Channels whose instance has been torn down are pruned lazily, on the next
/// walk, so nothing needs to deregister explicitly.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use lisu_remote::{ChannelRegistry, ConnectivitySignal, DataHandle, Snapshot, remote_data};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let registry: ChannelRegistry<DataHandle<u32>, &str> = ChannelRegistry::new();
/// let stream = remote_data(ConnectivitySignal::never(), || async { Ok(1_u32) });
/// let mut stream = std::pin::pin!(stream);
/// let snapshot = stream.next().await.unwrap();
/// registry.register("one", snapshot.handle().clone()).await;
///
/// registry.for_each(|key, handle| if *key == "one" { handle.mutate(|n| *n += 1) }).await;
/// # }
/// ```
pub struct ChannelRegistry<H, K = ()> {
    channels: Mutex<Vec<(K, H)>>,
}

impl<H: ActionChannel, K> ChannelRegistry<H, K> {
    pub fn new() -> Self {
        Self { channels: Mutex::new(Vec::new()) }
    }

    /// Track a live channel.
    pub async fn register(&self, key: K, handle: H) {
        let mut channels = self.channels.lock().await;
        channels.retain(|(_, h)| !h.is_closed());
        channels.push((key, handle));
    }

    /// Visit every live channel, in registration order.
    pub async fn for_each(&self, mut visit: impl FnMut(&K, &H)) {
        let mut channels = self.channels.lock().await;
        channels.retain(|(_, h)| !h.is_closed());
        for (key, handle) in channels.iter() {
            visit(key, handle);
        }
    }

    /// Number of live channels.
    pub async fn len(&self) -> usize {
        let mut channels = self.channels.lock().await;
        channels.retain(|(_, h)| !h.is_closed());
        channels.len()
    }
}
impl<H: ActionChannel, K> Default for ChannelRegistry<H, K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct FakeChannel(Rc<Cell<bool>>);
    impl ActionChannel for FakeChannel {
        fn is_closed(&self) -> bool {
            self.0.get()
        }
    }

    #[tokio::test]
    async fn test_closed_channels_are_pruned() {
        let registry = ChannelRegistry::new();
        let alive = FakeChannel(Rc::new(Cell::new(false)));
        let dead = FakeChannel(Rc::new(Cell::new(false)));
        registry.register(1, alive.clone()).await;
        registry.register(2, dead.clone()).await;
        assert_eq!(registry.len().await, 2);

        dead.0.set(true);
        let mut visited = Vec::new();
        registry.for_each(|key, _| visited.push(*key)).await;
        assert_eq!(visited, vec![1]);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_visits_in_registration_order() {
        let registry = ChannelRegistry::new();
        for key in ["a", "b", "c"] {
            registry.register(key, FakeChannel(Rc::new(Cell::new(false)))).await;
        }
        let mut visited = String::new();
        registry.for_each(|key, _| visited.push_str(key)).await;
        assert_eq!(visited, "abc");
    }
}
