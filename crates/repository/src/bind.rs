//! Stream combinators that tie cache instances to the current backend.

use async_stream::stream;
use futures::{Stream, StreamExt};
use lisu_api::ApiHandle;
use lisu_remote::{ChannelRegistry, Snapshot};
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;

enum Switch<S> {
    Backend(Option<ApiHandle>),
    Snapshot(Option<S>),
}

/// Emit the snapshots of a cache instance built for the current backend.
///
/// Whenever the backend changes, the instance is dropped (cancelling its
/// in-flight load) and `build` is called again for the new backend. While no
/// backend is set, nothing is emitted.
pub(crate) fn switch_latest<S, B, F>(api: watch::Receiver<Option<ApiHandle>>, mut build: F) -> impl Stream<Item = S>
where
    S: Send + 'static,
    B: Stream<Item = S> + Send + 'static,
    F: FnMut(ApiHandle) -> B + Send + 'static,
{
    let mut api = Some(api);
    stream!({
        let initial = api.as_mut().and_then(|rx| rx.borrow_and_update().clone());
        let mut current: Option<Pin<Box<B>>> = initial.map(|backend| Box::pin(build(backend)));

        loop {
            let event = tokio::select! {
                biased;
                backend = next_backend(&mut api) => Switch::Backend(backend),
                snapshot = next_snapshot(&mut current) => Switch::Snapshot(snapshot),
            };
            match event {
                Switch::Backend(backend) => {
                    tracing::debug!(backend = backend.as_ref().map(|b| b.name()), "Backend changed; rebuilding cache");
                    current = backend.map(|backend| Box::pin(build(backend)));
                },
                Switch::Snapshot(Some(snapshot)) => yield snapshot,
                Switch::Snapshot(None) => current = None,
            }
        }
    })
}

/// Register the command handle of the first snapshot in `registry`, so that
/// writes can reach this instance.
pub(crate) fn registered<S, K>(
    snapshots: impl Stream<Item = S> + Send + 'static,
    registry: Arc<ChannelRegistry<S::Handle, K>>,
    key: K,
) -> impl Stream<Item = S>
where
    S: Snapshot + Send + 'static,
    K: Send + Sync + 'static,
{
    let mut key = Some(key);
    stream!({
        for await snapshot in snapshots {
            if let Some(key) = key.take() {
                registry.register(key, snapshot.handle().clone()).await;
            }
            yield snapshot;
        }
    })
}

/// Resolves with the next backend. Pending forever once the repository is gone,
/// leaving the current instance alive.
async fn next_backend(api: &mut Option<watch::Receiver<Option<ApiHandle>>>) -> Option<ApiHandle> {
    if let Some(receiver) = api.as_mut() {
        if receiver.changed().await.is_ok() {
            return receiver.borrow_and_update().clone();
        }
        tracing::trace!("Repository dropped; keeping the current cache instance");
        *api = None;
    }
    pending().await
}

async fn next_snapshot<B: Stream + Unpin>(current: &mut Option<B>) -> Option<B::Item> {
    match current.as_mut() {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}
