//! Helpers shared by the unit tests of this crate.

use futures::{Stream, StreamExt};
use lisu_api::models::MangaDetail;
use std::fmt::Debug;
use std::time::Duration;
use tokio::time::timeout;

pub(crate) fn detail(provider_id: &str, id: &str, title: &str) -> MangaDetail {
    MangaDetail { title: Some(title.to_string()), ..MangaDetail::new(provider_id, id) }
}

/// Next snapshot accepted by `ready`, skipping the ones before it.
pub(crate) async fn next_matching<S>(
    stream: &mut (impl Stream<Item = S> + Unpin),
    mut ready: impl FnMut(&S) -> bool,
) -> S {
    loop {
        let snapshot = timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timed out waiting for a snapshot")
            .expect("stream ended");
        if ready(&snapshot) {
            return snapshot;
        }
    }
}

/// Asserts that nothing is emitted for a while.
pub(crate) async fn quiet<S: Debug>(stream: &mut (impl Stream<Item = S> + Unpin)) {
    if let Ok(emitted) = timeout(Duration::from_secs(1), stream.next()).await {
        panic!("unexpected emission: {emitted:?}");
    }
}
