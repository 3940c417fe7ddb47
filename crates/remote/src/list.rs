//! Reactive cache of a paginated remote collection.
//!
//! A list tracks two outcomes independently:
//! - the *list state*, i.e. whether the first page ever arrived, and
//! - the *append state*, i.e. how the most recent page load went.
//!
//! A failed "load more" therefore never hides items that are already shown,
//! and a retry knows whether to start over or just fetch the missing page.

use crate::action::{ListAction, ListHandle, Snapshot};
use crate::connectivity::ConnectivitySignal;
use crate::driver::{LoadFuture, deadline, settle};
use crate::error::Result;
use crate::{LoadError, LoadResult};
use async_stream::stream;
use futures::Stream;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One page returned by a page loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<K, T> {
    pub data: Vec<T>,
    /// Cursor of the following page; `None` once the collection is exhausted.
    pub next_key: Option<K>,
}

impl<K, T> Page<K, T> {
    pub fn new(data: Vec<T>, next_key: Option<K>) -> Self {
        Self { data, next_key }
    }

    /// A page with nothing after it.
    pub fn last(data: Vec<T>) -> Self {
        Self { data, next_key: None }
    }
}

/// A snapshot of one [`remote_list`] instance.
#[derive(Debug)]
pub struct RemoteList<T, K = u32> {
    items: Arc<Vec<T>>,
    list_state: Option<LoadResult<()>>,
    append_state: Option<LoadResult<()>>,
    next_key: Option<K>,
    handle: ListHandle<T>,
}

impl<T, K> RemoteList<T, K> {
    /// Items of every page loaded so far, in load order.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Shared copy of the items, without cloning them.
    pub fn shared_items(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.items)
    }

    /// Outcome of the first page load; `None` while it is pending.
    pub fn list_state(&self) -> Option<&LoadResult<()>> {
        self.list_state.as_ref()
    }

    /// Outcome of the most recent page load; `None` while it is pending.
    pub fn append_state(&self) -> Option<&LoadResult<()>> {
        self.append_state.as_ref()
    }

    /// Cursor of the next page to load, `None` once exhausted.
    pub fn next_key(&self) -> Option<&K> {
        self.next_key.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_key.is_none()
    }

    /// The first page failed, so there is nothing to show at all.
    pub fn list_error(&self) -> Option<&LoadError> {
        self.list_state.as_ref().and_then(|s| s.as_ref().err())
    }

    /// The latest page failed.
    pub fn append_error(&self) -> Option<&LoadError> {
        self.append_state.as_ref().and_then(|s| s.as_ref().err())
    }

    /// See [`ListHandle::mutate`].
    pub fn mutate(&self, transform: impl FnOnce(&mut Vec<T>) -> bool + Send + 'static) {
        self.handle.mutate(transform);
    }

    /// See [`ListHandle::reload`].
    pub fn reload(&self) {
        self.handle.reload();
    }

    /// See [`ListHandle::request_next_page`].
    pub fn request_next_page(&self) {
        self.handle.request_next_page();
    }
}
impl<T, K: Clone> Clone for RemoteList<T, K> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            list_state: self.list_state.clone(),
            append_state: self.append_state.clone(),
            next_key: self.next_key.clone(),
            handle: self.handle.clone(),
        }
    }
}
impl<T: Send + 'static, K> Snapshot for RemoteList<T, K> {
    type Handle = ListHandle<T>;

    fn handle(&self) -> &ListHandle<T> {
        &self.handle
    }
}

enum Event<K, T> {
    Action(Option<ListAction<T>>),
    Loaded(Result<Page<K, T>>),
    ConnectivityChanged,
    RetryDue,
}

/// Create a paginated cache around a page `loader`, starting at `start_key`.
///
/// Like [`remote_data`](crate::remote_data), the stream is cold and each
/// collection owns one instance whose first page starts loading immediately.
///
/// On a connectivity change (after the signal's debounce), a list whose first
/// page never loaded is reloaded, while a list whose latest page failed only
/// requests that page again.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use lisu_remote::{ConnectivitySignal, Page, remote_list};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let stream = remote_list(ConnectivitySignal::never(), 1_u32, |page| async move {
///     Ok(match page {
///         1 => Page::new(vec!["a", "b"], Some(2)),
///         _ => Page::last(vec!["c"]),
///     })
/// });
/// let mut stream = std::pin::pin!(stream);
/// stream.next().await;
/// let first = stream.next().await.unwrap();
/// assert_eq!(first.items(), ["a", "b"]);
///
/// first.request_next_page();
/// stream.next().await;
/// let all = stream.next().await.unwrap();
/// assert_eq!(all.items(), ["a", "b", "c"]);
/// assert!(all.is_exhausted());
/// # }
/// ```
pub fn remote_list<T, K, F, Fut>(
    signal: ConnectivitySignal,
    start_key: K,
    mut loader: F,
) -> impl Stream<Item = RemoteList<T, K>>
where
    T: Clone + Send + Sync + 'static,
    K: Clone + Send + 'static,
    F: FnMut(K) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page<K, T>>> + Send + 'static,
{
    let mut signal = signal;
    stream! {
        signal.mark_seen();
        let (sender, mut actions) = mpsc::unbounded_channel();
        let handle = ListHandle::new(sender);
        let mut items: Arc<Vec<T>> = Arc::new(Vec::new());
        let mut list_state: Option<LoadResult<()>> = None;
        let mut append_state: Option<LoadResult<()>> = None;
        let mut next_key: Option<K> = Some(start_key.clone());
        let mut load: Option<LoadFuture<Page<K, T>>> = Some(Box::pin(loader(start_key.clone())));
        let mut retry_at: Option<Instant> = None;
        tracing::trace!("Remote list created; loading first page");
        yield RemoteList {
            items: Arc::clone(&items),
            list_state: list_state.clone(),
            append_state: append_state.clone(),
            next_key: next_key.clone(),
            handle: handle.clone(),
        };

        loop {
            // Queued actions always win over a page that completed at the same
            // time: a reload must discard that page rather than race it.
            let event = tokio::select! {
                biased;
                action = actions.recv() => Event::Action(action),
                result = settle(&mut load) => Event::Loaded(result),
                () = signal.changed() => Event::ConnectivityChanged,
                () = deadline(retry_at) => Event::RetryDue,
            };

            // Retries are reduced to the action they stand for.
            let event = match event {
                Event::RetryDue => {
                    retry_at = None;
                    if !matches!(list_state, Some(Ok(()))) {
                        tracing::debug!("Connectivity changed; reloading remote list");
                        Event::Action(Some(ListAction::Reload))
                    } else if !matches!(append_state, Some(Ok(()))) {
                        tracing::debug!("Connectivity changed; requesting failed page again");
                        Event::Action(Some(ListAction::RequestNextPage))
                    } else {
                        continue;
                    }
                },
                other => other,
            };

            match event {
                // The instance holds a sender itself; unreachable in practice.
                Event::Action(None) => return,
                Event::Action(Some(ListAction::Mutate(transform))) => {
                    if !transform(Arc::make_mut(&mut items)) {
                        tracing::trace!("Mutation left remote list unchanged");
                        continue;
                    }
                },
                Event::Action(Some(ListAction::Reload)) => {
                    tracing::trace!(in_flight = load.is_some(), "Reloading remote list");
                    load = Some(Box::pin(loader(start_key.clone())));
                    items = Arc::new(Vec::new());
                    next_key = Some(start_key.clone());
                    list_state = None;
                    append_state = None;
                    retry_at = None;
                },
                Event::Action(Some(ListAction::RequestNextPage)) => {
                    if load.is_some() {
                        tracing::trace!("Ignoring next page request; a page is already loading");
                        continue;
                    }
                    let Some(key) = next_key.clone() else {
                        tracing::trace!("Ignoring next page request; list is exhausted");
                        continue;
                    };
                    load = Some(Box::pin(loader(key)));
                    append_state = None;
                },
                Event::Loaded(Ok(page)) => {
                    load = None;
                    tracing::trace!(items = page.data.len(), exhausted = page.next_key.is_none(), "Page loaded");
                    Arc::make_mut(&mut items).extend(page.data);
                    next_key = page.next_key;
                    list_state = Some(Ok(()));
                    append_state = Some(Ok(()));
                },
                Event::Loaded(Err(err)) => {
                    load = None;
                    tracing::warn!(error = ?err, first_page = list_state.is_none(), "Page failed to load");
                    let err = Arc::new(err);
                    append_state = Some(Err(Arc::clone(&err)));
                    if list_state.is_none() {
                        list_state = Some(Err(err));
                    }
                },
                Event::ConnectivityChanged => {
                    retry_at = Some(Instant::now() + signal.debounce());
                    continue;
                },
                Event::RetryDue => continue,
            }

            yield RemoteList {
                items: Arc::clone(&items),
                list_state: list_state.clone(),
                append_state: append_state.clone(),
                next_key: next_key.clone(),
                handle: handle.clone(),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectivityMonitor;
    use crate::error::ErrorKind;
    use futures::StreamExt;
    use rstest::rstest;
    use std::collections::HashMap;
    use std::pin::pin;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tokio::time::timeout;

    /// In-memory page source: pages are numbered from 1, every call is
    /// recorded, and scripted failures are consumed one call at a time.
    #[derive(Clone, Default)]
    struct Pages {
        pages: Arc<HashMap<u32, Page<u32, &'static str>>>,
        failures: Arc<Mutex<Vec<u32>>>,
        calls: Arc<Mutex<Vec<u32>>>,
        gate: Option<Arc<Semaphore>>,
    }

    impl Pages {
        fn new(pages: impl IntoIterator<Item = (u32, Vec<&'static str>, Option<u32>)>) -> Self {
            let pages = pages.into_iter().map(|(key, data, next)| (key, Page::new(data, next))).collect();
            Self { pages: Arc::new(pages), ..Self::default() }
        }

        /// The next load of `key` fails.
        fn fail_once(self, key: u32) -> Self {
            self.failures.lock().unwrap().push(key);
            self
        }

        /// Every load waits for one permit of the returned semaphore.
        fn gated(mut self) -> (Self, Arc<Semaphore>) {
            let gate = Arc::new(Semaphore::new(0));
            self.gate = Some(gate.clone());
            (self, gate)
        }

        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }

        fn loader(&self) -> impl FnMut(u32) -> LoadFuture<Page<u32, &'static str>> + Send + 'static {
            let pages = self.clone();
            move |key| {
                let pages = pages.clone();
                Box::pin(async move {
                    pages.calls.lock().unwrap().push(key);
                    if let Some(gate) = &pages.gate {
                        gate.acquire().await.unwrap().forget();
                    }
                    let fail = {
                        let mut failures = pages.failures.lock().unwrap();
                        match failures.iter().position(|k| *k == key) {
                            Some(index) => {
                                failures.remove(index);
                                true
                            },
                            None => false,
                        }
                    };
                    if fail {
                        return Err(exn::Exn::from(ErrorKind::Load));
                    }
                    Ok(pages.pages.get(&key).cloned().unwrap_or_else(|| Page::last(vec![])))
                })
            }
        }
    }

    fn two_pages() -> Pages {
        Pages::new([(1, vec!["a", "b"], Some(2)), (2, vec!["c"], None)])
    }

    #[tokio::test]
    async fn test_first_page_then_append_until_exhausted() {
        let pages = two_pages();
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));

        let pending = stream.next().await.unwrap();
        assert!(pending.list_state().is_none());
        assert!(pending.append_state().is_none());
        assert_eq!(pending.next_key(), Some(&1));

        let first = stream.next().await.unwrap();
        assert_eq!(first.items(), ["a", "b"]);
        assert!(matches!(first.list_state(), Some(Ok(()))));
        assert_eq!(first.next_key(), Some(&2));

        first.request_next_page();
        let appending = stream.next().await.unwrap();
        assert!(appending.append_state().is_none());
        assert!(matches!(appending.list_state(), Some(Ok(()))));
        assert_eq!(appending.items(), ["a", "b"]);

        let done = stream.next().await.unwrap();
        assert_eq!(done.items(), ["a", "b", "c"]);
        assert!(done.is_exhausted());
        assert!(matches!(done.append_state(), Some(Ok(()))));

        // Exhausted: further requests never reach the loader.
        done.request_next_page();
        done.request_next_page();
        assert!(timeout(Duration::from_millis(50), stream.next()).await.is_err());
        assert_eq!(pages.calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_next_page_request_while_loading_is_ignored() {
        let (pages, gate) = two_pages().gated();
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        stream.next().await.unwrap();
        gate.add_permits(1);
        let first = stream.next().await.unwrap();

        first.request_next_page();
        first.request_next_page();
        first.request_next_page();
        assert!(stream.next().await.unwrap().append_state().is_none());
        gate.add_permits(1);
        let done = stream.next().await.unwrap();
        assert_eq!(done.items(), ["a", "b", "c"]);
        assert_eq!(pages.calls(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_next_page_request_during_first_load_is_ignored() {
        let (pages, gate) = two_pages().gated();
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        let pending = stream.next().await.unwrap();
        pending.request_next_page();
        gate.add_permits(1);
        let first = stream.next().await.unwrap();
        assert_eq!(first.items(), ["a", "b"]);
        assert_eq!(pages.calls(), vec![1]);
    }

    #[tokio::test]
    async fn test_append_failure_keeps_loaded_items() {
        let pages = two_pages().fail_once(2);
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        stream.next().await.unwrap();
        stream.next().await.unwrap().request_next_page();
        stream.next().await.unwrap();

        let failed = stream.next().await.unwrap();
        assert!(matches!(failed.list_state(), Some(Ok(()))));
        assert!(failed.append_error().is_some());
        assert_eq!(failed.items(), ["a", "b"]);
        assert_eq!(failed.next_key(), Some(&2));

        // Asking again retries the same page.
        failed.request_next_page();
        stream.next().await.unwrap();
        let done = stream.next().await.unwrap();
        assert_eq!(done.items(), ["a", "b", "c"]);
        assert!(matches!(done.append_state(), Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_first_page_failure_fails_the_list() {
        let pages = two_pages().fail_once(1);
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        stream.next().await.unwrap();
        let failed = stream.next().await.unwrap();
        assert!(failed.list_error().is_some());
        assert!(failed.append_error().is_some());
        assert!(failed.items().is_empty());
    }

    #[tokio::test]
    async fn test_reload_resets_to_start_key() {
        let pages = two_pages();
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        stream.next().await.unwrap();
        stream.next().await.unwrap().request_next_page();
        stream.next().await.unwrap();
        let done = stream.next().await.unwrap();
        assert!(done.is_exhausted());

        done.reload();
        let reloading = stream.next().await.unwrap();
        assert!(reloading.items().is_empty());
        assert_eq!(reloading.next_key(), Some(&1));
        assert!(reloading.list_state().is_none());
        assert!(reloading.append_state().is_none());

        let reloaded = stream.next().await.unwrap();
        assert_eq!(reloaded.items(), ["a", "b"]);
        assert_eq!(pages.calls(), vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn test_reload_discards_in_flight_page() {
        let (pages, gate) = two_pages().gated();
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        stream.next().await.unwrap();
        gate.add_permits(1);
        let first = stream.next().await.unwrap();
        first.request_next_page();
        stream.next().await.unwrap();

        // Page 2 is stuck at the gate; the reload must win.
        first.reload();
        assert!(stream.next().await.unwrap().items().is_empty());
        gate.add_permits(1);
        let reloaded = stream.next().await.unwrap();
        assert_eq!(reloaded.items(), ["a", "b"]);
        assert_eq!(reloaded.next_key(), Some(&2));
    }

    #[tokio::test]
    async fn test_mutate_leaves_load_states_alone() {
        let pages = two_pages();
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        stream.next().await.unwrap();
        let first = stream.next().await.unwrap();
        first.mutate(|items| {
            items.retain(|item| *item != "a");
            true
        });
        let mutated = stream.next().await.unwrap();
        assert_eq!(mutated.items(), ["b"]);
        assert!(matches!(mutated.list_state(), Some(Ok(()))));
        assert_eq!(mutated.next_key(), Some(&2));
        // Earlier snapshots are unaffected.
        assert_eq!(first.items(), ["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_mutation_is_not_emitted() {
        let pages = two_pages();
        let mut stream = pin!(remote_list(ConnectivitySignal::never(), 1, pages.loader()));
        stream.next().await.unwrap();
        let first = stream.next().await.unwrap();

        first.mutate(|items| {
            let before = items.len();
            items.retain(|item| *item != "z");
            items.len() != before
        });
        assert!(timeout(Duration::from_secs(1), stream.next()).await.is_err());

        // The channel is still live and later changes go through.
        first.mutate(|items| {
            items.push("z");
            true
        });
        assert_eq!(stream.next().await.unwrap().items(), ["a", "b", "z"]);
    }

    #[rstest]
    #[case::first_page_failed(1, vec![1, 1])]
    #[case::second_page_failed(2, vec![1, 2, 2])]
    #[tokio::test(start_paused = true)]
    async fn test_connectivity_retry_policy(#[case] failing: u32, #[case] expected_calls: Vec<u32>) {
        let monitor = ConnectivityMonitor::new();
        let pages = two_pages().fail_once(failing);
        let mut stream = pin!(remote_list(monitor.signal(), 1, pages.loader()));
        stream.next().await.unwrap();
        let mut latest = stream.next().await.unwrap();
        if failing == 2 {
            latest.request_next_page();
            stream.next().await.unwrap();
            latest = stream.next().await.unwrap();
        }
        assert!(latest.append_error().is_some());

        monitor.notify(Some("eth0".to_string()));
        let retrying = stream.next().await.unwrap();
        if failing == 1 {
            // Nothing was ever shown: start over.
            assert!(retrying.list_state().is_none());
        } else {
            // Page 1 is fine: keep it and fetch page 2 again.
            assert!(matches!(retrying.list_state(), Some(Ok(()))));
            assert_eq!(retrying.items(), ["a", "b"]);
        }
        assert!(stream.next().await.unwrap().append_error().is_none());
        assert_eq!(pages.calls(), expected_calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_burst_is_debounced() {
        let monitor = ConnectivityMonitor::new();
        let pages = two_pages().fail_once(1);
        let mut stream = pin!(remote_list(monitor.signal(), 1, pages.loader()));
        stream.next().await.unwrap();
        stream.next().await.unwrap();

        let flapping = async {
            for _ in 0..5 {
                monitor.notify(None);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        };
        let (_, retrying) = tokio::join!(flapping, stream.next());
        assert!(retrying.unwrap().list_state().is_none());
        stream.next().await.unwrap();
        assert_eq!(pages.calls(), vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_ignored_when_healthy() {
        let monitor = ConnectivityMonitor::new();
        let pages = two_pages();
        let mut stream = pin!(remote_list(monitor.signal(), 1, pages.loader()));
        stream.next().await.unwrap();
        stream.next().await.unwrap();

        monitor.notify(None);
        assert!(timeout(Duration::from_secs(1), stream.next()).await.is_err());
        assert_eq!(pages.calls(), vec![1]);
    }
}
