//! Reactive cache of a single remote value.

use crate::action::{DataAction, DataHandle, Snapshot};
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

/// A snapshot of one [`remote_data`] instance.
///
/// `value()` is `None` while a load is pending and nothing is known yet;
/// otherwise it holds the outcome of the latest load, with any local
/// mutations applied on top.
#[derive(Debug)]
pub struct RemoteData<T> {
    value: Option<LoadResult<T>>,
    handle: DataHandle<T>,
}

impl<T> RemoteData<T> {
    pub fn value(&self) -> Option<&LoadResult<T>> {
        self.value.as_ref()
    }

    /// The cached value, if the latest load succeeded.
    pub fn ok(&self) -> Option<&T> {
        self.value.as_ref().and_then(|v| v.as_ref().ok())
    }

    /// The failure, if the latest load failed.
    pub fn error(&self) -> Option<&LoadError> {
        self.value.as_ref().and_then(|v| v.as_ref().err())
    }

    pub fn is_loading(&self) -> bool {
        self.value.is_none()
    }

    pub fn into_value(self) -> Option<LoadResult<T>> {
        self.value
    }

    /// See [`DataHandle::mutate`].
    pub fn mutate(&self, transform: impl FnOnce(&mut T) + Send + 'static) {
        self.handle.mutate(transform);
    }

    /// See [`DataHandle::reload`].
    pub fn reload(&self) {
        self.handle.reload();
    }
}
impl<T: Clone> Clone for RemoteData<T> {
    fn clone(&self) -> Self {
        Self { value: self.value.clone(), handle: self.handle.clone() }
    }
}
impl<T: Send + 'static> Snapshot for RemoteData<T> {
    type Handle = DataHandle<T>;

    fn handle(&self) -> &DataHandle<T> {
        &self.handle
    }
}

enum Event<T> {
    Action(Option<DataAction<T>>),
    Loaded(Result<T>),
    ConnectivityChanged,
    RetryDue,
}

/// Create a cache around a one-shot `loader`.
///
/// The returned stream is cold: each collection owns a new instance, and the
/// first load starts as soon as the stream is first polled. Every state change
/// produces one snapshot. Loader failures are reported as values, never as
/// stream termination.
///
/// Whenever `signal` fires and the latest value is not a success, the value is
/// reloaded once the signal's debounce has elapsed.
///
/// # Examples
///
/// ```
/// use futures::StreamExt;
/// use lisu_remote::{ConnectivitySignal, remote_data};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let stream = remote_data(ConnectivitySignal::never(), || async { Ok(String::from("hello")) });
/// let mut stream = std::pin::pin!(stream);
/// assert!(stream.next().await.unwrap().is_loading());
///
/// let loaded = stream.next().await.unwrap();
/// assert_eq!(loaded.ok().map(String::as_str), Some("hello"));
///
/// loaded.mutate(|s| s.push_str(", world"));
/// let mutated = stream.next().await.unwrap();
/// assert_eq!(mutated.ok().map(String::as_str), Some("hello, world"));
/// # }
/// ```
pub fn remote_data<T, F, Fut>(signal: ConnectivitySignal, mut loader: F) -> impl Stream<Item = RemoteData<T>>
where
    T: Clone + Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let mut signal = signal;
    stream! {
        signal.mark_seen();
        let (sender, mut actions) = mpsc::unbounded_channel();
        let handle = DataHandle::new(sender);
        let mut value: Option<LoadResult<T>> = None;
        let mut load: Option<LoadFuture<T>> = Some(Box::pin(loader()));
        let mut retry_at: Option<Instant> = None;
        tracing::trace!("Remote data created; loading");
        yield RemoteData { value: value.clone(), handle: handle.clone() };

        loop {
            // Queued actions always win over a load that completed at the same
            // time, so a reload can never be overtaken by the load it replaces.
            let event = tokio::select! {
                biased;
                action = actions.recv() => Event::Action(action),
                result = settle(&mut load) => Event::Loaded(result),
                () = signal.changed() => Event::ConnectivityChanged,
                () = deadline(retry_at) => Event::RetryDue,
            };

            match event {
                // The instance holds a sender itself; unreachable in practice.
                Event::Action(None) => return,
                Event::Action(Some(DataAction::Mutate(transform))) => match value.as_mut() {
                    Some(Ok(current)) => {
                        transform(current);
                        yield RemoteData { value: value.clone(), handle: handle.clone() };
                    },
                    _ => tracing::trace!("Ignoring mutation; no successful value cached"),
                },
                Event::Action(Some(DataAction::Reload)) => {
                    tracing::trace!(in_flight = load.is_some(), "Reloading remote data");
                    load = Some(Box::pin(loader()));
                    value = None;
                    retry_at = None;
                    yield RemoteData { value: value.clone(), handle: handle.clone() };
                },
                Event::Loaded(result) => {
                    load = None;
                    value = Some(match result {
                        Ok(loaded) => Ok(loaded),
                        Err(err) => {
                            tracing::warn!(error = ?err, "Remote data failed to load");
                            Err(Arc::new(err))
                        },
                    });
                    yield RemoteData { value: value.clone(), handle: handle.clone() };
                },
                Event::ConnectivityChanged => {
                    retry_at = Some(Instant::now() + signal.debounce());
                },
                Event::RetryDue => {
                    retry_at = None;
                    if !matches!(value, Some(Ok(_))) {
                        tracing::debug!("Connectivity changed; reloading remote data");
                        load = Some(Box::pin(loader()));
                        value = None;
                        yield RemoteData { value: value.clone(), handle: handle.clone() };
                    }
                },
            }
        }
    }
}
