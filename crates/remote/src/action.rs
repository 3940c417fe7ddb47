//! Commands accepted by cache instances and the handles that send them.
//!
//! Each cache instance consumes exactly one unbounded FIFO channel. Handles are
//! cheap to clone and may be used from anywhere; they never block, and a
//! command sent to an instance that has already been torn down is dropped.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use tokio::sync::mpsc::UnboundedSender;

/// Boxed in-place transform of a cached value.
pub type Transform<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

/// Boxed in-place transform of accumulated list items, returning whether it
/// changed anything.
pub type ListTransform<T> = Box<dyn FnOnce(&mut Vec<T>) -> bool + Send + 'static>;

/// A command for a [`RemoteData`](crate::RemoteData) instance.
pub enum DataAction<T> {
    /// Transform the cached value in place, if there is a successful one.
    Mutate(Transform<T>),
    /// Discard the current value and any in-flight load, then load again.
    Reload,
}

/// A command for a [`RemoteList`](crate::RemoteList) instance.
pub enum ListAction<T> {
    /// Transform the accumulated items in place. Load states are untouched.
    Mutate(ListTransform<T>),
    /// Discard all pages and any in-flight load, then load the first page.
    Reload,
    /// Load the page after the last one received, unless one is in flight or
    /// the list is exhausted.
    RequestNextPage,
}

impl<T> Debug for DataAction<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Mutate(_) => f.write_str("Mutate"),
            Self::Reload => f.write_str("Reload"),
        }
    }
}
impl<T> Debug for ListAction<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Mutate(_) => f.write_str("Mutate"),
            Self::Reload => f.write_str("Reload"),
            Self::RequestNextPage => f.write_str("RequestNextPage"),
        }
    }
}

/// Anything that feeds a cache instance's action channel.
pub trait ActionChannel {
    /// `true` once the instance behind the channel has been torn down.
    fn is_closed(&self) -> bool;
}

/// An emitted cache snapshot that carries the handle of its instance.
pub trait Snapshot {
    type Handle: ActionChannel + Clone + Send + Sync + 'static;

    fn handle(&self) -> &Self::Handle;
}

/// Sends commands to one [`RemoteData`](crate::RemoteData) instance.
pub struct DataHandle<T> {
    sender: UnboundedSender<DataAction<T>>,
}

impl<T> DataHandle<T> {
    pub(crate) fn new(sender: UnboundedSender<DataAction<T>>) -> Self {
        Self { sender }
    }

    /// Transform the cached value in place.
    ///
    /// Ignored unless the instance currently holds a successful value; a
    /// mutation never invents a value out of a pending or failed load.
    pub fn mutate(&self, transform: impl FnOnce(&mut T) + Send + 'static) {
        self.send(DataAction::Mutate(Box::new(transform)));
    }

    /// Cancel any in-flight load and load the value again.
    pub fn reload(&self) {
        self.send(DataAction::Reload);
    }

    fn send(&self, action: DataAction<T>) {
        if let Err(rejected) = self.sender.send(action) {
            tracing::trace!(action = ?rejected.0, "Dropping action for torn-down remote data");
        }
    }
}
impl<T> Clone for DataHandle<T> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}
impl<T> ActionChannel for DataHandle<T> {
    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
impl<T> Debug for DataHandle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DataHandle").field("closed", &self.sender.is_closed()).finish()
    }
}

/// Sends commands to one [`RemoteList`](crate::RemoteList) instance.
pub struct ListHandle<T> {
    sender: UnboundedSender<ListAction<T>>,
}

impl<T> ListHandle<T> {
    pub(crate) fn new(sender: UnboundedSender<ListAction<T>>) -> Self {
        Self { sender }
    }

    /// Transform the accumulated items in place, without touching the network.
    ///
    /// The transform returns whether it changed anything. When it returns
    /// `false` the instance emits nothing, so a patch that matched no item
    /// stays invisible to subscribers.
    pub fn mutate(&self, transform: impl FnOnce(&mut Vec<T>) -> bool + Send + 'static) {
        self.send(ListAction::Mutate(Box::new(transform)));
    }

    /// Cancel any in-flight page load and start over from the first page.
    pub fn reload(&self) {
        self.send(ListAction::Reload);
    }

    /// Load the next page, if there is one and nothing is loading.
    pub fn request_next_page(&self) {
        self.send(ListAction::RequestNextPage);
    }

    fn send(&self, action: ListAction<T>) {
        if let Err(rejected) = self.sender.send(action) {
            tracing::trace!(action = ?rejected.0, "Dropping action for torn-down remote list");
        }
    }
}
impl<T> Clone for ListHandle<T> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}
impl<T> ActionChannel for ListHandle<T> {
    fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
impl<T> Debug for ListHandle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ListHandle").field("closed", &self.sender.is_closed()).finish()
    }
}
