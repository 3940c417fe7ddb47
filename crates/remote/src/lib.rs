//! Reactive client-side caches for remote resources.
//!
//! Two cache kinds live here:
//! - [`RemoteData`] wraps a one-shot loader and caches a single value.
//! - [`RemoteList`] wraps a page loader and accumulates pages into a list,
//!   tracking the first-page outcome and the latest-page outcome separately.
//!
//! Both are exposed as [`Stream`](futures::Stream)s of snapshots. Collecting
//! a stream creates one cache instance with its own actor loop; every command
//! issued through a snapshot's handle is queued on that instance's action
//! channel and applied in FIFO order, so loads, reloads and local mutations
//! never interleave. Dropping the stream tears the instance down, including
//! any load still in flight.
//!
//! A [`ConnectivitySignal`] lets every instance retry failed loads when the
//! active network interface changes.

mod action;
mod connectivity;
mod data;
mod driver;
pub mod error;
mod list;
mod registry;

pub use crate::action::{
    ActionChannel, DataAction, DataHandle, ListAction, ListHandle, ListTransform, Snapshot, Transform,
};
pub use crate::connectivity::{ConnectivityMonitor, ConnectivitySignal, DEFAULT_RETRY_DEBOUNCE};
pub use crate::data::{RemoteData, remote_data};
pub use crate::list::{Page, RemoteList, remote_list};
pub use crate::registry::ChannelRegistry;
use std::sync::Arc;

/// A load failure, shared between every snapshot that reports it.
pub type LoadError = Arc<error::Error>;
/// The outcome of a load as seen by subscribers.
pub type LoadResult<T> = std::result::Result<T, LoadError>;
