//! Client side of the Lisu server API.
//!
//! [`LisuApi`](backend::LisuApi) is the one seam between the caches and the
//! network: every page loader and every write operation goes through it.
//! [`HttpApi`](backend::HttpApi) talks to a real server bound to one base
//! address; `MockApi` (behind the `mock` feature) keeps everything in memory
//! for tests.

pub mod backend;
pub mod error;
pub mod models;

pub use crate::backend::LisuApi;
use std::sync::Arc;

pub type ApiHandle = Arc<dyn LisuApi + Send + Sync>;
