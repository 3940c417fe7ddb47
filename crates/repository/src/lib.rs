//! The Lisu repository: reactive caches over a Lisu server.
//!
//! [`LisuRepository`] owns the current backend and hands out one cache
//! instance per subscription:
//!
//! | Resource            | Snapshot                      | Patched by writes |
//! |---------------------|-------------------------------|-------------------|
//! | `providers()`       | `RemoteData<Vec<Provider>>`   | no                |
//! | `manga(key)`        | `RemoteData<MangaDetail>`     | yes, by exact key |
//! | `board(..)`         | `RemoteList<Manga>`           | yes               |
//! | `library(keywords)` | `RemoteList<Manga>`           | yes               |
//! | `download_tasks()`  | `RemoteData<Vec<DownloadTask>>` | yes             |
//!
//! Live instances are tracked by their action channels only. There is no
//! shared identity map: a write walks the channels and sends each one a
//! keyed transform.

mod bind;
pub mod error;
mod repo;
#[cfg(test)]
mod testing;
mod write;

pub use crate::repo::{FIRST_PAGE, LisuRepository, RepositoryOptions};
