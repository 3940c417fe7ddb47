//! Wire models shared by the server API and the caches.
//!
//! Entities are identified by natural composite keys ([`MangaKey`],
//! [`ChapterKey`]) because the same manga shows up at once in board listings,
//! library listings and detail views, each cached independently.

mod download;
mod manga;
mod provider;

pub use self::download::{ChapterKey, DownloadState, DownloadTask};
pub use self::manga::{Chapter, ChapterCollection, Manga, MangaDetail, MangaKey, MangaMetadata, MangaState};
pub use self::provider::{BoardFilters, BoardId, BoardQuery, Provider};

/// Acknowledgement of a successful write. The server sends no body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Ack;
