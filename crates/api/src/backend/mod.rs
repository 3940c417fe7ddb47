//! The Lisu API trait and its implementations.

mod http;
#[cfg(feature = "mock")]
mod mock;

pub use self::http::{DEFAULT_TIMEOUT, HttpApi};
#[cfg(feature = "mock")]
pub use self::mock::{Call, MockApi};
use crate::error::Result;
use crate::models::{
    Ack, BoardQuery, ChapterKey, DownloadTask, Manga, MangaDetail, MangaKey, MangaMetadata, Provider,
};
use async_trait::async_trait;

/// Unified interface to a Lisu server.
///
/// Reads come in two shapes: one-shot (`list_providers`, `get_manga`,
/// `list_download_tasks`) and paged (`get_board`, `search_library`), where
/// pages are numbered from 1 and an empty page means the listing is
/// exhausted. Every write answers with an [`Ack`] or an error; it never
/// returns the updated entity, so callers patch their own copies.
///
/// # Examples
///
/// ```no_run
/// use lisu_api::LisuApi;
/// use lisu_api::error::Result;
/// use lisu_api::models::{MangaKey, MangaState};
///
/// async fn subscribe(api: &dyn LisuApi, key: &MangaKey) -> Result<bool> {
///     let detail = api.get_manga(key).await?;
///     if detail.state == MangaState::Remote {
///         api.add_manga_to_library(key).await?;
///         return Ok(true);
///     }
///     Ok(false)
/// }
/// ```
#[async_trait]
pub trait LisuApi: Send + Sync {
    /// Name of the backend, for logging only.
    fn name(&self) -> &str;

    async fn list_providers(&self) -> Result<Vec<Provider>>;

    async fn get_manga(&self, key: &MangaKey) -> Result<MangaDetail>;

    /// One page of a provider board.
    async fn get_board(&self, query: &BoardQuery, page: u32) -> Result<Vec<Manga>>;

    /// One page of library mangas matching `keywords` (all of them when blank).
    async fn search_library(&self, keywords: &str, page: u32) -> Result<Vec<Manga>>;

    async fn add_manga_to_library(&self, key: &MangaKey) -> Result<Ack>;

    /// Add several mangas at once.
    ///
    /// Default implementation of this method is to add them one by one,
    /// stopping at the first failure.
    async fn add_mangas_to_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        for key in keys {
            self.add_manga_to_library(key).await?;
        }
        Ok(Ack)
    }

    async fn remove_manga_from_library(&self, key: &MangaKey) -> Result<Ack>;

    /// Remove several mangas at once.
    ///
    /// Default implementation of this method is to remove them one by one,
    /// stopping at the first failure.
    async fn remove_mangas_from_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        for key in keys {
            self.remove_manga_from_library(key).await?;
        }
        Ok(Ack)
    }

    async fn update_manga_metadata(&self, key: &MangaKey, metadata: &MangaMetadata) -> Result<Ack>;

    /// Replace the cover image. `content_type` is the image's MIME type.
    async fn update_manga_cover(&self, key: &MangaKey, cover: Vec<u8>, content_type: &str) -> Result<Ack>;

    async fn list_download_tasks(&self) -> Result<Vec<DownloadTask>>;

    /// (Re)start the download task of one chapter.
    async fn start_download(&self, key: &ChapterKey) -> Result<Ack>;

    /// Restart every failed download task.
    async fn start_all_downloads(&self) -> Result<Ack>;

    async fn cancel_download(&self, key: &ChapterKey) -> Result<Ack>;

    async fn cancel_all_downloads(&self) -> Result<Ack>;
}
