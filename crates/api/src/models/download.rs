use crate::models::MangaKey;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Identifies a chapter across every cache: `(provider, manga, collection, chapter)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterKey {
    pub provider_id: String,
    pub manga_id: String,
    pub collection_id: String,
    pub chapter_id: String,
}
impl ChapterKey {
    pub fn new(
        provider_id: impl Into<String>,
        manga_id: impl Into<String>,
        collection_id: impl Into<String>,
        chapter_id: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            manga_id: manga_id.into(),
            collection_id: collection_id.into(),
            chapter_id: chapter_id.into(),
        }
    }

    pub fn manga(&self) -> MangaKey {
        MangaKey::new(&self.provider_id, &self.manga_id)
    }
}
impl Display for ChapterKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}/{}/{}", self.provider_id, self.manga_id, self.collection_id, self.chapter_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DownloadState {
    Waiting,
    Downloading { downloaded: u32, total: u32 },
    Failed { message: String },
}

/// A chapter queued on the server for download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    #[serde(flatten)]
    pub key: ChapterKey,
    #[serde(default)]
    pub title: Option<String>,
    pub state: DownloadState,
}
