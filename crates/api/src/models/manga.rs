use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::OffsetDateTime;

/// Identifies a manga across every cache: `(provider, manga)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaKey {
    pub provider_id: String,
    pub manga_id: String,
}
impl MangaKey {
    pub fn new(provider_id: impl Into<String>, manga_id: impl Into<String>) -> Self {
        Self { provider_id: provider_id.into(), manga_id: manga_id.into() }
    }
}
impl Display for MangaKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.provider_id, self.manga_id)
    }
}

/// Where a manga lives, relative to the server's library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MangaState {
    /// Imported from local files; has no remote provider behind it.
    Local,
    /// Known to a provider but not subscribed.
    #[default]
    Remote,
    /// Known to a provider and subscribed in the library.
    RemoteInLibrary,
}

/// User-editable metadata of a manga.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MangaMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub is_finished: Option<bool>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, Vec<String>>,
}

/// Summary of a manga, as listed by boards and library searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manga {
    pub provider_id: String,
    pub id: String,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default, with = "time::serde::timestamp::milliseconds::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub is_finished: Option<bool>,
    #[serde(default)]
    pub state: MangaState,
}
impl Manga {
    pub fn key(&self) -> MangaKey {
        MangaKey::new(&self.provider_id, &self.id)
    }

    pub fn is(&self, key: &MangaKey) -> bool {
        self.provider_id == key.provider_id && self.id == key.manga_id
    }

    /// Overwrite the fields a board listing shows with edited metadata.
    pub fn apply(&mut self, metadata: &MangaMetadata) {
        self.title = metadata.title.clone();
        self.authors = metadata.authors.clone();
        self.is_finished = metadata.is_finished;
    }

    /// Display title, falling back to the id.
    pub fn title_or_id(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, with = "time::serde::timestamp::milliseconds::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub is_locked: bool,
}

/// A named run of chapters (e.g. a translation group or a volume split).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterCollection {
    pub id: String,
    pub chapters: Vec<Chapter>,
}

/// Everything known about one manga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangaDetail {
    pub provider_id: String,
    pub id: String,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default, with = "time::serde::timestamp::milliseconds::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub is_finished: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub collections: Vec<ChapterCollection>,
    #[serde(default)]
    pub state: MangaState,
}
impl MangaDetail {
    /// A remote manga with nothing known about it but its key.
    pub fn new(provider_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            id: id.into(),
            cover: None,
            updated_at: None,
            title: None,
            authors: Vec::new(),
            is_finished: None,
            description: None,
            tags: BTreeMap::new(),
            collections: Vec::new(),
            state: MangaState::Remote,
        }
    }

    pub fn key(&self) -> MangaKey {
        MangaKey::new(&self.provider_id, &self.id)
    }

    pub fn apply(&mut self, metadata: &MangaMetadata) {
        self.title = metadata.title.clone();
        self.authors = metadata.authors.clone();
        self.is_finished = metadata.is_finished;
        self.description = metadata.description.clone();
        self.tags = metadata.tags.clone();
    }

    /// The listing view of this manga.
    pub fn summary(&self) -> Manga {
        Manga {
            provider_id: self.provider_id.clone(),
            id: self.id.clone(),
            cover: self.cover.clone(),
            updated_at: self.updated_at,
            title: self.title.clone(),
            authors: self.authors.clone(),
            is_finished: self.is_finished,
            state: self.state,
        }
    }
}
