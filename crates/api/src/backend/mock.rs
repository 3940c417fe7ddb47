//! In-memory Lisu server for testing.

use crate::LisuApi;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Ack, BoardId, BoardQuery, ChapterKey, DownloadState, DownloadTask, Manga, MangaDetail, MangaKey, MangaMetadata,
    MangaState, Provider,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{RwLock, Semaphore};

/// Mangas per page when no page size is configured.
const DEFAULT_PAGE_SIZE: usize = 20;

/// Every operation of [`MockApi`], for counting calls and injecting failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    ListProviders,
    GetManga,
    GetBoard,
    SearchLibrary,
    AddManga,
    AddMangas,
    RemoveManga,
    RemoveMangas,
    UpdateMetadata,
    UpdateCover,
    ListDownloads,
    StartDownload,
    StartAllDownloads,
    CancelDownload,
    CancelAllDownloads,
}
impl Call {
    fn is_read(self) -> bool {
        matches!(
            self,
            Self::ListProviders | Self::GetManga | Self::GetBoard | Self::SearchLibrary | Self::ListDownloads
        )
    }
}

#[derive(Default)]
struct State {
    providers: Vec<Provider>,
    mangas: BTreeMap<MangaKey, MangaDetail>,
    boards: HashMap<(String, BoardId), Vec<MangaKey>>,
    library: Vec<MangaKey>,
    downloads: Vec<DownloadTask>,
    page_size: usize,
}
impl State {
    /// The stored manga, with its state derived from library membership.
    fn detail(&self, key: &MangaKey) -> Option<MangaDetail> {
        let mut detail = self.mangas.get(key)?.clone();
        detail.state = match (detail.state, self.library.contains(key)) {
            (MangaState::Local, _) => MangaState::Local,
            (_, true) => MangaState::RemoteInLibrary,
            (_, false) => MangaState::Remote,
        };
        Some(detail)
    }

    fn page<'a>(
        &self,
        keys: impl Iterator<Item = &'a MangaKey>,
        keywords: Option<&str>,
        page: u32,
    ) -> Result<Vec<Manga>> {
        if page == 0 {
            exn::bail!(ErrorKind::Status { code: 400, message: "pages start at 1".to_string() });
        }
        let needle = keywords.map(str::trim).filter(|k| !k.is_empty()).map(str::to_lowercase);
        let size = self.page_size.max(1);
        let mangas = keys
            .filter_map(|key| self.detail(key))
            .filter(|detail| match &needle {
                Some(needle) => detail.title.as_deref().is_some_and(|t| t.to_lowercase().contains(needle)),
                None => true,
            })
            .skip((page as usize - 1) * size)
            .take(size)
            .map(|detail| detail.summary())
            .collect();
        Ok(mangas)
    }

    fn existing(&mut self, key: &MangaKey) -> Result<&mut MangaDetail> {
        match self.mangas.get_mut(key) {
            Some(detail) => Ok(detail),
            None => exn::bail!(ErrorKind::not_found(format!("manga {key}"))),
        }
    }
}

/// In-memory Lisu server for testing.
///
/// State lives behind a [`RwLock`], so every trait method works on `&self`.
/// On top of behaving like a server, the mock counts calls per operation,
/// fails operations on request ([`MockApi::fail_next`]) and can hold every
/// read until a test lets it through ([`MockApi::with_gate`]).
///
/// # Examples
///
/// ```
/// use lisu_api::LisuApi;
/// use lisu_api::backend::{Call, MockApi};
/// use lisu_api::models::{MangaDetail, MangaKey, MangaState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = MockApi::default().with_manga(MangaDetail::new("p", "m"));
/// let key = MangaKey::new("p", "m");
///
/// api.add_manga_to_library(&key).await?;
/// assert_eq!(api.get_manga(&key).await?.state, MangaState::RemoteInLibrary);
/// assert_eq!(api.calls(Call::GetManga), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockApi {
    name: String,
    state: RwLock<State>,
    calls: Mutex<HashMap<Call, usize>>,
    failures: Mutex<HashMap<Call, VecDeque<ErrorKind>>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockApi {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.state.get_mut().providers.push(provider);
        self
    }

    pub fn with_manga(mut self, detail: MangaDetail) -> Self {
        self.state.get_mut().mangas.insert(detail.key(), detail);
        self
    }

    /// List `keys`, in order, on a board of `provider_id`.
    pub fn with_board(mut self, provider_id: &str, board: BoardId, keys: impl IntoIterator<Item = MangaKey>) -> Self {
        let listing = self.state.get_mut().boards.entry((provider_id.to_string(), board)).or_default();
        listing.extend(keys);
        self
    }

    /// Subscribe `keys`, in order. Panics when a manga is unknown: add it with
    /// [`MockApi::with_manga`] first.
    pub fn with_library(mut self, keys: impl IntoIterator<Item = MangaKey>) -> Self {
        let state = self.state.get_mut();
        for key in keys {
            assert!(state.mangas.contains_key(&key), "MockApi::with_library: unknown manga {key}");
            if !state.library.contains(&key) {
                state.library.push(key);
            }
        }
        self
    }

    pub fn with_download(mut self, task: DownloadTask) -> Self {
        self.state.get_mut().downloads.push(task);
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.state.get_mut().page_size = size;
        self
    }

    /// Every read waits for one permit of `gate` and consumes it.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// How many times `call` was made, failed ones included.
    pub fn calls(&self, call: Call) -> usize {
        let calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
        calls.get(&call).copied().unwrap_or(0)
    }

    /// Fail the next `call` with `kind`. Queued failures are used in order.
    pub fn fail_next(&self, call: Call, kind: ErrorKind) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.entry(call).or_default().push_back(kind);
    }

    /// Library keys in subscription order.
    pub async fn library(&self) -> Vec<MangaKey> {
        self.state.read().await.library.clone()
    }

    pub async fn manga(&self, key: &MangaKey) -> Option<MangaDetail> {
        self.state.read().await.detail(key)
    }

    pub async fn downloads(&self) -> Vec<DownloadTask> {
        self.state.read().await.downloads.clone()
    }

    async fn enter(&self, call: Call) -> Result<()> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner).entry(call).or_default() += 1;
        if call.is_read()
            && let Some(gate) = &self.gate
        {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => exn::bail!(ErrorKind::Network),
            }
        }
        let failure = {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            failures.get_mut(&call).and_then(VecDeque::pop_front)
        };
        match failure {
            Some(kind) => Err(exn::Exn::from(kind)),
            None => Ok(()),
        }
    }
}
impl Default for MockApi {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            state: RwLock::new(State { page_size: DEFAULT_PAGE_SIZE, ..State::default() }),
            calls: Mutex::default(),
            failures: Mutex::default(),
            gate: None,
        }
    }
}

#[async_trait]
impl LisuApi for MockApi {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_providers(&self) -> Result<Vec<Provider>> {
        self.enter(Call::ListProviders).await?;
        Ok(self.state.read().await.providers.clone())
    }

    async fn get_manga(&self, key: &MangaKey) -> Result<MangaDetail> {
        self.enter(Call::GetManga).await?;
        match self.state.read().await.detail(key) {
            Some(detail) => Ok(detail),
            None => exn::bail!(ErrorKind::not_found(format!("manga {key}"))),
        }
    }

    async fn get_board(&self, query: &BoardQuery, page: u32) -> Result<Vec<Manga>> {
        self.enter(Call::GetBoard).await?;
        let state = self.state.read().await;
        let keys = state.boards.get(&(query.provider_id.clone(), query.board)).into_iter().flatten();
        state.page(keys, query.keywords.as_deref(), page)
    }

    async fn search_library(&self, keywords: &str, page: u32) -> Result<Vec<Manga>> {
        self.enter(Call::SearchLibrary).await?;
        let state = self.state.read().await;
        state.page(state.library.iter(), Some(keywords), page)
    }

    async fn add_manga_to_library(&self, key: &MangaKey) -> Result<Ack> {
        self.enter(Call::AddManga).await?;
        let mut state = self.state.write().await;
        state.existing(key)?;
        if !state.library.contains(key) {
            state.library.push(key.clone());
        }
        Ok(Ack)
    }

    async fn add_mangas_to_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        self.enter(Call::AddMangas).await?;
        let mut state = self.state.write().await;
        for key in keys {
            state.existing(key)?;
        }
        for key in keys {
            if !state.library.contains(key) {
                state.library.push(key.clone());
            }
        }
        Ok(Ack)
    }

    async fn remove_manga_from_library(&self, key: &MangaKey) -> Result<Ack> {
        self.enter(Call::RemoveManga).await?;
        self.state.write().await.library.retain(|k| k != key);
        Ok(Ack)
    }

    async fn remove_mangas_from_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        self.enter(Call::RemoveMangas).await?;
        self.state.write().await.library.retain(|k| !keys.contains(k));
        Ok(Ack)
    }

    async fn update_manga_metadata(&self, key: &MangaKey, metadata: &MangaMetadata) -> Result<Ack> {
        self.enter(Call::UpdateMetadata).await?;
        self.state.write().await.existing(key)?.apply(metadata);
        Ok(Ack)
    }

    async fn update_manga_cover(&self, key: &MangaKey, cover: Vec<u8>, content_type: &str) -> Result<Ack> {
        self.enter(Call::UpdateCover).await?;
        let mut state = self.state.write().await;
        let detail = state.existing(key)?;
        detail.cover = Some(format!("mock://{key}/cover?type={content_type}&size={}", cover.len()));
        Ok(Ack)
    }

    async fn list_download_tasks(&self) -> Result<Vec<DownloadTask>> {
        self.enter(Call::ListDownloads).await?;
        Ok(self.state.read().await.downloads.clone())
    }

    async fn start_download(&self, key: &ChapterKey) -> Result<Ack> {
        self.enter(Call::StartDownload).await?;
        let mut state = self.state.write().await;
        match state.downloads.iter_mut().find(|task| &task.key == key) {
            Some(task) => task.state = DownloadState::Waiting,
            None => state.downloads.push(DownloadTask { key: key.clone(), title: None, state: DownloadState::Waiting }),
        }
        Ok(Ack)
    }

    async fn start_all_downloads(&self) -> Result<Ack> {
        self.enter(Call::StartAllDownloads).await?;
        for task in self.state.write().await.downloads.iter_mut() {
            if matches!(task.state, DownloadState::Failed { .. }) {
                task.state = DownloadState::Waiting;
            }
        }
        Ok(Ack)
    }

    async fn cancel_download(&self, key: &ChapterKey) -> Result<Ack> {
        self.enter(Call::CancelDownload).await?;
        self.state.write().await.downloads.retain(|task| &task.key != key);
        Ok(Ack)
    }

    async fn cancel_all_downloads(&self) -> Result<Ack> {
        self.enter(Call::CancelAllDownloads).await?;
        self.state.write().await.downloads.clear();
        Ok(Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(provider_id: &str, id: &str, title: &str) -> MangaDetail {
        MangaDetail { title: Some(title.to_string()), ..MangaDetail::new(provider_id, id) }
    }

    fn key(id: &str) -> MangaKey {
        MangaKey::new("p", id)
    }

    fn ids(mangas: &[Manga]) -> Vec<&str> {
        mangas.iter().map(|m| m.id.as_str()).collect()
    }

    fn populated() -> MockApi {
        ["a", "b", "c", "d", "e"]
            .into_iter()
            .fold(MockApi::default().with_page_size(2), |api, id| {
                api.with_manga(titled("p", id, &format!("Title {id}")))
            })
            .with_board("p", BoardId::Main, ["a", "b", "c", "d", "e"].map(key))
    }

    #[tokio::test]
    async fn test_board_pages() {
        let api = populated();
        let query = BoardQuery::new("p", BoardId::Main);
        assert_eq!(ids(&api.get_board(&query, 1).await.unwrap()), ["a", "b"]);
        assert_eq!(ids(&api.get_board(&query, 3).await.unwrap()), ["e"]);
        assert!(api.get_board(&query, 4).await.unwrap().is_empty());
        assert!(api.get_board(&BoardQuery::new("p", BoardId::Rank), 1).await.unwrap().is_empty());
        assert_eq!(api.calls(Call::GetBoard), 4);
    }

    #[tokio::test]
    async fn test_page_zero_is_rejected() {
        let api = populated();
        let err = api.search_library("", 0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Status { code: 400, .. }));
    }

    #[tokio::test]
    async fn test_board_keywords_filter_titles() {
        let api = populated().with_manga(titled("p", "c", "Something Else"));
        let query = BoardQuery::new("p", BoardId::Main).with_keywords("title");
        assert_eq!(ids(&api.get_board(&query, 1).await.unwrap()), ["a", "b"]);
        assert_eq!(ids(&api.get_board(&query, 2).await.unwrap()), ["d", "e"]);
    }

    #[tokio::test]
    async fn test_library_membership_drives_state() {
        let api = populated();
        api.add_manga_to_library(&key("b")).await.unwrap();
        api.add_mangas_to_library(&[key("d"), key("b")]).await.unwrap();
        assert_eq!(api.library().await, [key("b"), key("d")]);

        let page = api.get_board(&BoardQuery::new("p", BoardId::Main), 1).await.unwrap();
        assert_eq!(page[0].state, MangaState::Remote);
        assert_eq!(page[1].state, MangaState::RemoteInLibrary);

        api.remove_mangas_from_library(&[key("b")]).await.unwrap();
        assert_eq!(ids(&api.search_library("", 1).await.unwrap()), ["d"]);
        assert_eq!(api.get_manga(&key("b")).await.unwrap().state, MangaState::Remote);
    }

    #[tokio::test]
    async fn test_unknown_manga() {
        let api = populated();
        let err = api.get_manga(&key("zzz")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Status { code: 404, .. }));

        let err = api.add_mangas_to_library(&[key("a"), key("zzz")]).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Status { code: 404, .. }));
        assert!(api.library().await.is_empty(), "bulk add is all or nothing");
    }

    #[tokio::test]
    async fn test_metadata_and_cover() {
        let api = populated();
        let metadata = MangaMetadata { title: Some("Renamed".to_string()), ..MangaMetadata::default() };
        api.update_manga_metadata(&key("a"), &metadata).await.unwrap();
        api.update_manga_cover(&key("a"), vec![0; 3], "image/png").await.unwrap();

        let detail = api.manga(&key("a")).await.unwrap();
        assert_eq!(detail.title.as_deref(), Some("Renamed"));
        assert_eq!(detail.cover.as_deref(), Some("mock://p/a/cover?type=image/png&size=3"));
    }

    #[tokio::test]
    async fn test_download_queue() {
        let one = ChapterKey::new("p", "a", "", "1");
        let two = ChapterKey::new("p", "a", "", "2");
        let api = MockApi::default().with_download(DownloadTask {
            key: one.clone(),
            title: None,
            state: DownloadState::Failed { message: "boom".to_string() },
        });

        api.start_download(&two).await.unwrap();
        api.start_all_downloads().await.unwrap();
        let tasks = api.list_download_tasks().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.state == DownloadState::Waiting));

        api.cancel_download(&one).await.unwrap();
        assert_eq!(api.downloads().await.len(), 1);
        api.cancel_all_downloads().await.unwrap();
        assert!(api.downloads().await.is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_injected_in_order() {
        let api = populated();
        api.fail_next(Call::ListProviders, ErrorKind::Timeout);
        api.fail_next(Call::ListProviders, ErrorKind::Network);

        assert!(matches!(&*api.list_providers().await.unwrap_err(), ErrorKind::Timeout));
        assert!(matches!(&*api.list_providers().await.unwrap_err(), ErrorKind::Network));
        assert!(api.list_providers().await.is_ok());
        assert_eq!(api.calls(Call::ListProviders), 3);
        assert_eq!(api.calls(Call::GetManga), 0);
    }

    #[tokio::test]
    async fn test_gate_holds_reads_only() {
        let gate = Arc::new(Semaphore::new(0));
        let api = Arc::new(populated().with_gate(gate.clone()));

        api.add_manga_to_library(&key("a")).await.unwrap();

        let reader = tokio::spawn({
            let api = api.clone();
            async move { api.search_library("", 1).await }
        });
        tokio::task::yield_now().await;
        assert!(!reader.is_finished());

        gate.add_permits(1);
        assert_eq!(ids(&reader.await.unwrap().unwrap()), ["a"]);
        assert_eq!(gate.available_permits(), 0);
    }
}
