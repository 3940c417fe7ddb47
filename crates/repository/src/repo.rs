//! The facade: one reactive backend, one cache instance per subscription.

use crate::bind::{registered, switch_latest};
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use futures::Stream;
use lisu_api::backend::{DEFAULT_TIMEOUT, HttpApi};
use lisu_api::models::{BoardFilters, BoardId, BoardQuery, DownloadTask, Manga, MangaDetail, MangaKey, Provider};
use lisu_api::ApiHandle;
use lisu_remote::error::ErrorKind as RemoteErrorKind;
use lisu_remote::{
    ChannelRegistry, ConnectivitySignal, DEFAULT_RETRY_DEBOUNCE, DataHandle, ListHandle, Page, RemoteData, RemoteList,
    remote_data, remote_list,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Pages are numbered from one.
pub const FIRST_PAGE: u32 = 1;

/// Knobs of a [`LisuRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOptions {
    /// Per-request timeout of HTTP backends built by [`LisuRepository::set_base_url`].
    pub timeout: Duration,
    /// Delay between a connectivity change and the retry of failed loads.
    pub retry_debounce: Duration,
}
impl Default for RepositoryOptions {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, retry_debounce: DEFAULT_RETRY_DEBOUNCE }
    }
}

pub(crate) type DetailRegistry = ChannelRegistry<DataHandle<MangaDetail>, MangaKey>;
pub(crate) type ListRegistry = ChannelRegistry<ListHandle<Manga>>;
pub(crate) type DownloadRegistry = ChannelRegistry<DataHandle<Vec<DownloadTask>>>;

pub(crate) struct Inner {
    pub(crate) api: watch::Sender<Option<ApiHandle>>,
    pub(crate) signal: ConnectivitySignal,
    pub(crate) options: RepositoryOptions,
    pub(crate) details: Arc<DetailRegistry>,
    pub(crate) boards: Arc<ListRegistry>,
    pub(crate) library: Arc<ListRegistry>,
    pub(crate) downloads: Arc<DownloadRegistry>,
}

/// Entry point to a Lisu server.
///
/// Reads are cold streams of cache snapshots ([`RemoteData`] or
/// [`RemoteList`]): each subscription gets its own cache instance, rebuilt
/// from scratch whenever the backend changes. Writes go straight to the
/// server and, once it acknowledges them, patch every live cache instance
/// holding a copy of the affected entity.
///
/// Cloning is cheap; clones share the backend and the live instances.
///
/// # Examples
///
/// ```no_run
/// use futures::StreamExt;
/// use lisu_api::models::MangaKey;
/// use lisu_remote::ConnectivitySignal;
/// use lisu_repository::{LisuRepository, RepositoryOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let repo = LisuRepository::new(ConnectivitySignal::never(), RepositoryOptions::default());
/// repo.set_base_url("http://192.168.1.20:8080")?;
///
/// let key = MangaKey::new("manhuagui", "1234");
/// let mut detail = std::pin::pin!(repo.manga(key.clone()));
/// while let Some(snapshot) = detail.next().await {
///     if let Some(manga) = snapshot.ok() {
///         println!("{}", manga.title.as_deref().unwrap_or("?"));
///         break;
///     }
/// }
/// repo.add_manga_to_library(&key).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LisuRepository {
    pub(crate) inner: Arc<Inner>,
}

impl LisuRepository {
    pub fn new(connectivity: ConnectivitySignal, options: RepositoryOptions) -> Self {
        let (api, _) = watch::channel(None);
        let signal = connectivity.with_debounce(options.retry_debounce);
        Self {
            inner: Arc::new(Inner {
                api,
                signal,
                options,
                details: Arc::default(),
                boards: Arc::default(),
                library: Arc::default(),
                downloads: Arc::default(),
            }),
        }
    }

    // =========================================================================
    // Backend
    // =========================================================================

    /// Point the repository at the server at `base_url`.
    ///
    /// Every live subscription drops its cache instance and starts over
    /// against the new server.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidUrl`] if `base_url` is not an http(s)
    /// address. The current backend is kept in that case.
    pub fn set_base_url(&self, base_url: &str) -> Result<()> {
        let api = HttpApi::new(base_url, self.inner.options.timeout).or_raise(|| ErrorKind::InvalidUrl)?;
        tracing::info!(base_url = %api.base_url(), "Connecting to server");
        self.set_api(Arc::new(api));
        Ok(())
    }

    /// Replace the backend with any [`LisuApi`](lisu_api::LisuApi) implementation.
    pub fn set_api(&self, api: ApiHandle) {
        self.inner.api.send_replace(Some(api));
    }

    /// Disconnect. Subscriptions go quiet and writes fail until a backend is set again.
    pub fn clear_api(&self) {
        tracing::info!("Disconnecting from server");
        self.inner.api.send_replace(None);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.api.borrow().is_some()
    }

    pub(crate) fn api(&self) -> Result<ApiHandle> {
        self.inner.api.borrow().clone().ok_or_raise(|| ErrorKind::NotConnected)
    }

    // =========================================================================
    // Resources
    // =========================================================================

    /// Providers known to the server.
    pub fn providers(&self) -> impl Stream<Item = RemoteData<Vec<Provider>>> + Send + 'static {
        let signal = self.inner.signal.clone();
        switch_latest(self.inner.api.subscribe(), move |api: ApiHandle| {
            remote_data(signal.clone(), move || {
                let api = Arc::clone(&api);
                async move { api.list_providers().await.or_raise(|| RemoteErrorKind::Load) }
            })
        })
    }

    /// Detail of one manga. Patched in place by library and metadata writes.
    pub fn manga(&self, key: MangaKey) -> impl Stream<Item = RemoteData<MangaDetail>> + Send + 'static {
        let signal = self.inner.signal.clone();
        let registry = Arc::clone(&self.inner.details);
        switch_latest(self.inner.api.subscribe(), move |api: ApiHandle| {
            let load_key = key.clone();
            let snapshots = remote_data(signal.clone(), move || {
                let api = Arc::clone(&api);
                let key = load_key.clone();
                async move { api.get_manga(&key).await.or_raise(|| RemoteErrorKind::Load) }
            });
            registered(snapshots, Arc::clone(&registry), key.clone())
        })
    }

    /// Paged listing of a provider board.
    pub fn board(
        &self,
        provider_id: &str,
        board: BoardId,
        filters: BoardFilters,
        keywords: Option<&str>,
    ) -> impl Stream<Item = RemoteList<Manga>> + Send + 'static {
        let mut query = BoardQuery::new(provider_id, board).with_filters(filters);
        if let Some(keywords) = keywords {
            query = query.with_keywords(keywords);
        }
        let signal = self.inner.signal.clone();
        let registry = Arc::clone(&self.inner.boards);
        switch_latest(self.inner.api.subscribe(), move |api: ApiHandle| {
            let query = query.clone();
            let snapshots = remote_list(signal.clone(), FIRST_PAGE, move |page| {
                let api = Arc::clone(&api);
                let query = query.clone();
                async move {
                    api.get_board(&query, page)
                        .await
                        .map(|data| numbered(data, page))
                        .or_raise(|| RemoteErrorKind::Load)
                }
            });
            registered(snapshots, Arc::clone(&registry), ())
        })
    }

    /// Paged search of the library. Blank keywords list the whole library.
    pub fn library(&self, keywords: &str) -> impl Stream<Item = RemoteList<Manga>> + Send + 'static {
        let keywords = keywords.trim().to_string();
        let signal = self.inner.signal.clone();
        let registry = Arc::clone(&self.inner.library);
        switch_latest(self.inner.api.subscribe(), move |api: ApiHandle| {
            let keywords = keywords.clone();
            let snapshots = remote_list(signal.clone(), FIRST_PAGE, move |page| {
                let api = Arc::clone(&api);
                let keywords = keywords.clone();
                async move {
                    api.search_library(&keywords, page)
                        .await
                        .map(|data| numbered(data, page))
                        .or_raise(|| RemoteErrorKind::Load)
                }
            });
            registered(snapshots, Arc::clone(&registry), ())
        })
    }

    /// Download queue of the server. Reload to observe progress.
    pub fn download_tasks(&self) -> impl Stream<Item = RemoteData<Vec<DownloadTask>>> + Send + 'static {
        let signal = self.inner.signal.clone();
        let registry = Arc::clone(&self.inner.downloads);
        switch_latest(self.inner.api.subscribe(), move |api: ApiHandle| {
            let snapshots = remote_data(signal.clone(), move || {
                let api = Arc::clone(&api);
                async move { api.list_download_tasks().await.or_raise(|| RemoteErrorKind::Load) }
            });
            registered(snapshots, Arc::clone(&registry), ())
        })
    }
}

/// An empty page marks the end of a listing.
fn numbered<T>(data: Vec<T>, page: u32) -> Page<u32, T> {
    let next_key = (!data.is_empty()).then(|| page + 1);
    Page::new(data, next_key)
}
