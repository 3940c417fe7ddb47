//! Writes, and the fan-out that keeps live caches consistent with them.
//!
//! A write goes to the server first. Only once it is acknowledged is the same
//! change applied to every live cache instance that may hold a copy of the
//! affected entity, by sending it a keyed transform over its action channel.
//! Fan-out is fire-and-forget: instances that are gone or do not hold the
//! entity are skipped.

use crate::LisuRepository;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use lisu_api::models::{
    Ack, ChapterKey, DownloadState, DownloadTask, Manga, MangaDetail, MangaKey, MangaMetadata, MangaState,
};
use std::slice;
use std::sync::Arc;
use tracing::instrument;

impl LisuRepository {
    #[instrument(skip_all, fields(manga = %key))]
    pub async fn add_manga_to_library(&self, key: &MangaKey) -> Result<Ack> {
        let ack = self.api()?.add_manga_to_library(key).await.or_raise(|| ErrorKind::Api)?;
        self.added_to_library(slice::from_ref(key)).await;
        Ok(ack)
    }

    #[instrument(skip_all, fields(count = keys.len()))]
    pub async fn add_mangas_to_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        let ack = self.api()?.add_mangas_to_library(keys).await.or_raise(|| ErrorKind::Api)?;
        self.added_to_library(keys).await;
        Ok(ack)
    }

    #[instrument(skip_all, fields(manga = %key))]
    pub async fn remove_manga_from_library(&self, key: &MangaKey) -> Result<Ack> {
        let ack = self.api()?.remove_manga_from_library(key).await.or_raise(|| ErrorKind::Api)?;
        self.removed_from_library(slice::from_ref(key)).await;
        Ok(ack)
    }

    #[instrument(skip_all, fields(count = keys.len()))]
    pub async fn remove_mangas_from_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        let ack = self.api()?.remove_mangas_from_library(keys).await.or_raise(|| ErrorKind::Api)?;
        self.removed_from_library(keys).await;
        Ok(ack)
    }

    #[instrument(skip_all, fields(manga = %key))]
    pub async fn update_manga_metadata(&self, key: &MangaKey, metadata: MangaMetadata) -> Result<Ack> {
        let ack = self.api()?.update_manga_metadata(key, &metadata).await.or_raise(|| ErrorKind::Api)?;
        let metadata = Arc::new(metadata);
        self.patch_details(key, {
            let metadata = Arc::clone(&metadata);
            move |detail: &mut MangaDetail| detail.apply(&metadata)
        })
        .await;
        self.patch_listings(slice::from_ref(key), move |manga| manga.apply(&metadata)).await;
        Ok(ack)
    }

    /// Replace the cover image. The detail cache reloads, as only the server
    /// knows the new cover address.
    #[instrument(skip_all, fields(manga = %key, size = cover.len()))]
    pub async fn update_manga_cover(&self, key: &MangaKey, cover: Vec<u8>, content_type: &str) -> Result<Ack> {
        let ack = self.api()?.update_manga_cover(key, cover, content_type).await.or_raise(|| ErrorKind::Api)?;
        self.inner
            .details
            .for_each(|cached, handle| {
                if cached == key {
                    handle.reload();
                }
            })
            .await;
        Ok(ack)
    }

    #[instrument(skip_all, fields(chapter = %key))]
    pub async fn start_download(&self, key: &ChapterKey) -> Result<Ack> {
        let ack = self.api()?.start_download(key).await.or_raise(|| ErrorKind::Api)?;
        let key = key.clone();
        self.patch_downloads(move |tasks| {
            if let Some(task) = tasks.iter_mut().find(|task| task.key == key) {
                task.state = DownloadState::Waiting;
            }
        })
        .await;
        Ok(ack)
    }

    #[instrument(skip(self))]
    pub async fn start_all_downloads(&self) -> Result<Ack> {
        let ack = self.api()?.start_all_downloads().await.or_raise(|| ErrorKind::Api)?;
        self.patch_downloads(|tasks| {
            for task in tasks.iter_mut().filter(|task| matches!(task.state, DownloadState::Failed { .. })) {
                task.state = DownloadState::Waiting;
            }
        })
        .await;
        Ok(ack)
    }

    #[instrument(skip_all, fields(chapter = %key))]
    pub async fn cancel_download(&self, key: &ChapterKey) -> Result<Ack> {
        let ack = self.api()?.cancel_download(key).await.or_raise(|| ErrorKind::Api)?;
        let key = key.clone();
        self.patch_downloads(move |tasks| tasks.retain(|task| task.key != key)).await;
        Ok(ack)
    }

    #[instrument(skip(self))]
    pub async fn cancel_all_downloads(&self) -> Result<Ack> {
        let ack = self.api()?.cancel_all_downloads().await.or_raise(|| ErrorKind::Api)?;
        self.patch_downloads(|tasks| tasks.clear()).await;
        Ok(ack)
    }

    // =========================================================================
    // Fan-out
    // =========================================================================

    async fn added_to_library(&self, keys: &[MangaKey]) {
        tracing::debug!(count = keys.len(), "Fanning out library additions");
        self.set_states(keys, MangaState::Remote, MangaState::RemoteInLibrary).await;
        // A library listing cannot place new entries from keys alone.
        self.inner.library.for_each(|(), handle| handle.reload()).await;
    }

    async fn removed_from_library(&self, keys: &[MangaKey]) {
        tracing::debug!(count = keys.len(), "Fanning out library removals");
        self.set_states(keys, MangaState::RemoteInLibrary, MangaState::Remote).await;
        let keys: Arc<[MangaKey]> = keys.into();
        self.inner
            .library
            .for_each(|(), handle| {
                let keys = Arc::clone(&keys);
                handle.mutate(move |mangas| {
                    let before = mangas.len();
                    mangas.retain(|manga| !keys.iter().any(|key| manga.is(key)));
                    mangas.len() != before
                });
            })
            .await;
    }

    /// Move details and board entries of `keys` from state `from` to `to`.
    async fn set_states(&self, keys: &[MangaKey], from: MangaState, to: MangaState) {
        let shift = move |state: &mut MangaState| {
            if *state == from {
                *state = to;
            }
        };
        for key in keys {
            self.patch_details(key, move |detail| shift(&mut detail.state)).await;
        }
        self.patch_boards(keys, move |manga| shift(&mut manga.state)).await;
    }

    /// Patch the detail caches subscribed to exactly `key`.
    async fn patch_details(&self, key: &MangaKey, patch: impl Fn(&mut MangaDetail) + Clone + Send + 'static) {
        self.inner
            .details
            .for_each(|cached, handle| {
                if cached == key {
                    handle.mutate(patch.clone());
                }
            })
            .await;
    }

    /// Patch entries of `keys` in board listings.
    ///
    /// A board is only looked at when its first entry comes from a provider
    /// of `keys`, so listings of unrelated providers are never scanned.
    async fn patch_boards(&self, keys: &[MangaKey], patch: impl Fn(&mut Manga) + Clone + Send + 'static) {
        let keys: Arc<[MangaKey]> = keys.into();
        self.inner
            .boards
            .for_each(|(), handle| {
                let keys = Arc::clone(&keys);
                let patch = patch.clone();
                handle.mutate(move |mangas| {
                    let Some(first) = mangas.first() else { return false };
                    if !keys.iter().any(|key| key.provider_id == first.provider_id) {
                        return false;
                    }
                    patch_matching(mangas, &keys, patch)
                });
            })
            .await;
    }

    /// Patch entries of `keys` in board and library listings.
    async fn patch_listings(&self, keys: &[MangaKey], patch: impl Fn(&mut Manga) + Clone + Send + 'static) {
        self.patch_boards(keys, patch.clone()).await;
        let keys: Arc<[MangaKey]> = keys.into();
        self.inner
            .library
            .for_each(|(), handle| {
                let keys = Arc::clone(&keys);
                let patch = patch.clone();
                handle.mutate(move |mangas| patch_matching(mangas, &keys, patch));
            })
            .await;
    }

    /// Patch every live download queue.
    async fn patch_downloads(&self, patch: impl Fn(&mut Vec<DownloadTask>) + Clone + Send + 'static) {
        self.inner.downloads.for_each(|(), handle| handle.mutate(patch.clone())).await;
    }
}

/// Apply `patch` to the entries of `keys`. Returns whether any entry matched.
fn patch_matching(mangas: &mut [Manga], keys: &[MangaKey], patch: impl Fn(&mut Manga)) -> bool {
    let mut matched = false;
    for manga in mangas.iter_mut().filter(|manga| keys.iter().any(|key| manga.is(key))) {
        patch(manga);
        matched = true;
    }
    matched
}
