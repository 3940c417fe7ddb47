//! HTTP backend for a Lisu server.
//!
//! A client is bound to exactly one base address for its whole life. When the
//! address changes, build a new [`HttpApi`] instead of mutating this one;
//! requests still in flight on the old client simply finish (or fail) on
//! their own.

use crate::LisuApi;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Ack, BoardQuery, ChapterKey, DownloadTask, Manga, MangaDetail, MangaKey, MangaMetadata, Provider,
};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Requests that take longer than this are abandoned as timed out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Lisu server reached over HTTP(S).
///
/// # Examples
///
/// ```no_run
/// use lisu_api::LisuApi;
/// use lisu_api::backend::HttpApi;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = HttpApi::new("http://192.168.1.20:8080", Duration::from_secs(10))?;
/// for provider in api.list_providers().await? {
///     println!("{} ({})", provider.id, provider.lang);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpApi {
    base: Url,
    client: Client,
}

impl HttpApi {
    /// Create a client for the server at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidUrl`] unless `base_url` is an absolute
    /// `http` or `https` address.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> Result<Self> {
        let raw = base_url.as_ref().trim();
        let base = Url::parse(raw).or_raise(|| ErrorKind::InvalidUrl(raw.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidUrl(raw.to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lisu/", env!("CARGO_PKG_VERSION")))
            .build()
            .or_raise(|| ErrorKind::Network)?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base address joined with percent-encoded path segments.
    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .ok()
            .ok_or_raise(|| ErrorKind::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn manga_url(&self, key: &MangaKey, rest: &[&str]) -> Result<Url> {
        let head = ["provider", key.provider_id.as_str(), "manga", key.manga_id.as_str()];
        self.url(head.into_iter().chain(rest.iter().copied()))
    }

    fn chapter_url(&self, action: &str, key: &ChapterKey) -> Result<Url> {
        self.url([
            "download",
            action,
            key.provider_id.as_str(),
            key.manga_id.as_str(),
            key.collection_id.as_str(),
            key.chapter_id.as_str(),
        ])
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = if e.is_timeout() { ErrorKind::Timeout } else { ErrorKind::Network };
                return Err(e).or_raise(|| kind);
            },
        };
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::debug!(status = status.as_u16(), message, "Server rejected request");
            exn::bail!(ErrorKind::Status { code: status.as_u16(), message });
        }
        Ok(response)
    }

    async fn fetch<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let body = Self::send(request).await?.bytes().await.or_raise(|| ErrorKind::Network)?;
        serde_json::from_slice(&body).or_raise(|| ErrorKind::Decode)
    }

    async fn write(request: RequestBuilder) -> Result<Ack> {
        Self::send(request).await?;
        Ok(Ack)
    }
}

#[async_trait]
impl LisuApi for HttpApi {
    fn name(&self) -> &str {
        self.base.as_str()
    }

    #[instrument(level = "debug", skip(self))]
    async fn list_providers(&self) -> Result<Vec<Provider>> {
        Self::fetch(self.client.get(self.url(["provider"])?)).await
    }

    #[instrument(level = "debug", skip(self), fields(manga = %key))]
    async fn get_manga(&self, key: &MangaKey) -> Result<MangaDetail> {
        Self::fetch(self.client.get(self.manga_url(key, &[])?)).await
    }

    #[instrument(level = "debug", skip(self, query), fields(provider = query.provider_id, board = %query.board))]
    async fn get_board(&self, query: &BoardQuery, page: u32) -> Result<Vec<Manga>> {
        let url = self.url(["provider", query.provider_id.as_str(), "board", query.board.as_str()])?;
        let mut params: Vec<(&str, String)> = vec![("page", page.to_string())];
        if let Some(keywords) = &query.keywords {
            params.push(("keywords", keywords.clone()));
        }
        params.extend(query.filters.iter().map(|(name, value)| (name, value.to_string())));
        Self::fetch(self.client.get(url).query(&params)).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn search_library(&self, keywords: &str, page: u32) -> Result<Vec<Manga>> {
        let url = self.url(["library", "search"])?;
        let page = page.to_string();
        Self::fetch(self.client.get(url).query(&[("keywords", keywords), ("page", page.as_str())])).await
    }

    async fn add_manga_to_library(&self, key: &MangaKey) -> Result<Ack> {
        let url = self.url(["library", "manga", key.provider_id.as_str(), key.manga_id.as_str()])?;
        Self::write(self.client.post(url)).await
    }

    async fn add_mangas_to_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        Self::write(self.client.post(self.url(["library", "manga-add"])?).json(keys)).await
    }

    async fn remove_manga_from_library(&self, key: &MangaKey) -> Result<Ack> {
        let url = self.url(["library", "manga", key.provider_id.as_str(), key.manga_id.as_str()])?;
        Self::write(self.client.delete(url)).await
    }

    async fn remove_mangas_from_library(&self, keys: &[MangaKey]) -> Result<Ack> {
        Self::write(self.client.post(self.url(["library", "manga-delete"])?).json(keys)).await
    }

    async fn update_manga_metadata(&self, key: &MangaKey, metadata: &MangaMetadata) -> Result<Ack> {
        Self::write(self.client.put(self.manga_url(key, &["metadata"])?).json(metadata)).await
    }

    async fn update_manga_cover(&self, key: &MangaKey, cover: Vec<u8>, content_type: &str) -> Result<Ack> {
        let request = self.client.put(self.manga_url(key, &["cover"])?).header(CONTENT_TYPE, content_type).body(cover);
        Self::write(request).await
    }

    async fn list_download_tasks(&self) -> Result<Vec<DownloadTask>> {
        Self::fetch(self.client.get(self.url(["download", "list"])?)).await
    }

    async fn start_download(&self, key: &ChapterKey) -> Result<Ack> {
        Self::write(self.client.post(self.chapter_url("start", key)?)).await
    }

    async fn start_all_downloads(&self) -> Result<Ack> {
        Self::write(self.client.post(self.url(["download", "start-all"])?)).await
    }

    async fn cancel_download(&self, key: &ChapterKey) -> Result<Ack> {
        Self::write(self.client.post(self.chapter_url("cancel", key)?)).await
    }

    async fn cancel_all_downloads(&self) -> Result<Ack> {
        Self::write(self.client.post(self.url(["download", "cancel-all"])?)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn api(base: &str) -> HttpApi {
        HttpApi::new(base, DEFAULT_TIMEOUT).unwrap()
    }

    #[rstest]
    #[case("http://localhost:8080", "http://localhost:8080/provider")]
    #[case("http://localhost:8080/", "http://localhost:8080/provider")]
    #[case("https://example.com/lisu", "https://example.com/lisu/provider")]
    #[case("https://example.com/lisu/", "https://example.com/lisu/provider")]
    fn test_url_joins_base(#[case] base: &str, #[case] expected: &str) {
        assert_eq!(api(base).url(["provider"]).unwrap().as_str(), expected);
    }

    #[test]
    fn test_segments_are_encoded() {
        let key = MangaKey::new("漫画", "a/b c");
        let url = api("http://host").manga_url(&key, &["cover"]).unwrap();
        assert_eq!(url.as_str(), "http://host/provider/%E6%BC%AB%E7%94%BB/manga/a%2Fb%20c/cover");
    }

    #[test]
    fn test_chapter_url() {
        let key = ChapterKey::new("p", "m", "", "c1");
        let url = api("http://host").chapter_url("cancel", &key).unwrap();
        assert_eq!(url.as_str(), "http://host/download/cancel/p/m//c1");
    }

    #[rstest]
    #[case("not a url")]
    #[case("ftp://example.com")]
    #[case("mailto:someone@example.com")]
    #[case("/relative/path")]
    fn test_rejects_unusable_addresses(#[case] base: &str) {
        let err = HttpApi::new(base, DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidUrl(_)));
    }

    #[test]
    fn test_name_is_base_url() {
        assert_eq!(api("http://host:1234").name(), "http://host:1234/");
    }
}
