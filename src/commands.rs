//! Execution of parsed commands against a [`LisuRepository`].

use crate::cli::{Cli, Command, DownloadsCommand, LibraryCommand, MangaRefs, Pages};
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use futures::{Stream, StreamExt};
use lisu_api::models::{BoardFilters, DownloadState, DownloadTask, Manga, MangaKey};
use lisu_config::Config;
use lisu_remote::{ConnectivitySignal, LoadError, RemoteData, RemoteList};
use lisu_repository::{LisuRepository, RepositoryOptions};
use std::pin::pin;
use std::sync::Arc;

pub async fn run(cli: Cli, config: Config) -> Result<()> {
    let options =
        RepositoryOptions { timeout: config.server.timeout(), retry_debounce: config.remote.retry_debounce() };
    let repo = LisuRepository::new(ConnectivitySignal::never(), options);
    let base_url = cli.server.or(config.server.base_url).ok_or_raise(|| ErrorKind::NoServer)?;
    repo.set_base_url(&base_url).or_raise(|| ErrorKind::Server)?;

    match cli.command {
        Command::Providers => {
            for provider in loaded("providers", repo.providers()).await? {
                let boards: Vec<&str> = provider.boards.iter().map(|b| b.as_str()).collect();
                println!("{}\t{}\t{}", provider.id, provider.lang, boards.join(","));
            }
        },
        Command::Manga { provider, manga } => {
            let detail = loaded("manga", repo.manga(MangaKey::new(provider, manga))).await?;
            println!("{}  [{:?}]", detail.title.as_deref().unwrap_or(&detail.id), detail.state);
            if !detail.authors.is_empty() {
                println!("by {}", detail.authors.join(", "));
            }
            if let Some(description) = &detail.description {
                println!("\n{description}\n");
            }
            for collection in &detail.collections {
                let name = if collection.id.is_empty() { "(default)" } else { &collection.id };
                println!("{name}: {} chapters", collection.chapters.len());
            }
        },
        Command::Board { provider, board, keyword, filters, pages } => {
            let filters = filters.into_iter().fold(BoardFilters::default(), |acc, (name, value)| acc.with(name, value));
            let stream = repo.board(&provider, board, filters, keyword.as_deref());
            print_mangas(&paged("board", stream, &pages).await?);
        },
        Command::Library(LibraryCommand::Search { keywords, pages }) => {
            let stream = repo.library(keywords.as_deref().unwrap_or_default());
            print_mangas(&paged("library", stream, &pages).await?);
        },
        Command::Library(LibraryCommand::Add(refs)) => {
            add_or_remove(&repo, &refs, true).await?;
        },
        Command::Library(LibraryCommand::Remove(refs)) => {
            add_or_remove(&repo, &refs, false).await?;
        },
        Command::Downloads(DownloadsCommand::List) => {
            for task in loaded("download tasks", repo.download_tasks()).await? {
                print_task(&task);
            }
        },
        Command::Downloads(DownloadsCommand::Start(chapter)) => {
            repo.start_download(&chapter.key()).await.or_raise(|| ErrorKind::Request)?;
        },
        Command::Downloads(DownloadsCommand::StartAll) => {
            repo.start_all_downloads().await.or_raise(|| ErrorKind::Request)?;
        },
        Command::Downloads(DownloadsCommand::Cancel(chapter)) => {
            repo.cancel_download(&chapter.key()).await.or_raise(|| ErrorKind::Request)?;
        },
        Command::Downloads(DownloadsCommand::CancelAll) => {
            repo.cancel_all_downloads().await.or_raise(|| ErrorKind::Request)?;
        },
    }
    Ok(())
}

async fn add_or_remove(repo: &LisuRepository, refs: &MangaRefs, add: bool) -> Result<()> {
    let keys = refs.keys();
    let result = match (add, keys.as_slice()) {
        (true, [key]) => repo.add_manga_to_library(key).await,
        (true, keys) => repo.add_mangas_to_library(keys).await,
        (false, [key]) => repo.remove_manga_from_library(key).await,
        (false, keys) => repo.remove_mangas_from_library(keys).await,
    };
    result.or_raise(|| ErrorKind::Request)?;
    Ok(())
}

/// First settled value of a one-shot resource.
async fn loaded<T: Clone>(what: &'static str, stream: impl Stream<Item = RemoteData<T>>) -> Result<T> {
    let mut stream = pin!(stream);
    while let Some(snapshot) = stream.next().await {
        match snapshot.value() {
            None => continue,
            Some(Ok(value)) => return Ok(value.clone()),
            Some(Err(err)) => return Err(load_failure(what, err)),
        }
    }
    exn::bail!(ErrorKind::Request)
}

/// Up to `pages` pages of a listing, stopping early once it is exhausted.
async fn paged(
    what: &'static str,
    stream: impl Stream<Item = RemoteList<Manga>>,
    pages: &Pages,
) -> Result<Arc<Vec<Manga>>> {
    let mut stream = pin!(stream);
    let mut count = 0;
    while let Some(snapshot) = stream.next().await {
        match snapshot.append_state() {
            None => continue,
            Some(Err(err)) => return Err(load_failure(what, err)),
            Some(Ok(())) => {
                count += 1;
                tracing::debug!(page = count, items = snapshot.items().len(), "Page loaded");
                if count >= pages.pages || snapshot.is_exhausted() {
                    return Ok(snapshot.shared_items());
                }
                snapshot.request_next_page();
            },
        }
    }
    exn::bail!(ErrorKind::Request)
}

fn load_failure(what: &'static str, err: &LoadError) -> crate::error::Error {
    tracing::warn!(what, "Load failed");
    exn::Exn::from(ErrorKind::Load { what, cause: Arc::clone(err) })
}

fn print_mangas(mangas: &[Manga]) {
    for manga in mangas {
        println!("{}\t{}\t{:?}", manga.key(), manga.title_or_id(), manga.state);
    }
}

fn print_task(task: &DownloadTask) {
    let state = match &task.state {
        DownloadState::Waiting => "waiting".to_string(),
        DownloadState::Downloading { downloaded, total } => format!("downloading {downloaded}/{total}"),
        DownloadState::Failed { message } => format!("failed: {message}"),
    };
    println!("{}\t{}\t{state}", task.key, task.title.as_deref().unwrap_or("-"));
}
