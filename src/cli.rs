use clap::{Args, Parser, Subcommand};
use lisu_api::models::{BoardId, ChapterKey, MangaKey};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "lisu", version, about = "Browse and manage a Lisu manga server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true, env = "LISU_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server address, overriding the configuration
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the providers of the server
    Providers,
    /// Show one manga
    Manga {
        provider: String,
        manga: String,
    },
    /// List a provider board
    Board {
        provider: String,
        /// main, rank or search
        #[arg(value_parser = parse_board)]
        board: BoardId,
        /// Search keywords
        #[arg(short, long)]
        keyword: Option<String>,
        /// Filter selection, as NAME=VALUE
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, i32)>,
        #[command(flatten)]
        pages: Pages,
    },
    /// Search and edit the library
    #[command(subcommand)]
    Library(LibraryCommand),
    /// Inspect and control the download queue
    #[command(subcommand)]
    Downloads(DownloadsCommand),
}

#[derive(Debug, Subcommand)]
pub enum LibraryCommand {
    /// Search the library (everything when no keywords are given)
    Search {
        keywords: Option<String>,
        #[command(flatten)]
        pages: Pages,
    },
    /// Add mangas of one provider to the library
    Add(MangaRefs),
    /// Remove mangas of one provider from the library
    Remove(MangaRefs),
}

#[derive(Debug, Subcommand)]
pub enum DownloadsCommand {
    /// List download tasks
    List,
    /// Queue (or retry) the download of one chapter
    Start(ChapterRef),
    /// Retry every failed task
    StartAll,
    /// Drop one task
    Cancel(ChapterRef),
    /// Drop every task
    CancelAll,
}

#[derive(Debug, Args)]
pub struct Pages {
    /// Number of pages to load
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,
}

#[derive(Debug, Args)]
pub struct MangaRefs {
    pub provider: String,
    #[arg(required = true)]
    pub mangas: Vec<String>,
}
impl MangaRefs {
    pub fn keys(&self) -> Vec<MangaKey> {
        self.mangas.iter().map(|manga| MangaKey::new(&self.provider, manga)).collect()
    }
}

#[derive(Debug, Args)]
pub struct ChapterRef {
    pub provider: String,
    pub manga: String,
    pub collection: String,
    pub chapter: String,
}
impl ChapterRef {
    pub fn key(&self) -> ChapterKey {
        ChapterKey::new(&self.provider, &self.manga, &self.collection, &self.chapter)
    }
}

fn parse_board(raw: &str) -> Result<BoardId, String> {
    raw.parse().map_err(|_| format!("unknown board `{raw}`, expected main, rank or search"))
}

fn parse_filter(raw: &str) -> Result<(String, i32), String> {
    let (name, value) = raw.split_once('=').ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let value = value.trim().parse().map_err(|_| format!("filter value must be an integer, got `{value}`"))?;
    Ok((name.trim().to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_board_arguments() {
        let cli = Cli::try_parse_from([
            "lisu", "board", "dmzj", "rank", "-f", "genre=3", "--filter", "status=1", "-p", "2",
        ])
        .unwrap();
        let Command::Board { provider, board, keyword, filters, pages } = cli.command else {
            panic!("expected board command");
        };
        assert_eq!(provider, "dmzj");
        assert_eq!(board, BoardId::Rank);
        assert_eq!(keyword, None);
        assert_eq!(filters, [("genre".to_string(), 3), ("status".to_string(), 1)]);
        assert_eq!(pages.pages, 2);
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["lisu", "providers", "-vv", "--server", "http://nas:8080"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.server.as_deref(), Some("http://nas:8080"));
    }

    #[test]
    fn test_library_keys() {
        let cli = Cli::try_parse_from(["lisu", "library", "add", "dmzj", "1", "2"]).unwrap();
        let Command::Library(LibraryCommand::Add(refs)) = cli.command else {
            panic!("expected library add");
        };
        assert_eq!(refs.keys(), [MangaKey::new("dmzj", "1"), MangaKey::new("dmzj", "2")]);
    }

    #[rstest]
    #[case(&["lisu", "library", "remove", "dmzj"])]
    #[case(&["lisu", "board", "dmzj", "nope"])]
    #[case(&["lisu", "board", "dmzj", "main", "-f", "genre"])]
    #[case(&["lisu", "board", "dmzj", "main", "-f", "genre=x"])]
    #[case(&["lisu", "library", "search", "--pages", "0"])]
    fn test_rejected_arguments(#[case] args: &[&str]) {
        assert!(Cli::try_parse_from(args).is_err());
    }
}
