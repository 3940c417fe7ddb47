use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// One of the listings a provider exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardId {
    Main,
    Rank,
    Search,
}
impl BoardId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Rank => "rank",
            Self::Search => "search",
        }
    }
}
impl FromStr for BoardId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "main" | "latest" => Self::Main,
            "rank" | "popular" => Self::Rank,
            "search" => Self::Search,
            _ => exn::bail!(ErrorKind::Parse { field: "board", value: s.to_string() }),
        })
    }
}
impl Display for BoardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// A manga source known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub id: String,
    pub lang: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub boards: Vec<BoardId>,
    #[serde(default)]
    pub is_logged: Option<bool>,
}

/// Filter selections of a board, by filter name.
///
/// Ordered, so that the same selections always produce the same query string
/// (and the same cache key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardFilters(BTreeMap<String, i32>);
impl BoardFilters {
    pub fn with(mut self, name: impl Into<String>, value: i32) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything that identifies one board listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardQuery {
    pub provider_id: String,
    pub board: BoardId,
    pub filters: BoardFilters,
    pub keywords: Option<String>,
}
impl BoardQuery {
    pub fn new(provider_id: impl Into<String>, board: BoardId) -> Self {
        Self { provider_id: provider_id.into(), board, filters: BoardFilters::default(), keywords: None }
    }

    pub fn with_filters(mut self, filters: BoardFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Blank keywords are treated as no keywords.
    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        let keywords = keywords.into();
        self.keywords = (!keywords.trim().is_empty()).then_some(keywords);
        self
    }
}
