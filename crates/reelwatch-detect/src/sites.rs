use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Embedded site database.
const EMBEDDED_DB: &str = include_str!("../data/sites.toml");

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("invalid site database: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read site database: {0}")]
    Io(#[from] std::io::Error),
}

/// Definition of a streaming site and how to recognize playback on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteDef {
    /// Display name (e.g., "LookMovie").
    pub name: String,
    /// Substring that must appear in the URL.
    pub host: String,
    /// Substring identifying the movie playback page.
    pub movie_path: String,
    /// Substring identifying the show playback page.
    pub show_path: String,
    /// XPath of the node holding the title on a playback page.
    pub title_xpath: String,
    /// Whether this site is enabled for detection.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Wrapper for TOML deserialization.
#[derive(Debug, Deserialize)]
struct SiteDbFile {
    #[serde(rename = "site")]
    sites: Vec<SiteDef>,
}

/// What kind of playback page a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Movie,
    Show,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Show => write!(f, "show"),
        }
    }
}

/// A qualifying URL match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteMatch {
    /// Index of the matching site in the database.
    pub index: usize,
    pub kind: ContentKind,
}

/// Database of watched streaming sites.
#[derive(Debug, Clone)]
pub struct SiteDatabase {
    sites: Vec<SiteDef>,
}

impl SiteDatabase {
    /// Load the embedded site database.
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED_DB).expect("embedded sites.toml should be valid")
    }

    /// Load a site database from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SiteError> {
        let db: SiteDbFile = toml::from_str(toml_str)?;
        Ok(Self { sites: db.sites })
    }

    /// Load the embedded database, merged with a user file if one exists at `path`.
    pub fn load_with_user(path: &Path) -> Result<Self, SiteError> {
        let mut db = Self::embedded();
        if path.exists() {
            let user_str = std::fs::read_to_string(path)?;
            let user = Self::from_toml(&user_str)?;
            tracing::debug!(path = %path.display(), sites = user.len(), "Merging user sites");
            db.merge_user(&user);
        }
        Ok(db)
    }

    /// Merge a user database into this one.
    /// Sites with matching names are replaced; new sites are appended.
    pub fn merge_user(&mut self, user_db: &SiteDatabase) {
        for user_site in &user_db.sites {
            if let Some(pos) = self.sites.iter().position(|s| s.name == user_site.name) {
                self.sites[pos] = user_site.clone();
            } else {
                self.sites.push(user_site.clone());
            }
        }
    }

    /// Find the first enabled site for which `url` is a playback page.
    ///
    /// Both the host token and one of the playback paths must be present;
    /// a host match alone does not qualify.
    pub fn match_url(&self, url: &str) -> Option<SiteMatch> {
        self.sites.iter().enumerate().find_map(|(index, s)| {
            if !s.enabled || !url.contains(&s.host) {
                return None;
            }
            let kind = if url.contains(&s.movie_path) {
                ContentKind::Movie
            } else if url.contains(&s.show_path) {
                ContentKind::Show
            } else {
                return None;
            };
            Some(SiteMatch { index, kind })
        })
    }

    /// Get the title XPath for a matched site index.
    pub fn title_xpath(&self, index: usize) -> Option<&str> {
        self.sites.get(index).map(|s| s.title_xpath.as_str())
    }

    /// Get the site name for a matched site index.
    pub fn site_name(&self, index: usize) -> Option<&str> {
        self.sites.get(index).map(|s| s.name.as_str())
    }

    /// Number of site definitions.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the database is empty.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
