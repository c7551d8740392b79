use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::{
    audio::{ClipResolver, Locator},
    models::{Segment, SegmentColor, SegmentId},
};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

const INDEX_FILE: &str = "index.json";
const MASTER_EXTENSIONS: [&str; 5] = ["mp3", "m4a", "wav", "ogg", "aac"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("collection '{0}' not found")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionInfo {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
struct CollectionFile {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    verses: Vec<VerseRecord>,
}

#[derive(Debug, Deserialize)]
struct VerseRecord {
    id: u32,
    #[serde(default)]
    color: SegmentColor,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

/// A loaded collection: the ordered verses handed to the playback and timing
/// engines. Immutable for the rest of the session.
#[derive(Debug, Clone)]
pub struct Collection {
    pub id: String,
    pub title: String,
    pub segments: Vec<Segment>,
}

impl Collection {
    pub fn index_of(&self, id: SegmentId) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }
}

/// The collections available under a data directory.
#[derive(Debug, Clone)]
pub struct CollectionCatalog {
    data_dir: PathBuf,
    collections: Vec<CollectionInfo>,
}

impl CollectionCatalog {
    /// Read `index.json` when present, otherwise list every collection file in
    /// the directory by name.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let data_dir = data_dir.into();
        let index_path = data_dir.join(INDEX_FILE);

        let collections = if index_path.is_file() {
            let contents = read(&index_path)?;
            serde_json::from_str(&contents).map_err(|source| CatalogError::Parse {
                path: index_path.clone(),
                source,
            })?
        } else {
            scan(&data_dir)?
        };

        Ok(Self {
            data_dir,
            collections,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn all(&self) -> &[CollectionInfo] {
        &self.collections
    }

    pub fn get(&self, id: &str) -> Option<&CollectionInfo> {
        self.collections.iter().find(|c| c.id == id)
    }

    pub fn previous(&self, id: &str) -> Option<&CollectionInfo> {
        let index = self.collections.iter().position(|c| c.id == id)?;
        index.checked_sub(1).and_then(|i| self.collections.get(i))
    }

    pub fn next(&self, id: &str) -> Option<&CollectionInfo> {
        let index = self.collections.iter().position(|c| c.id == id)?;
        self.collections.get(index + 1)
    }

    pub fn load(&self, id: &str, resolver: &dyn ClipResolver) -> Result<Collection, CatalogError> {
        let info = self
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        let path = self.data_dir.join(&info.filename);
        if !path.is_file() {
            return Err(CatalogError::NotFound(id.to_string()));
        }

        let file = parse_collection(&path)?;
        let segments = file
            .verses
            .into_iter()
            .enumerate()
            .map(|(order, verse)| {
                let id = SegmentId(verse.id);
                Segment {
                    id,
                    order,
                    has_audio: resolver.has_audio_for_segment(&info.id, id),
                    color: verse.color,
                    fields: verse.fields,
                }
            })
            .collect();

        Ok(Collection {
            id: info.id.clone(),
            title: file.title.unwrap_or_else(|| info.title.clone()),
            segments,
        })
    }

    /// The whole-collection recording next to the collection file, if any.
    pub fn master_recording(&self, id: &str) -> Option<Locator> {
        MASTER_EXTENSIONS
            .iter()
            .map(|ext| Locator::new(self.data_dir.join(format!("{id}.{ext}"))))
            .find(Locator::exists)
    }
}

fn read(path: &Path) -> Result<String, CatalogError> {
    fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_collection(path: &Path) -> Result<CollectionFile, CatalogError> {
    let contents = read(path)?;
    serde_json::from_str(&contents).map_err(|source| CatalogError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn scan(data_dir: &Path) -> Result<Vec<CollectionInfo>, CatalogError> {
    let entries = fs::read_dir(data_dir).map_err(|source| CatalogError::Io {
        path: data_dir.to_path_buf(),
        source,
    })?;

    let mut collections = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with("timing-") || stem == "index" {
            continue;
        }

        match parse_collection(&path) {
            Ok(file) => collections.push(CollectionInfo {
                id: stem.to_string(),
                title: file.title.unwrap_or_else(|| stem.to_string()),
                description: None,
                filename: format!("{stem}.json"),
            }),
            Err(err) => log_warn!("skipping {}: {}", path.display(), err),
        }
    }

    collections.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(collections)
}
