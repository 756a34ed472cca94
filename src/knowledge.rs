//! Knowledge base loading and lookup
//!
//! Loads JSON files from a data directory into an explicit in-memory cache.
//! The store is constructed once at startup and shared by `Arc` injection;
//! `reload` is the only invalidation point. Lookup is a case-insensitive
//! linear substring scan over the entries of one named collection.

use crate::error::{BotError, BotResult};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Result shape returned to responders
#[derive(Debug, Clone)]
pub struct Lookup {
    pub items: Vec<Value>,
    pub found: bool,
    pub metadata: Option<Value>,
}

/// In-memory knowledge cache backed by a directory of JSON files.
///
/// Each `<name>.json` file becomes one collection. A file may be either a
/// bare JSON array of entries or an object with an `items` array plus
/// optional `metadata`.
pub struct KnowledgeStore {
    data_dir: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

#[derive(Debug, Clone)]
struct Collection {
    items: Vec<Value>,
    metadata: Option<Value>,
}

impl KnowledgeStore {
    /// Load every JSON file under `data_dir`. Missing directory is a
    /// configuration error; an unparseable file is skipped with a warning so
    /// one bad export does not take the bot down.
    pub fn load(data_dir: &Path) -> BotResult<Self> {
        let collections = load_collections(data_dir)?;
        info!(
            data_dir = %data_dir.display(),
            collections = collections.len(),
            "Knowledge store loaded"
        );

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            collections: RwLock::new(collections),
        })
    }

    /// Drop the cache and re-read every file from disk.
    pub async fn reload(&self) -> BotResult<()> {
        let fresh = load_collections(&self.data_dir)?;
        let mut collections = self.collections.write().await;
        info!(collections = fresh.len(), "Knowledge store reloaded");
        *collections = fresh;
        Ok(())
    }

    /// Names of the loaded collections, for diagnostics.
    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }

    /// Case-insensitive substring search over one collection.
    ///
    /// An entry matches when any of its string field values contains the
    /// query term. An unknown collection returns an empty not-found result
    /// rather than an error; search quality is out of scope here.
    pub async fn search(&self, collection: &str, term: &str) -> Lookup {
        let collections = self.collections.read().await;
        let Some(collection) = collections.get(collection) else {
            debug!(collection, "Lookup against unknown collection");
            return Lookup {
                items: Vec::new(),
                found: false,
                metadata: None,
            };
        };

        let needle = term.to_lowercase();
        let items: Vec<Value> = collection
            .items
            .iter()
            .filter(|entry| entry_matches(entry, &needle))
            .cloned()
            .collect();

        Lookup {
            found: !items.is_empty(),
            metadata: collection.metadata.clone(),
            items,
        }
    }

    /// Every entry of one collection, for "list all" style answers.
    pub async fn all(&self, collection: &str) -> Lookup {
        let collections = self.collections.read().await;
        match collections.get(collection) {
            Some(collection) => Lookup {
                found: !collection.items.is_empty(),
                items: collection.items.clone(),
                metadata: collection.metadata.clone(),
            },
            None => Lookup {
                items: Vec::new(),
                found: false,
                metadata: None,
            },
        }
    }
}

fn load_collections(data_dir: &Path) -> BotResult<HashMap<String, Collection>> {
    let entries = std::fs::read_dir(data_dir).map_err(|e| {
        BotError::configuration(format!(
            "knowledge data dir '{}' is not readable: {e}",
            data_dir.display()
        ))
    })?;

    let mut collections = HashMap::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };

        match read_collection(&path) {
            Ok(collection) => {
                debug!(
                    collection = name,
                    items = collection.items.len(),
                    "Loaded knowledge collection"
                );
                collections.insert(name.to_string(), collection);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping invalid knowledge file");
            }
        }
    }

    Ok(collections)
}

fn read_collection(path: &Path) -> Result<Collection, String> {
    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(&content).map_err(|e| e.to_string())?;

    match value {
        Value::Array(items) => Ok(Collection {
            items,
            metadata: None,
        }),
        Value::Object(mut object) => {
            let items = match object.remove("items") {
                Some(Value::Array(items)) => items,
                _ => return Err("object-form knowledge file needs an 'items' array".to_string()),
            };
            Ok(Collection {
                items,
                metadata: object.remove("metadata"),
            })
        }
        _ => Err("knowledge file must be a JSON array or object".to_string()),
    }
}

fn entry_matches(entry: &Value, needle: &str) -> bool {
    match entry {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Object(fields) => fields.values().any(|v| entry_matches(v, needle)),
        Value::Array(values) => values.iter().any(|v| entry_matches(v, needle)),
        _ => false,
    }
}
