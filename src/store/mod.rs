//! Flat-file record store for recurring items.
//!
//! Items live in a single pretty-printed JSON array. Every mutating operation is
//! all-or-nothing: the whole batch is checked before the in-memory collection changes,
//! and nothing reaches disk until [`RecordStore::save`] is called.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

use crate::core::{RecurringItem, SimulationError};

const TMP_SUFFIX: &str = "tmp";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("no recurring item with id `{0}`")]
    UnknownIdentifier(String),
    #[error("recurring item id `{0}` already exists")]
    DuplicateIdentifier(String),
    #[error(transparent)]
    Invalid(#[from] SimulationError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
    items: Vec<RecurringItem>,
}

impl RecordStore {
    /// Loads the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            let data = fs::read_to_string(&path)?;
            if data.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&data)?
            }
        } else {
            Vec::new()
        };
        info!(path = %path.display(), items = items.len(), "loaded recurring items");
        Ok(Self { path, items })
    }

    /// Creates an empty store at `path`, replacing whatever was there.
    pub fn init(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            items: Vec::new(),
        };
        store.save()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[RecurringItem] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&RecurringItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn add(&mut self, items: Vec<RecurringItem>) -> Result<()> {
        let mut ids: HashSet<&str> = self.items.iter().map(|item| item.id.as_str()).collect();
        for item in &items {
            item.validate()?;
            if !ids.insert(item.id.as_str()) {
                return Err(StoreError::DuplicateIdentifier(item.id.clone()));
            }
        }
        self.items.extend(items);
        Ok(())
    }

    pub fn update(&mut self, items: Vec<RecurringItem>) -> Result<()> {
        let mut positions = Vec::with_capacity(items.len());
        for item in &items {
            item.validate()?;
            let idx = self
                .position(&item.id)
                .ok_or_else(|| StoreError::UnknownIdentifier(item.id.clone()))?;
            positions.push(idx);
        }
        for (idx, item) in positions.into_iter().zip(items) {
            self.items[idx] = item;
        }
        Ok(())
    }

    pub fn remove(&mut self, ids: &[String]) -> Result<()> {
        if let Some(missing) = ids.iter().find(|id| self.position(id).is_none()) {
            return Err(StoreError::UnknownIdentifier(missing.clone()));
        }
        self.items.retain(|item| !ids.contains(&item.id));
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.items)?;
        write_atomic(&self.path, &data)?;
        info!(path = %self.path.display(), items = self.items.len(), "saved recurring items");
        Ok(())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

fn write_atomic(path: &Path, data: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension(TMP_SUFFIX);
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}
