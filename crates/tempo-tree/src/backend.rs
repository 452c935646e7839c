//! Single-file tree [`StorageBackend`].
//!
//! The whole database lives in one [`Document`]; mutations edit the element
//! tree in place and rewrite the file. While a transaction is open, writes
//! stay in memory and the file is only rewritten at commit (or rollback,
//! which restores the begin-time snapshot). Without a path the backend is a
//! purely in-memory store, which is what most tests use.

use std::fs;
use std::path::PathBuf;

use tempo_db::{DbError, DbResult, StorageBackend};
use tempo_model::{ObjectKind, ObjectRecord};
use tempo_types::Oid;
use tracing::debug;

use crate::document::{self, Document};
use crate::error::{TreeError, TreeResult};
use crate::serializer;

pub struct TreeBackend {
    document: Document,
    path: Option<PathBuf>,
    snapshot: Option<Document>,
}

impl TreeBackend {
    /// An empty in-memory store.
    pub fn new() -> Self {
        Self {
            document: Document::empty(),
            path: None,
            snapshot: None,
        }
    }

    /// Open the document file at `path`, creating an empty document if the
    /// file does not exist yet. The file is (re)written on every mutation
    /// outside a transaction and at every commit.
    pub fn open(path: impl Into<PathBuf>) -> DbResult<Self> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(text) => {
                serde_json::from_str(&text).map_err(|e| DbError::from(TreeError::from(e)))?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Document::empty(),
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), objects = document.object_count(), "document opened");
        Ok(Self {
            document,
            path: Some(path),
            snapshot: None,
        })
    }

    /// The document as currently held in memory.
    pub fn document(&self) -> &Document {
        &self.document
    }

    fn flush(&self) -> TreeResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(&self.document)?;
        fs::write(path, text).map_err(|err| {
            // ENOSPC surfaces as its own taxonomy entry.
            if err.raw_os_error() == Some(28) {
                TreeError::DiskFull
            } else {
                TreeError::Io(err)
            }
        })
    }

    /// Rewrite the file unless a transaction holds the writes back.
    fn persist(&self) -> TreeResult<()> {
        if self.snapshot.is_none() {
            self.flush()?;
        }
        Ok(())
    }
}

impl Default for TreeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for TreeBackend {
    fn load_all(&mut self) -> DbResult<Vec<ObjectRecord>> {
        document::disassemble(&self.document).map_err(DbError::from)
    }

    fn fetch(&self, oid: Oid) -> DbResult<Option<ObjectRecord>> {
        match self.document.root.find_with_parent(oid) {
            Some((element, parent)) => {
                let record =
                    serializer::decode_element(element, parent).map_err(DbError::from)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn contains(&self, oid: Oid) -> DbResult<bool> {
        Ok(self.document.root.find_descendant(oid).is_some())
    }

    fn insert(&mut self, record: &ObjectRecord) -> DbResult<()> {
        let element = serializer::record_to_element(record).map_err(DbError::from)?;
        match record.parent {
            Some(parent) => self
                .document
                .root
                .find_descendant_mut(parent)
                .ok_or(TreeError::MissingObject(parent))
                .map_err(DbError::from)?
                .add_child(element),
            None => self.document.root.add_child(element),
        }
        self.persist().map_err(DbError::from)
    }

    fn update(&mut self, record: &ObjectRecord) -> DbResult<()> {
        let fresh = serializer::record_to_element(record).map_err(DbError::from)?;
        let element = self
            .document
            .root
            .find_descendant_mut(record.oid)
            .ok_or(TreeError::MissingObject(record.oid))
            .map_err(DbError::from)?;
        // Attributes are replaced wholesale; the nested children stay.
        element.attributes = fresh.attributes;
        self.persist().map_err(DbError::from)
    }

    fn delete(&mut self, oid: Oid, _kind: ObjectKind) -> DbResult<()> {
        if !self.document.root.remove_descendant(oid) {
            return Err(TreeError::MissingObject(oid).into());
        }
        self.persist().map_err(DbError::from)
    }

    fn begin(&mut self) -> DbResult<()> {
        self.snapshot = Some(self.document.clone());
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        self.snapshot = None;
        self.flush().map_err(DbError::from)
    }

    fn rollback(&mut self) -> DbResult<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.document = snapshot;
        }
        self.flush().map_err(DbError::from)
    }
}
