//! Writing application objects into an index.
//!
//! An object opts in by implementing [`Searchable`]. Its fields are written
//! next to the reserved fields from [`crate::fields`], which is what lets a
//! search rebuild it later.

use std::sync::Arc;

use log::debug;

use crate::error::{Result, SearchableError};
use crate::fields::{
    COMPOUND_ID_FIELD_NAME, ID_FIELD_NAME, ID_TYPE_FIELD_NAME, TYPE_FIELD_NAME, compound_id,
    is_internal_field, sortable_field_name,
};
use crate::identifier::IdValue;
use crate::index::{Document, Field};
use crate::lifecycle::IndexLifecycle;
use crate::query::Term;

/// One application field of a searchable object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedField {
    pub name: String,
    pub value: String,
    /// Copied into results.
    pub stored: bool,
    /// Analyzed into words; otherwise indexed as one exact term.
    pub tokenized: bool,
    /// Also written under `_sort-<name>` so results can be ordered by it.
    pub sortable: bool,
}

impl IndexedField {
    /// Stored full text.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        IndexedField {
            name: name.into(),
            value: value.into(),
            stored: true,
            tokenized: true,
            sortable: false,
        }
    }

    /// Stored exact value.
    pub fn keyword(name: impl Into<String>, value: impl Into<String>) -> Self {
        IndexedField {
            name: name.into(),
            value: value.into(),
            stored: true,
            tokenized: false,
            sortable: false,
        }
    }

    /// Searchable full text that results do not carry.
    pub fn unstored(name: impl Into<String>, value: impl Into<String>) -> Self {
        IndexedField {
            name: name.into(),
            value: value.into(),
            stored: false,
            tokenized: true,
            sortable: false,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

/// An object that can be indexed and rebuilt from search hits.
pub trait Searchable: Send + Sync {
    /// Name under which the type is registered for reconstruction.
    fn type_name(&self) -> &str;

    fn id(&self) -> Option<IdValue>;

    /// Set the identifier property named `property`.
    ///
    /// `property` comes from the type's metadata; an unknown property is an error.
    fn set_id(&mut self, property: &str, id: IdValue) -> Result<()>;

    /// Application fields to index.
    fn indexed_fields(&self) -> Vec<IndexedField>;
}

/// Build the document for an object: reserved fields first, then its own.
pub fn document_for(bean: &dyn Searchable) -> Result<Document> {
    let type_name = bean.type_name();
    let id = bean.id().ok_or_else(|| {
        SearchableError::invalid_argument(format!(
            "cannot index a {type_name} without an identifier"
        ))
    })?;
    let raw_id = id.to_string();

    let mut doc = Document::new()
        .add_keyword(ID_FIELD_NAME, raw_id.as_str())
        .add_keyword(ID_TYPE_FIELD_NAME, id.id_type().name())
        .add_keyword(TYPE_FIELD_NAME, type_name)
        .add_keyword(COMPOUND_ID_FIELD_NAME, compound_id(type_name, &raw_id));

    for field in bean.indexed_fields() {
        if is_internal_field(&field.name) {
            return Err(SearchableError::invalid_argument(format!(
                "field name '{}' of {type_name} is reserved",
                field.name
            )));
        }
        if field.sortable {
            doc.add(Field {
                name: sortable_field_name(&field.name),
                value: field.value.clone(),
                stored: false,
                indexed: true,
                tokenized: false,
            });
        }
        doc.add(Field {
            name: field.name,
            value: field.value,
            stored: field.stored,
            indexed: true,
            tokenized: field.tokenized,
        });
    }
    Ok(doc)
}

/// Adds, replaces and removes objects in the index of a lifecycle.
///
/// Outside batch mode every operation is committed before it returns, so
/// the next search sees it. In batch mode operations stay buffered until
/// [`Indexer::flush`] or [`Indexer::close`].
#[derive(Debug, Clone)]
pub struct Indexer {
    lifecycle: Arc<IndexLifecycle>,
}

impl Indexer {
    pub fn new(lifecycle: Arc<IndexLifecycle>) -> Self {
        Indexer { lifecycle }
    }

    pub fn lifecycle(&self) -> &Arc<IndexLifecycle> {
        &self.lifecycle
    }

    pub fn add(&self, bean: &dyn Searchable) -> Result<()> {
        let doc = document_for(bean)?;
        let writer = self.lifecycle.acquire_writer()?;
        let mut writer = writer.lock();
        writer.add_document(doc)?;
        debug!("Indexed {}", bean.type_name());
        if !self.lifecycle.is_batch_mode() {
            writer.commit()?;
        }
        Ok(())
    }

    /// Remove an object. Returns the number of documents removed.
    pub fn delete(&self, bean: &dyn Searchable) -> Result<usize> {
        let id = bean.id().ok_or_else(|| {
            SearchableError::invalid_argument(format!(
                "cannot delete a {} without an identifier",
                bean.type_name()
            ))
        })?;
        self.delete_by_id(bean.type_name(), &id)
    }

    pub fn delete_by_id(&self, type_name: &str, id: &IdValue) -> Result<usize> {
        let term = Term::new(
            COMPOUND_ID_FIELD_NAME,
            compound_id(type_name, &id.to_string()),
        );
        let writer = self.lifecycle.acquire_writer()?;
        let mut writer = writer.lock();
        let deleted = writer.delete_documents(&term)?;
        if !self.lifecycle.is_batch_mode() {
            writer.commit()?;
        }
        Ok(deleted)
    }

    /// Replace any indexed version of an object with its current state.
    pub fn save(&self, bean: &dyn Searchable) -> Result<()> {
        let doc = document_for(bean)?;
        let id = bean.id().map(|id| id.to_string()).unwrap_or_default();
        let term = Term::new(
            COMPOUND_ID_FIELD_NAME,
            compound_id(bean.type_name(), &id),
        );

        let writer = self.lifecycle.acquire_writer()?;
        let mut writer = writer.lock();
        writer.delete_documents(&term)?;
        writer.add_document(doc)?;
        if !self.lifecycle.is_batch_mode() {
            writer.commit()?;
        }
        Ok(())
    }

    pub fn is_batch_mode(&self) -> bool {
        self.lifecycle.is_batch_mode()
    }

    pub fn set_batch_mode(&self, batch_mode: bool) {
        self.lifecycle.set_batch_mode(batch_mode);
    }

    /// Publish buffered operations.
    pub fn flush(&self) -> Result<()> {
        self.lifecycle.flush()
    }

    pub fn optimize(&self) -> Result<()> {
        self.lifecycle.optimize()
    }

    pub fn close(&self) -> Result<()> {
        self.lifecycle.close()
    }
}
