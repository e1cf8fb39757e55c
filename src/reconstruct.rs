//! Rebuilding result objects from hits.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{Result, SearchableError};
use crate::fields::{ID_FIELD_NAME, ID_TYPE_FIELD_NAME, TYPE_FIELD_NAME, is_internal_field};
use crate::identifier::IdType;
use crate::index::Document;
use crate::metadata::{TypeMetadata, TypeRegistry};
use crate::result::{GenericResult, SearchResult};

/// Turns stored documents back into [`SearchResult`]s.
///
/// A hit whose `_type` is missing, unregistered, or registered to a type
/// without an identifier comes back as a [`GenericResult`] carrying the raw
/// `_id` and `_type`. Typed results get their identifier converted back to
/// the type recorded in `_id-type`.
#[derive(Debug, Clone)]
pub struct ResultReconstructor {
    types: Arc<TypeRegistry>,
}

impl ResultReconstructor {
    pub fn new(types: Arc<TypeRegistry>) -> Self {
        ResultReconstructor { types }
    }

    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// Rebuild the result at absolute position `ranking`.
    ///
    /// Fails with [`SearchableError::Reconstruction`] when a recorded
    /// identifier cannot be converted or set.
    pub fn rebuild(&self, doc: &Document, ranking: usize, score: f32) -> Result<Box<dyn SearchResult>> {
        let type_name = doc.get(TYPE_FIELD_NAME);

        let typed = type_name.and_then(|name| {
            let instance = self.types.instantiate(name);
            if instance.is_some() {
                debug!("Created new instance of {name}");
            }
            instance
        });

        let typed = match (typed, type_name) {
            (Some(mut result), Some(name)) => {
                if result.as_searchable_mut().is_some() {
                    self.restore_id(result.as_mut(), name, doc)?;
                    Some(result)
                } else {
                    None
                }
            }
            _ => None,
        };

        let mut result = match typed {
            Some(result) => result,
            None => {
                let mut generic = GenericResult::new();
                generic.set_id(doc.get(ID_FIELD_NAME).map(str::to_string));
                generic.set_type_name(type_name.map(str::to_string));
                Box::new(generic) as Box<dyn SearchResult>
            }
        };

        let info = result.info_mut();
        info.stored_fields = stored_fields(doc);
        info.ranking = ranking;
        info.score = score;
        Ok(result)
    }

    fn restore_id(&self, result: &mut dyn SearchResult, type_name: &str, doc: &Document) -> Result<()> {
        let Some(searchable) = result.as_searchable_mut() else {
            return Ok(());
        };
        let Some(raw) = doc.get(ID_FIELD_NAME) else {
            warn!("Hit of type {type_name} has no identifier");
            return Ok(());
        };

        let declared = doc.get(ID_TYPE_FIELD_NAME).unwrap_or_default();
        let Some(id_type) = IdType::resolve(declared) else {
            let e = SearchableError::IdentifierType(format!(
                "'{declared}' for {type_name} identifier '{raw}'"
            ));
            warn!("{e}; identifier left unset");
            return Ok(());
        };

        let property = self.types.id_property_name(type_name);
        debug!("Setting {type_name}.{property} to '{raw}' of type {id_type}");
        let value = id_type.convert(raw)?;
        searchable.set_id(&property, value).map_err(|e| match e {
            e @ SearchableError::Reconstruction { .. } => e,
            e => SearchableError::reconstruction(
                format!("Could not set {type_name}.{property}"),
                e,
            ),
        })
    }
}

/// Stored application fields of a document; a repeated name keeps its last value.
pub fn stored_fields(doc: &Document) -> BTreeMap<String, String> {
    doc.fields()
        .iter()
        .filter(|f| f.stored && !is_internal_field(&f.name))
        .map(|f| (f.name.clone(), f.value.clone()))
        .collect()
}
