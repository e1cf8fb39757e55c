//! Type metadata and the type-name → factory table used to rebuild results.
//!
//! Applications register each result type under the name its objects write
//! to `_type`. Names that are not registered are not an error: their hits
//! are rebuilt as [`crate::result::GenericResult`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::result::SearchResult;

/// Identifier property assumed when a type does not declare one.
pub const DEFAULT_ID_PROPERTY: &str = "id";

/// What the search layer needs to know about a result type.
pub trait TypeMetadata: Send + Sync {
    /// Name of the property holding the identifier, `"id"` if undeclared.
    fn id_property_name(&self, type_name: &str) -> String;

    /// Fields searched when criteria name none. May be empty.
    fn default_fields(&self, type_name: &str) -> Vec<String>;
}

/// Builds an empty instance of a result type.
pub type ResultFactory = Arc<dyn Fn() -> Box<dyn SearchResult> + Send + Sync>;

/// Registration of one result type.
#[derive(Clone)]
pub struct TypeInfo {
    factory: ResultFactory,
    id_property: Option<String>,
    default_fields: Vec<String>,
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("id_property", &self.id_property)
            .field("default_fields", &self.default_fields)
            .finish()
    }
}

impl TypeInfo {
    /// Instances built with `T::default()`.
    pub fn of<T>() -> Self
    where
        T: SearchResult + Default + 'static,
    {
        Self::from_fn(|| Box::new(T::default()) as Box<dyn SearchResult>)
    }

    pub fn from_fn<F>(factory: F) -> Self
    where
        F: Fn() -> Box<dyn SearchResult> + Send + Sync + 'static,
    {
        TypeInfo {
            factory: Arc::new(factory),
            id_property: None,
            default_fields: Vec::new(),
        }
    }

    pub fn with_id_property(mut self, property: impl Into<String>) -> Self {
        self.id_property = Some(property.into());
        self
    }

    pub fn with_default_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn instantiate(&self) -> Box<dyn SearchResult> {
        (self.factory)()
    }

    pub fn id_property(&self) -> &str {
        self.id_property.as_deref().unwrap_or(DEFAULT_ID_PROPERTY)
    }

    pub fn default_fields(&self) -> &[String] {
        &self.default_fields
    }
}

/// Result types known to the application, by type name.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: RwLock<HashMap<String, TypeInfo>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) a type name.
    pub fn register(&self, type_name: impl Into<String>, info: TypeInfo) {
        self.types.write().insert(type_name.into(), info);
    }

    /// Builder-style variant of [`TypeRegistry::register`].
    pub fn with_type(self, type_name: impl Into<String>, info: TypeInfo) -> Self {
        self.register(type_name, info);
        self
    }

    pub fn unregister(&self, type_name: &str) -> Option<TypeInfo> {
        self.types.write().remove(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.read().contains_key(type_name)
    }

    pub fn info(&self, type_name: &str) -> Option<TypeInfo> {
        self.types.read().get(type_name).cloned()
    }

    /// A fresh instance of a registered type.
    pub fn instantiate(&self, type_name: &str) -> Option<Box<dyn SearchResult>> {
        let factory = self.types.read().get(type_name)?.factory.clone();
        Some(factory())
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl TypeMetadata for TypeRegistry {
    fn id_property_name(&self, type_name: &str) -> String {
        self.types
            .read()
            .get(type_name)
            .map(|info| info.id_property().to_string())
            .unwrap_or_else(|| DEFAULT_ID_PROPERTY.to_string())
    }

    fn default_fields(&self, type_name: &str) -> Vec<String> {
        self.types
            .read()
            .get(type_name)
            .map(|info| info.default_fields.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::GenericResult;

    #[test]
    fn test_registered_type() {
        let registry = TypeRegistry::new().with_type(
            "Article",
            TypeInfo::of::<GenericResult>()
                .with_id_property("article_id")
                .with_default_fields(["title", "body"]),
        );

        assert!(registry.contains("Article"));
        assert_eq!(registry.id_property_name("Article"), "article_id");
        assert_eq!(registry.default_fields("Article"), vec!["title", "body"]);
        assert!(registry.instantiate("Article").is_some());
    }

    #[test]
    fn test_unknown_type_fallbacks() {
        let registry = TypeRegistry::new();
        assert_eq!(registry.id_property_name("Missing"), "id");
        assert!(registry.default_fields("Missing").is_empty());
        assert!(registry.instantiate("Missing").is_none());
    }
}
