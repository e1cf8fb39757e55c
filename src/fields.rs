//! Reserved field names written next to application fields.

/// Identifier value of the indexed object, as a string.
pub const ID_FIELD_NAME: &str = "_id";

/// Name of the identifier's type, see [`crate::identifier::IdType`].
pub const ID_TYPE_FIELD_NAME: &str = "_id-type";

/// Registered type name of the indexed object.
pub const TYPE_FIELD_NAME: &str = "_type";

/// `"{type}:{id}"`, unique per object; used to delete or replace it.
pub const COMPOUND_ID_FIELD_NAME: &str = "_cid";

/// Prefix of the untokenized twin of a sortable field.
pub const SORTABLE_PREFIX: &str = "_sort-";

/// Fields never copied into a result's stored fields nor searched by default.
pub const PRIVATE_FIELD_NAMES: [&str; 4] = [
    ID_FIELD_NAME,
    ID_TYPE_FIELD_NAME,
    TYPE_FIELD_NAME,
    COMPOUND_ID_FIELD_NAME,
];

pub fn is_private_field(name: &str) -> bool {
    PRIVATE_FIELD_NAMES.contains(&name)
}

pub fn is_sortable_field(name: &str) -> bool {
    name.starts_with(SORTABLE_PREFIX)
}

/// Whether a field is internal bookkeeping rather than application data.
pub fn is_internal_field(name: &str) -> bool {
    is_private_field(name) || is_sortable_field(name)
}

/// Name of the field holding the sortable form of `name`.
pub fn sortable_field_name(name: &str) -> String {
    format!("{SORTABLE_PREFIX}{name}")
}

/// Value of the compound id field.
pub fn compound_id(type_name: &str, id: &str) -> String {
    format!("{type_name}:{id}")
}
