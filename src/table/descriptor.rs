use std::collections::BTreeSet;
use tracing::debug;

use crate::table::types::Consistency;

/// Hash and optional range attribute names of a table or index
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeySchema {
    /// Hash (partition) key attribute
    pub hash_key: String,
    /// Range (sort) key attribute
    pub range_key: Option<String>,
}

impl KeySchema {
    /// Key schema with a hash key and an optional range key
    pub fn new(hash_key: impl Into<String>, range_key: Option<&str>) -> Self {
        Self {
            hash_key: hash_key.into(),
            range_key: range_key.map(str::to_string),
        }
    }

    /// Key attribute names, hash first
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hash_key.as_str()).chain(self.range_key.as_deref())
    }

    /// Whether `field` is one of the key attributes
    pub fn contains(&self, field: &str) -> bool {
        self.fields().any(|key| key == field)
    }
}

/// What a request reads from: the base table or one of its indexes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// The base table
    Table,
    /// A global secondary index with its own key schema
    GlobalIndex {
        /// Index name
        name: String,
        /// Index key schema
        key: KeySchema,
    },
    /// A local secondary index sharing the table's hash key
    LocalIndex {
        /// Index name
        name: String,
        /// Alternate range key
        range_key: String,
    },
}

/// Everything the core needs to know about a table or index.
///
/// A collection is plain data: the table name, the primary key schema, the
/// source being read and the set of known attribute names. Condition paths are
/// validated against `fields`, and key attributes are always part of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Collection {
    table: String,
    primary: KeySchema,
    source: Source,
    fields: BTreeSet<String>,
}

impl Collection {
    /// Collection for a base table
    pub fn table(table: impl Into<String>, primary: KeySchema) -> Self {
        let fields = primary.fields().map(str::to_string).collect();
        Self {
            table: table.into(),
            primary,
            source: Source::Table,
            fields,
        }
    }

    /// Derive the collection of a global secondary index of this table
    pub fn global_index(&self, name: impl Into<String>, key: KeySchema) -> Self {
        let mut fields = self.fields.clone();
        fields.extend(key.fields().map(str::to_string));
        Self {
            table: self.table.clone(),
            primary: self.primary.clone(),
            source: Source::GlobalIndex {
                name: name.into(),
                key,
            },
            fields,
        }
    }

    /// Derive the collection of a local secondary index of this table
    pub fn local_index(&self, name: impl Into<String>, range_key: impl Into<String>) -> Self {
        let range_key = range_key.into();
        let mut fields = self.fields.clone();
        let _ = fields.insert(range_key.clone());
        Self {
            table: self.table.clone(),
            primary: self.primary.clone(),
            source: Source::LocalIndex {
                name: name.into(),
                range_key,
            },
            fields,
        }
    }

    /// Register additional attribute names
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Table name
    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Primary key schema of the base table
    pub fn primary_key(&self) -> &KeySchema {
        &self.primary
    }

    /// What this collection reads from
    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Index name, `None` for the base table
    pub fn index_name(&self) -> Option<&str> {
        match &self.source {
            Source::Table => None,
            Source::GlobalIndex { name, .. } | Source::LocalIndex { name, .. } => Some(name),
        }
    }

    /// Key schema queries are expressed against
    pub fn key_schema(&self) -> KeySchema {
        match &self.source {
            Source::Table => self.primary.clone(),
            Source::GlobalIndex { key, .. } => key.clone(),
            Source::LocalIndex { range_key, .. } => KeySchema {
                hash_key: self.primary.hash_key.clone(),
                range_key: Some(range_key.clone()),
            },
        }
    }

    /// Attributes a resume cursor must carry.
    ///
    /// For an index this is the index key followed by any table key attribute
    /// not already part of it.
    pub fn cursor_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.key_schema().fields().map(str::to_string).collect();
        for field in self.primary.fields() {
            if !fields.iter().any(|f| f == field) {
                fields.push(field.to_string());
            }
        }
        fields
    }

    /// Whether `field` is a known attribute
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    /// Known attribute names
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Consistency actually requested on the wire.
    ///
    /// Global secondary indexes only support eventually consistent reads.
    pub fn effective_consistency(&self, requested: Consistency) -> Consistency {
        match (&self.source, requested) {
            (Source::GlobalIndex { name, .. }, Consistency::Strongly) => {
                debug!(
                    table = %self.table,
                    index = %name,
                    "strongly consistent read downgraded on global index"
                );
                Consistency::Eventually
            }
            _ => requested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> Collection {
        Collection::table("orders", KeySchema::new("user_id", Some("order_id")))
            .with_fields(["status", "total", "placed_at"])
    }

    #[test]
    fn test_table_collection_knows_key_fields() {
        let collection = Collection::table("users", KeySchema::new("id", None));
        assert!(collection.has_field("id"));
        assert!(!collection.has_field("name"));
        assert_eq!(collection.index_name(), None);
        assert_eq!(collection.cursor_fields(), vec!["id".to_string()]);
    }

    #[test]
    fn test_global_index_cursor_carries_table_key() {
        let index = orders().global_index("by_status", KeySchema::new("status", Some("placed_at")));
        assert_eq!(index.index_name(), Some("by_status"));
        assert_eq!(
            index.cursor_fields(),
            vec!["status", "placed_at", "user_id", "order_id"]
        );
        assert_eq!(index.key_schema().hash_key, "status");
    }

    #[test]
    fn test_local_index_shares_hash_key() {
        let index = orders().local_index("by_total", "total");
        let schema = index.key_schema();
        assert_eq!(schema.hash_key, "user_id");
        assert_eq!(schema.range_key.as_deref(), Some("total"));
        assert_eq!(index.cursor_fields(), vec!["user_id", "total", "order_id"]);
    }

    #[test]
    fn test_global_index_downgrades_consistency() {
        let index = orders().global_index("by_status", KeySchema::new("status", None));
        assert_eq!(
            index.effective_consistency(Consistency::Strongly),
            Consistency::Eventually
        );
        assert_eq!(
            orders().effective_consistency(Consistency::Strongly),
            Consistency::Strongly
        );
        assert_eq!(
            orders()
                .local_index("by_total", "total")
                .effective_consistency(Consistency::Strongly),
            Consistency::Strongly
        );
    }
}
