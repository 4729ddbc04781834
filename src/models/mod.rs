pub mod customer;
pub mod project;
pub mod registry;

pub use registry::ModelRegistry;

use std::collections::HashMap;

/// Value type of a canonical field, driving the validator's format checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Email,
    Date,
    Number,
    Phone,
}

/// One canonical field of a model's schema, in declaration order.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub field_type: FieldType,
}

/// Closed set of cross-field rules. Evaluated after required and type checks.
#[derive(Debug, Clone)]
pub enum CrossFieldRule {
    /// Fails when both fields parse as dates and `start` is after `end`.
    DateOrder {
        start: &'static str,
        end: &'static str,
        message: &'static str,
    },
}

/// A named record schema: typed fields, header aliases, a detection pattern
/// set, an identity field for row dedup, and the write API operations.
///
/// Models are plain data, immutable after construction. The registry owns a
/// fixed set of them; adding a record type means adding a constructor here
/// and registering it, nothing else.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: &'static str,
    pub schema: Vec<FieldSpec>,
    /// lower-cased raw header -> canonical field name
    pub aliases: HashMap<&'static str, &'static str>,
    pub cross_field_rules: Vec<CrossFieldRule>,
    /// Canonical field whose value identifies a record for row-level dedup
    pub identity_field: Option<&'static str>,
    pub create_document: &'static str,
    /// Canonical fields copied into the mutation's input object
    pub input_fields: Vec<&'static str>,
    pub read_document: &'static str,
}

impl Model {
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.schema.iter().filter(|f| f.required)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.schema.iter().find(|f| f.name == name)
    }

    /// Lower-cased names this model recognizes: its canonical fields plus
    /// every registered alias. Used by detection.
    pub fn field_patterns(&self) -> impl Iterator<Item = String> + '_ {
        self.schema
            .iter()
            .map(|f| f.name.to_lowercase())
            .chain(self.aliases.keys().map(|a| a.to_string()))
    }

    /// Detection heuristic: at least two recognized header names present.
    pub fn matches_columns(&self, lowered_columns: &[String]) -> bool {
        let found = self
            .field_patterns()
            .filter(|p| lowered_columns.iter().any(|c| c == p))
            .count();
        found >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_cover_canonical_names_and_aliases() {
        let model = customer::model();
        let patterns: Vec<String> = model.field_patterns().collect();
        assert!(patterns.contains(&"signupdate".to_string()));
        assert!(patterns.contains(&"full_name".to_string()));
        assert!(patterns.contains(&"telephone".to_string()));
    }

    #[test]
    fn single_recognized_column_is_not_a_match() {
        let model = customer::model();
        let columns = vec!["name".to_string(), "quantity".to_string()];
        assert!(!model.matches_columns(&columns));
    }
}
