use crate::models::Model;
use crate::pipeline::{CanonicalRow, RawRow};

/// Rename raw columns to the model's canonical field names.
///
/// Headers are looked up lower-cased and trimmed in the model's alias table;
/// unknown columns pass through unchanged rather than being dropped. Required
/// canonical fields the file never supplied are inserted with `None`.
///
/// Pure function; the input row is not mutated.
pub fn map(row: &RawRow, model: &Model) -> CanonicalRow {
    let mut mapped: CanonicalRow = CanonicalRow::with_capacity(row.len());

    for (raw_name, value) in row {
        let key = raw_name.trim().to_lowercase();
        let canonical = model
            .aliases
            .get(key.as_str())
            .map(|c| c.to_string())
            .unwrap_or_else(|| raw_name.clone());
        mapped.insert(canonical, Some(value.clone()));
    }

    for field in model.required_fields() {
        mapped.entry(field.name.to_string()).or_insert(None);
    }

    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::customer;

    fn raw(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renames_known_aliases() {
        let model = customer::model();
        let row = raw(&[("full_name", "Ada"), ("customer_email", "ada@example.com")]);
        let mapped = map(&row, &model);
        assert_eq!(mapped.get("name").unwrap().as_deref(), Some("Ada"));
        assert_eq!(mapped.get("email").unwrap().as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn header_lookup_is_case_insensitive_and_trimmed() {
        let model = customer::model();
        let row = raw(&[(" SignupDate ", "2024-01-01"), ("EMAIL", "a@b.c"), ("name", "A")]);
        let mapped = map(&row, &model);
        assert_eq!(mapped.get("signupDate").unwrap().as_deref(), Some("2024-01-01"));
        assert_eq!(mapped.get("email").unwrap().as_deref(), Some("a@b.c"));
    }

    #[test]
    fn unknown_columns_pass_through() {
        let model = customer::model();
        let row = raw(&[("name", "Ada"), ("email", "a@b.c"), ("favorite_color", "green")]);
        let mapped = map(&row, &model);
        assert_eq!(mapped.get("favorite_color").unwrap().as_deref(), Some("green"));
    }

    #[test]
    fn missing_required_fields_become_null() {
        let model = customer::model();
        let row = raw(&[("name", "Ada"), ("phone", "555-0100")]);
        let mapped = map(&row, &model);
        assert_eq!(mapped.get("email"), Some(&None));
    }
}
