use chrono::NaiveDate;

use crate::models::{CrossFieldRule, FieldType, Model};
use crate::pipeline::CanonicalRow;

/// Validate a mapped row against its model's rules.
///
/// Errors accumulate in a fixed order: required-field errors for every field
/// first, then type-format errors on non-blank values, then cross-field
/// rules. Validation never stops at the first failure, so callers can assert
/// the complete error set for a malformed row. Empty result means the row is
/// submittable.
pub fn validate(row: &CanonicalRow, model: &Model) -> Vec<String> {
    let mut errors = Vec::new();

    for field in model.required_fields() {
        if blank(row, field.name) {
            errors.push(format!("Required field '{}' is missing or empty", field.name));
        }
    }

    for field in &model.schema {
        let value = match non_blank(row, field.name) {
            Some(v) => v,
            None => continue,
        };

        match field.field_type {
            FieldType::String => {}
            FieldType::Email => {
                if !value.contains('@') || !value.contains('.') {
                    errors.push("Invalid email format".to_string());
                }
            }
            FieldType::Date => {
                if parse_date(value).is_none() {
                    errors.push(format!(
                        "Invalid date format for '{}' (expected YYYY-MM-DD)",
                        field.name
                    ));
                }
            }
            FieldType::Phone => {
                let digits = value
                    .chars()
                    .filter(|c| !matches!(*c, '-' | '(' | ')'))
                    .filter(char::is_ascii_digit)
                    .count();
                if digits < 10 {
                    errors.push("Invalid phone number format".to_string());
                }
            }
            FieldType::Number => {
                if !value.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
                    errors.push(format!("Invalid {} format", field.name));
                }
            }
        }
    }

    for rule in &model.cross_field_rules {
        match rule {
            CrossFieldRule::DateOrder { start, end, message } => {
                let start = non_blank(row, start).and_then(parse_date);
                let end = non_blank(row, end).and_then(parse_date);
                if let (Some(start), Some(end)) = (start, end) {
                    if start > end {
                        errors.push(message.to_string());
                    }
                }
            }
        }
    }

    errors
}

fn blank(row: &CanonicalRow, field: &str) -> bool {
    non_blank(row, field).is_none()
}

fn non_blank<'a>(row: &'a CanonicalRow, field: &str) -> Option<&'a str> {
    row.get(field)
        .and_then(|v| v.as_deref())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    // exactly YYYY-MM-DD; chrono alone would accept unpadded parts
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
