use tracing::debug;

use super::{customer, project, Model};
use crate::error::DetectionError;

/// Fixed, ordered set of known models. Detection is first-match-wins in
/// registration order, not best-match; keep the ordering stable.
pub struct ModelRegistry {
    models: Vec<Model>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: vec![customer::model(), project::model()],
        }
    }

    pub fn model_names(&self) -> Vec<&'static str> {
        self.models.iter().map(|m| m.name).collect()
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<&Model> {
        self.models.iter().find(|m| m.name == name)
    }

    /// Auto-detect the model for a set of raw CSV headers. Returns the first
    /// registered model recognizing at least two of the headers.
    pub fn detect(&self, columns: &[String]) -> Option<&Model> {
        let lowered: Vec<String> = columns.iter().map(|c| c.trim().to_lowercase()).collect();
        let found = self.models.iter().find(|m| m.matches_columns(&lowered));
        if let Some(model) = found {
            debug!(model = model.name, "detected model for columns");
        }
        found
    }

    /// Resolve the model for a CSV, either by explicit name or by detection.
    pub fn validate(
        &self,
        columns: &[String],
        explicit_name: Option<&str>,
    ) -> Result<&Model, DetectionError> {
        match explicit_name {
            Some(name) => {
                let model = self
                    .get(name)
                    .ok_or_else(|| DetectionError::ModelNotFound(name.to_string()))?;
                let lowered: Vec<String> =
                    columns.iter().map(|c| c.trim().to_lowercase()).collect();
                if !model.matches_columns(&lowered) {
                    return Err(DetectionError::ModelMismatch(name.to_string()));
                }
                Ok(model)
            }
            None => self.detect(columns).ok_or(DetectionError::NoModelMatched),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn detects_customer_from_typical_headers() {
        let registry = ModelRegistry::new();
        let model = registry
            .detect(&cols(&["name", "email", "phone", "signupDate"]))
            .expect("should detect a model");
        assert_eq!(model.name, "customer");
    }

    #[test]
    fn detects_project_from_typical_headers() {
        let registry = ModelRegistry::new();
        let model = registry
            .detect(&cols(&["project_name", "start_date", "end_date", "budget"]))
            .expect("should detect a model");
        assert_eq!(model.name, "project");
    }

    #[test]
    fn detection_is_case_insensitive_and_trims() {
        let registry = ModelRegistry::new();
        let model = registry
            .detect(&cols(&[" Name ", "EMAIL"]))
            .expect("should detect a model");
        assert_eq!(model.name, "customer");
    }

    #[test]
    fn first_registered_match_wins_over_higher_scores() {
        // name+email match customer (2 patterns); name+status+budget match
        // project (3 patterns). Registration order decides, not score.
        let registry = ModelRegistry::new();
        let model = registry
            .detect(&cols(&["name", "email", "status", "budget"]))
            .expect("should detect a model");
        assert_eq!(model.name, "customer");
    }

    #[test]
    fn no_match_below_threshold() {
        let registry = ModelRegistry::new();
        assert!(registry.detect(&cols(&["sku", "quantity", "warehouse"])).is_none());
    }

    #[test]
    fn validate_reports_unknown_model() {
        let registry = ModelRegistry::new();
        let err = registry
            .validate(&cols(&["name", "email"]), Some("invoice"))
            .unwrap_err();
        assert_eq!(err, DetectionError::ModelNotFound("invoice".to_string()));
    }

    #[test]
    fn validate_reports_mismatched_model() {
        let registry = ModelRegistry::new();
        let err = registry
            .validate(&cols(&["sku", "quantity"]), Some("customer"))
            .unwrap_err();
        assert_eq!(err, DetectionError::ModelMismatch("customer".to_string()));
    }

    #[test]
    fn validate_without_name_falls_back_to_detection() {
        let registry = ModelRegistry::new();
        let err = registry.validate(&cols(&["sku", "quantity"]), None).unwrap_err();
        assert_eq!(err, DetectionError::NoModelMatched);

        let model = registry.validate(&cols(&["name", "email"]), None).unwrap();
        assert_eq!(model.name, "customer");
    }
}
