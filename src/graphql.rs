use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::models::Model;
use crate::pipeline::CanonicalRow;

/// Submission failures, carrying the raw diagnostic for reporting. All of
/// these are non-fatal per row; retries are the caller's responsibility.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("GraphQL errors: {0}")]
    Api(Value),

    #[error("No data returned from mutation")]
    EmptyResponse,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The write API boundary: a single `{query, variables}` endpoint returning
/// `{data}` or `{errors}`.
#[async_trait]
pub trait WriteApi: Send + Sync {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, SubmissionError>;
}

/// reqwest-backed client authenticated by a static x-api-key header.
pub struct GraphQlClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl GraphQlClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl WriteApi for GraphQlClient {
    async fn execute(&self, query: &str, variables: Value) -> Result<Value, SubmissionError> {
        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        if let Some(errors) = payload.get("errors") {
            if !errors.is_null() {
                return Err(SubmissionError::Api(errors.clone()));
            }
        }

        match payload.get("data") {
            Some(data) if !data.is_null() => Ok(data.clone()),
            _ => Err(SubmissionError::EmptyResponse),
        }
    }
}

/// Builds and executes a model's create/read operations.
///
/// On success the remote store gains exactly one new record; on failure no
/// partial state is created. There is no automatic retry.
pub struct SubmissionClient {
    api: Arc<dyn WriteApi>,
}

impl SubmissionClient {
    pub fn new(api: Arc<dyn WriteApi>) -> Self {
        Self { api }
    }

    /// Variables for the model's create mutation: the configured input
    /// fields copied from the row, blanks as nulls.
    pub fn build_variables(model: &Model, row: &CanonicalRow) -> Value {
        let mut input = serde_json::Map::new();
        for field in &model.input_fields {
            let value = row
                .get(*field)
                .and_then(|v| v.as_deref())
                .filter(|v| !v.trim().is_empty())
                .map(|v| Value::String(v.to_string()))
                .unwrap_or(Value::Null);
            input.insert(field.to_string(), value);
        }
        json!({ "input": input })
    }

    /// Submit a validated row. Returns the created record's payload.
    pub async fn submit(
        &self,
        model: &Model,
        row: &CanonicalRow,
    ) -> Result<Value, SubmissionError> {
        let variables = Self::build_variables(model, row);
        let data = self.api.execute(model.create_document, variables).await?;
        debug!(model = model.name, "submitted record");
        Self::unwrap_single(data)
    }

    /// Read a record back by id using the model's query.
    pub async fn get_record(&self, model: &Model, id: &str) -> Result<Value, SubmissionError> {
        let data = self
            .api
            .execute(model.read_document, json!({ "id": id }))
            .await?;
        Self::unwrap_single(data)
    }

    // The payload of interest lives under the operation's field name, the
    // single key of the data object.
    fn unwrap_single(data: Value) -> Result<Value, SubmissionError> {
        match data.as_object().and_then(|o| o.values().next()) {
            Some(result) if !result.is_null() => Ok(result.clone()),
            _ => Err(SubmissionError::EmptyResponse),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedApi;
    use super::*;
    use crate::models::customer;

    fn row(pairs: &[(&str, &str)]) -> CanonicalRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    #[test]
    fn variables_include_configured_fields_with_null_blanks() {
        let model = customer::model();
        let mut r = row(&[("name", "Ada"), ("email", "ada@example.com"), ("phone", "x")]);
        r.insert("signupDate".to_string(), Some("  ".to_string()));
        let vars = SubmissionClient::build_variables(&model, &r);
        assert_eq!(vars["input"]["name"], "Ada");
        assert_eq!(vars["input"]["email"], "ada@example.com");
        assert_eq!(vars["input"]["signupDate"], Value::Null);
        // phone is not an input field of the create mutation
        assert!(vars["input"].get("phone").is_none());
    }

    #[tokio::test]
    async fn submit_unwraps_the_operation_payload() {
        let model = customer::model();
        let api = Arc::new(ScriptedApi::new(vec![Ok(json!({
            "createCustomer": { "id": "c-1", "email": "ada@example.com" }
        }))]));
        let client = SubmissionClient::new(api.clone());

        let created = client
            .submit(&model, &row(&[("name", "Ada"), ("email", "ada@example.com")]))
            .await
            .unwrap();
        assert_eq!(created["id"], "c-1");

        let calls = api.calls.lock().unwrap();
        assert!(calls[0].0.contains("mutation CreateCustomer"));
    }

    #[tokio::test]
    async fn application_errors_surface_with_diagnostic() {
        let model = customer::model();
        let api = Arc::new(ScriptedApi::new(vec![Err(SubmissionError::Api(json!([
            { "message": "email already taken" }
        ])))]));
        let client = SubmissionClient::new(api);

        let err = client
            .submit(&model, &row(&[("name", "Ada"), ("email", "a@b.c")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("email already taken"));
    }

    #[tokio::test]
    async fn null_payload_is_an_empty_response() {
        let model = customer::model();
        let api = Arc::new(ScriptedApi::new(vec![Ok(json!({ "createCustomer": null }))]));
        let client = SubmissionClient::new(api);

        let err = client
            .submit(&model, &row(&[("name", "Ada"), ("email", "a@b.c")]))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::EmptyResponse));
    }

    #[tokio::test]
    async fn read_back_uses_the_models_query() {
        let model = customer::model();
        let api = Arc::new(ScriptedApi::new(vec![Ok(json!({
            "getCustomer": { "id": "c-1", "name": "Ada" }
        }))]));
        let client = SubmissionClient::new(api.clone());

        let record = client.get_record(&model, "c-1").await.unwrap();
        assert_eq!(record["name"], "Ada");

        let calls = api.calls.lock().unwrap();
        assert!(calls[0].0.contains("query GetCustomer"));
        assert_eq!(calls[0].1["id"], "c-1");
    }
}
