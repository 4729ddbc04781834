use std::collections::HashMap;

use super::{CrossFieldRule, FieldSpec, FieldType, Model};

const CREATE_PROJECT: &str = "\
mutation CreateProject($input: ProjectInput!) {
  createProject(input: $input) {
    id
    name
    description
    startDate
    endDate
    status
    budget
  }
}";

const GET_PROJECT: &str = "\
query GetProject($id: ID!) {
  getProject(id: $id) {
    id
    name
    description
    startDate
    endDate
    status
    budget
    createdAt
    updatedAt
  }
}";

/// Project records. Identity for dedup is the project name, compared as-is.
pub fn model() -> Model {
    let aliases = HashMap::from([
        ("name", "name"),
        ("description", "description"),
        ("startdate", "startDate"),
        ("enddate", "endDate"),
        ("status", "status"),
        ("budget", "budget"),
        ("customerid", "customerId"),
        ("project_name", "name"),
        ("title", "name"),
        ("project_description", "description"),
        ("desc", "description"),
        ("start_date", "startDate"),
        ("end_date", "endDate"),
        ("deadline", "endDate"),
        ("project_status", "status"),
        ("state", "status"),
        ("project_budget", "budget"),
        ("cost", "budget"),
        ("customer_id", "customerId"),
    ]);

    Model {
        name: "project",
        schema: vec![
            FieldSpec { name: "name", required: true, field_type: FieldType::String },
            FieldSpec { name: "description", required: false, field_type: FieldType::String },
            FieldSpec { name: "startDate", required: false, field_type: FieldType::Date },
            FieldSpec { name: "endDate", required: false, field_type: FieldType::Date },
            FieldSpec { name: "status", required: false, field_type: FieldType::String },
            FieldSpec { name: "budget", required: false, field_type: FieldType::Number },
            FieldSpec { name: "customerId", required: false, field_type: FieldType::String },
        ],
        aliases,
        cross_field_rules: vec![CrossFieldRule::DateOrder {
            start: "startDate",
            end: "endDate",
            message: "Start date cannot be after end date",
        }],
        identity_field: Some("name"),
        create_document: CREATE_PROJECT,
        input_fields: vec!["name", "description", "startDate", "endDate", "status", "budget"],
        read_document: GET_PROJECT,
    }
}
