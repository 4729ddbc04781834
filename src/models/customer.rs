use std::collections::HashMap;

use super::{FieldSpec, FieldType, Model};

const CREATE_CUSTOMER: &str = "\
mutation CreateCustomer($input: CustomerInput!) {
  createCustomer(input: $input) {
    id
    name
    email
    signupDate
  }
}";

const GET_CUSTOMER: &str = "\
query GetCustomer($id: ID!) {
  getCustomer(id: $id) {
    id
    name
    email
    signupDate
    createdAt
    updatedAt
  }
}";

/// Customer records. Identity for dedup is the email address, case-folded.
pub fn model() -> Model {
    let aliases = HashMap::from([
        // canonical names, lower-cased, so headers match case-insensitively
        ("name", "name"),
        ("email", "email"),
        ("signupdate", "signupDate"),
        ("companyname", "companyName"),
        ("phone", "phone"),
        // known header variants
        ("full_name", "name"),
        ("customer_name", "name"),
        ("customer_email", "email"),
        ("customeremail", "email"),
        ("email_address", "email"),
        ("joined_on", "signupDate"),
        ("signup_date", "signupDate"),
        ("hire_date", "signupDate"),
        ("company_name", "companyName"),
        ("company", "companyName"),
        ("phone_number", "phone"),
        ("telephone", "phone"),
    ]);

    Model {
        name: "customer",
        schema: vec![
            FieldSpec { name: "name", required: true, field_type: FieldType::String },
            FieldSpec { name: "email", required: true, field_type: FieldType::Email },
            FieldSpec { name: "signupDate", required: false, field_type: FieldType::Date },
            FieldSpec { name: "companyName", required: false, field_type: FieldType::String },
            FieldSpec { name: "phone", required: false, field_type: FieldType::Phone },
        ],
        aliases,
        cross_field_rules: vec![],
        identity_field: Some("email"),
        create_document: CREATE_CUSTOMER,
        input_fields: vec!["name", "email", "signupDate"],
        read_document: GET_CUSTOMER,
    }
}
