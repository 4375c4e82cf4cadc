//! Test fixtures and sample data
//!
//! API-shaped records and config templates.

use sf_backup::utils::rest_api::{PageResult, Record};
use serde_json::{json, Value};

/// Turn a JSON object literal into a record. Panics on non-objects.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected a JSON object, got {}", other),
    }
}

/// Records whose key sets differ, as returned for polymorphic lookups.
/// Columns in first-seen order: Id, Name, Phone, Owner, IsActive, Amount.
pub fn mixed_records() -> Vec<Record> {
    vec![
        record(json!({
            "attributes": {"type": "Account", "url": "/services/data/v59.0/sobjects/Account/001A"},
            "Id": "001A",
            "Name": "Acme, Inc.",
            "Phone": null,
        })),
        record(json!({
            "attributes": {"type": "Account", "url": "/services/data/v59.0/sobjects/Account/001B"},
            "Id": "001B",
            "Owner": {"attributes": {"type": "User"}, "Name": "Ada"},
            "IsActive": true,
        })),
        record(json!({
            "attributes": {"type": "Account", "url": "/services/data/v59.0/sobjects/Account/001C"},
            "Id": "001C",
            "Name": "Line\nBreak \"Quoted\"",
            "Amount": 1250.5,
        })),
    ]
}

/// Single final page holding `records`
pub fn single_page(records: Vec<Record>) -> PageResult {
    PageResult {
        total_size: records.len() as u64,
        records,
        done: true,
        next_page_token: None,
    }
}

/// Describe response body for an object with the given fields
pub fn describe_body(fields: &[&str]) -> String {
    let fields: Vec<Value> = fields.iter().map(|f| json!({"name": f, "type": "string"})).collect();
    json!({"name": "Test", "fields": fields}).to_string()
}

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
[global]
output_root = "{output_root}"
log_directory = "{log_dir}"

[connection]
instance_url = "https://test.my.salesforce.com"
access_token_file = "{token_file}"

[selections.core]
description = "Core objects"
objects = ["Account", "Contact"]
"#
}

/// Config with several selections and every connection option set
pub fn full_config_toml() -> &'static str {
    r#"
[global]
output_root = "{output_root}"
log_directory = "{log_dir}"
log_level = "debug"
log_max_files = 3

[connection]
instance_url = "https://test.my.salesforce.com/"
api_version = "60.0"
access_token_file = "{token_file}"
request_timeout_seconds = 45
include_deleted = true

[selections.core]
description = "Core objects"
objects = ["Account", "Contact"]

[selections.sales]
objects = ["Opportunity", "OpportunityLineItem", "Lead"]

[selections.custom]
description = "Custom objects"
objects = ["Invoice__c"]
"#
}

/// Fill `{placeholders}` of a template
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{}}}", key), value)
    })
}
