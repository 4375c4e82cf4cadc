//! REST data API utilities
//!
//! Thin blocking client for the describe / query / query-more endpoints.
//! Response bodies are parsed by pure functions so they can be tested
//! against captured payloads.

use crate::config::{load_access_token, ConnectionConfig};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Reserved per-record key carrying API type/url metadata, never user data
pub const ATTRIBUTES_KEY: &str = "attributes";

/// Field used to order query results across pages
pub const PRIMARY_KEY: &str = "Id";

/// One field of an object, as returned by describe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A record keeps the server's key order
pub type Record = serde_json::Map<String, Value>;

/// One page of query results
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageResult {
    pub records: Vec<Record>,
    pub total_size: u64,
    pub done: bool,
    pub next_page_token: Option<String>,
}

impl PageResult {
    /// Whether another page should be requested. A page that claims `done`
    /// is final even if it still carries a token.
    pub fn has_more(&self) -> bool {
        !self.done && self.next_page_token.is_some()
    }
}

/// Authenticated connection to one instance
pub struct RestSession {
    instance_url: String,
    api_version: String,
    access_token: String,
    include_deleted: bool,
    client: Client,
}

impl RestSession {
    /// Create a session from an already obtained access token
    pub fn new(
        instance_url: &str,
        api_version: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sf-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            instance_url: instance_url.trim_end_matches('/').to_string(),
            api_version: api_version.to_string(),
            access_token: access_token.to_string(),
            include_deleted: false,
            client,
        })
    }

    /// Create a session from the connection section of the config
    pub fn from_config(connection: &ConnectionConfig) -> Result<Self> {
        let token = load_access_token(connection)?;
        let mut session = Self::new(
            &connection.instance_url,
            &connection.api_version,
            &token,
            Duration::from_secs(connection.request_timeout_seconds),
        )?;
        session.include_deleted = connection.include_deleted;
        Ok(session)
    }

    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    fn data_url(&self, path: &str) -> String {
        format!(
            "{}/services/data/v{}/{}",
            self.instance_url, self.api_version, path
        )
    }

    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .header(ACCEPT, "application/json")
            .query(query)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        let body = response.text().context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("HTTP {}: {}", status.as_u16(), api_error_message(&body));
        }

        Ok(body)
    }
}

/// Describe an object and return its fields in declaration order
pub fn describe_fields(session: &RestSession, object: &str) -> Result<Vec<FieldDescriptor>> {
    let url = session.data_url(&format!("sobjects/{}/describe", object));
    let body = session.get(&url, &[])?;
    parse_describe(&body)
}

/// Run the initial query for an object
pub fn query(
    session: &RestSession,
    object: &str,
    fields: &[FieldDescriptor],
    order_by: Option<&str>,
) -> Result<PageResult> {
    let soql = build_soql(object, fields, order_by);
    debug!("Query: {}", soql);

    let endpoint = if session.include_deleted { "queryAll" } else { "query" };
    let url = session.data_url(endpoint);
    let body = session.get(&url, &[("q", soql.as_str())])?;
    parse_page(&body)
}

/// Fetch the page behind a continuation token (`nextRecordsUrl`)
pub fn query_more(session: &RestSession, token: &str) -> Result<PageResult> {
    let url = if token.starts_with("http://") || token.starts_with("https://") {
        token.to_string()
    } else {
        format!("{}{}", session.instance_url, token)
    };
    let body = session.get(&url, &[])?;
    parse_page(&body)
}

/// List queryable object names, sorted
pub fn list_objects(session: &RestSession) -> Result<Vec<String>> {
    let url = session.data_url("sobjects");
    let body = session.get(&url, &[])?;
    parse_object_list(&body)
}

/// Build `SELECT ... FROM ... [ORDER BY ...]`
pub fn build_soql(object: &str, fields: &[FieldDescriptor], order_by: Option<&str>) -> String {
    let columns: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    let mut soql = format!("SELECT {} FROM {}", columns.join(", "), object);
    if let Some(key) = order_by {
        soql.push_str(" ORDER BY ");
        soql.push_str(key);
    }
    soql
}

#[derive(Deserialize)]
struct DescribeResponse {
    fields: Vec<FieldDescriptor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    total_size: u64,
    done: bool,
    #[serde(default)]
    next_records_url: Option<String>,
    #[serde(default)]
    records: Vec<Record>,
}

#[derive(Deserialize)]
struct ObjectListResponse {
    sobjects: Vec<ObjectSummary>,
}

#[derive(Deserialize)]
struct ObjectSummary {
    name: String,
    #[serde(default)]
    queryable: bool,
}

/// Parse a describe response body
pub fn parse_describe(body: &str) -> Result<Vec<FieldDescriptor>> {
    let response: DescribeResponse =
        serde_json::from_str(body).context("Malformed describe response")?;
    Ok(response.fields)
}

/// Parse a query / query-more response body
pub fn parse_page(body: &str) -> Result<PageResult> {
    let response: QueryResponse =
        serde_json::from_str(body).context("Malformed query response")?;

    Ok(PageResult {
        records: response.records,
        total_size: response.total_size,
        done: response.done,
        next_page_token: response.next_records_url.filter(|t| !t.is_empty()),
    })
}

/// Parse an object listing, keeping queryable objects only
pub fn parse_object_list(body: &str) -> Result<Vec<String>> {
    let response: ObjectListResponse =
        serde_json::from_str(body).context("Malformed object listing")?;

    let mut names: Vec<String> = response
        .sobjects
        .into_iter()
        .filter(|o| o.queryable)
        .map(|o| o.name)
        .collect();
    names.sort();
    Ok(names)
}

/// Pull the human-readable message out of an API error body.
/// Errors come back as `[{"message": "...", "errorCode": "..."}]`.
fn api_error_message(body: &str) -> String {
    if let Ok(Value::Array(errors)) = serde_json::from_str::<Value>(body) {
        let messages: Vec<String> = errors
            .iter()
            .filter_map(|e| {
                let message = e.get("message")?.as_str()?;
                match e.get("errorCode").and_then(Value::as_str) {
                    Some(code) => Some(format!("{}: {}", code, message)),
                    None => Some(message.to_string()),
                }
            })
            .collect();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }
    body.trim().to_string()
}
