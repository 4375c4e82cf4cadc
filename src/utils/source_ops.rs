//! Record source abstraction
//!
//! The backup engine only talks to the remote data API through
//! [`RecordSource`], so tests can drive it with [`mock::MockRecordSource`].

use super::rest_api::{self, FieldDescriptor, PageResult, RestSession};
use tracing::debug;

/// Adapter-level failures. None of these are retried here.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to describe '{object}': {message}")]
    Schema { object: String, message: String },

    #[error("Query failed for '{object}': {message}")]
    Query { object: String, message: String },

    #[error("Failed to fetch next page ({token}): {message}")]
    Pagination { token: String, message: String },

    #[error("Failed to list objects: {message}")]
    Listing { message: String },
}

/// Abstraction over the remote data API, enabling mocking in tests
pub trait RecordSource: Send + Sync {
    /// Field list of an object, in declaration order
    fn describe_fields(&self, object: &str) -> Result<Vec<FieldDescriptor>, SourceError>;

    /// First page of `SELECT fields FROM object [ORDER BY order_by]`
    fn query_all(
        &self,
        object: &str,
        fields: &[FieldDescriptor],
        order_by: Option<&str>,
    ) -> Result<PageResult, SourceError>;

    /// Page behind a continuation token
    fn query_more(&self, token: &str) -> Result<PageResult, SourceError>;

    /// Queryable object names, sorted
    fn list_objects(&self) -> Result<Vec<String>, SourceError>;
}

/// Implementation backed by the REST API
pub struct RestRecordSource {
    session: RestSession,
}

impl RestRecordSource {
    pub fn new(session: RestSession) -> Self {
        Self { session }
    }
}

impl RecordSource for RestRecordSource {
    fn describe_fields(&self, object: &str) -> Result<Vec<FieldDescriptor>, SourceError> {
        debug!("Describing {} on {}", object, self.session.instance_url());
        rest_api::describe_fields(&self.session, object).map_err(|e| SourceError::Schema {
            object: object.to_string(),
            message: format!("{:#}", e),
        })
    }

    fn query_all(
        &self,
        object: &str,
        fields: &[FieldDescriptor],
        order_by: Option<&str>,
    ) -> Result<PageResult, SourceError> {
        rest_api::query(&self.session, object, fields, order_by).map_err(|e| SourceError::Query {
            object: object.to_string(),
            message: format!("{:#}", e),
        })
    }

    fn query_more(&self, token: &str) -> Result<PageResult, SourceError> {
        rest_api::query_more(&self.session, token).map_err(|e| SourceError::Pagination {
            token: token.to_string(),
            message: format!("{:#}", e),
        })
    }

    fn list_objects(&self) -> Result<Vec<String>, SourceError> {
        rest_api::list_objects(&self.session).map_err(|e| SourceError::Listing {
            message: format!("{:#}", e),
        })
    }
}

/// Case-insensitive substring filter over object names, order kept
pub fn filter_objects(names: &[String], term: &str) -> Vec<String> {
    let term = term.trim().to_lowercase();
    names
        .iter()
        .filter(|name| name.to_lowercase().contains(&term))
        .cloned()
        .collect()
}

/// In-memory record source for tests
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use crate::utils::rest_api::{Record, ATTRIBUTES_KEY};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Recorded source call
    #[derive(Clone, Debug, PartialEq)]
    pub enum SourceCall {
        Describe { object: String },
        QueryAll { object: String, order_by: Option<String> },
        QueryMore { token: String },
        ListObjects,
    }

    /// Callback run when the initial query of an object is issued
    pub type QueryHook = Arc<dyn Fn() + Send + Sync>;

    #[derive(Clone, Default)]
    struct MockObject {
        fields: Vec<FieldDescriptor>,
        pages: Vec<PageResult>,
        fail_describe: bool,
        fail_query: bool,
        fail_page: Option<usize>,
    }

    /// Mock record source for testing
    #[derive(Clone, Default)]
    pub struct MockRecordSource {
        /// Recorded calls
        pub calls: Arc<Mutex<Vec<SourceCall>>>,
        objects: Arc<Mutex<HashMap<String, MockObject>>>,
        /// token -> (object, page index)
        tokens: Arc<Mutex<HashMap<String, (String, usize)>>>,
        hooks: Arc<Mutex<HashMap<String, QueryHook>>>,
        fail_listing: Arc<Mutex<bool>>,
    }

    impl MockRecordSource {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `records` for `object`, split into pages of `page_size`
        pub fn with_object(
            self,
            object: &str,
            fields: &[&str],
            records: Vec<Record>,
            page_size: usize,
        ) -> Self {
            let total = records.len() as u64;
            let chunks: Vec<Vec<Record>> = if records.is_empty() {
                vec![Vec::new()]
            } else {
                records
                    .chunks(page_size.max(1))
                    .map(|c| c.to_vec())
                    .collect()
            };
            let last = chunks.len() - 1;

            let pages = chunks
                .into_iter()
                .enumerate()
                .map(|(i, records)| PageResult {
                    records,
                    total_size: total,
                    done: i == last,
                    next_page_token: (i != last).then(|| page_token(object, i + 1)),
                })
                .collect();

            self.with_pages(object, fields, pages)
        }

        /// Serve an object that has no records
        pub fn with_empty_object(self, object: &str, fields: &[&str]) -> Self {
            self.with_object(object, fields, Vec::new(), 1)
        }

        /// Serve hand-built pages. Page `i` is reachable through
        /// [`page_token`]`(object, i)` for `i >= 1`.
        pub fn with_pages(self, object: &str, fields: &[&str], pages: Vec<PageResult>) -> Self {
            {
                let mut tokens = self.tokens.lock().unwrap();
                for i in 1..pages.len() {
                    tokens.insert(page_token(object, i), (object.to_string(), i));
                }
            }
            self.objects.lock().unwrap().insert(
                object.to_string(),
                MockObject {
                    fields: fields.iter().map(|f| FieldDescriptor::new(*f)).collect(),
                    pages,
                    ..Default::default()
                },
            );
            self
        }

        /// Configure describe to fail for an object
        pub fn with_failing_describe(self, object: &str) -> Self {
            self.update(object, |o| o.fail_describe = true);
            self
        }

        /// Configure the initial query to fail for an object
        pub fn with_failing_query(self, object: &str) -> Self {
            self.update(object, |o| o.fail_query = true);
            self
        }

        /// Configure fetching page `index` (1-based continuation) to fail
        pub fn with_failing_page(self, object: &str, index: usize) -> Self {
            self.update(object, |o| o.fail_page = Some(index));
            self
        }

        /// Configure the object listing to fail
        pub fn with_failing_listing(self) -> Self {
            *self.fail_listing.lock().unwrap() = true;
            self
        }

        /// Run `hook` when the initial query of `object` is issued
        pub fn with_query_hook(self, object: &str, hook: impl Fn() + Send + Sync + 'static) -> Self {
            self.hooks
                .lock()
                .unwrap()
                .insert(object.to_string(), Arc::new(hook));
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<SourceCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Check if describe was called for an object
        pub fn described(&self, object: &str) -> bool {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .any(|c| matches!(c, SourceCall::Describe { object: o } if o == object))
        }

        /// Number of continuation pages requested
        pub fn query_more_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, SourceCall::QueryMore { .. }))
                .count()
        }

        fn update(&self, object: &str, f: impl FnOnce(&mut MockObject)) {
            let mut objects = self.objects.lock().unwrap();
            f(objects.entry(object.to_string()).or_default());
        }

        fn record_call(&self, call: SourceCall) {
            self.calls.lock().unwrap().push(call);
        }

        fn object(&self, object: &str) -> Option<MockObject> {
            self.objects.lock().unwrap().get(object).cloned()
        }
    }

    impl RecordSource for MockRecordSource {
        fn describe_fields(&self, object: &str) -> Result<Vec<FieldDescriptor>, SourceError> {
            self.record_call(SourceCall::Describe {
                object: object.to_string(),
            });
            match self.object(object) {
                Some(o) if !o.fail_describe => Ok(o.fields),
                Some(_) => Err(SourceError::Schema {
                    object: object.to_string(),
                    message: "Mock describe failure".to_string(),
                }),
                None => Err(SourceError::Schema {
                    object: object.to_string(),
                    message: format!("INVALID_TYPE: sObject type '{}' is not supported", object),
                }),
            }
        }

        fn query_all(
            &self,
            object: &str,
            _fields: &[FieldDescriptor],
            order_by: Option<&str>,
        ) -> Result<PageResult, SourceError> {
            self.record_call(SourceCall::QueryAll {
                object: object.to_string(),
                order_by: order_by.map(String::from),
            });

            let hook = self.hooks.lock().unwrap().get(object).cloned();
            if let Some(hook) = hook {
                hook();
            }

            let o = self.object(object).ok_or_else(|| SourceError::Query {
                object: object.to_string(),
                message: "Unknown object".to_string(),
            })?;
            if o.fail_query {
                return Err(SourceError::Query {
                    object: object.to_string(),
                    message: "Mock query failure".to_string(),
                });
            }
            o.pages.first().cloned().ok_or_else(|| SourceError::Query {
                object: object.to_string(),
                message: "No pages configured".to_string(),
            })
        }

        fn query_more(&self, token: &str) -> Result<PageResult, SourceError> {
            self.record_call(SourceCall::QueryMore {
                token: token.to_string(),
            });

            let stale = || SourceError::Pagination {
                token: token.to_string(),
                message: "INVALID_QUERY_LOCATOR".to_string(),
            };

            let (object, index) = self.tokens.lock().unwrap().get(token).cloned().ok_or_else(stale)?;
            let o = self.object(&object).ok_or_else(stale)?;
            if o.fail_page == Some(index) {
                return Err(stale());
            }
            o.pages.get(index).cloned().ok_or_else(stale)
        }

        fn list_objects(&self) -> Result<Vec<String>, SourceError> {
            self.record_call(SourceCall::ListObjects);
            if *self.fail_listing.lock().unwrap() {
                return Err(SourceError::Listing {
                    message: "Mock listing failure".to_string(),
                });
            }
            let mut names: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
            names.sort();
            Ok(names)
        }
    }

    /// Continuation token the mock hands out for page `index` of `object`
    pub fn page_token(object: &str, index: usize) -> String {
        format!("/services/data/v59.0/query/{}-{}", object, index)
    }

    /// Generate `count` records shaped like API output, `attributes` first
    pub fn sample_records(object: &str, count: usize) -> Vec<Record> {
        (0..count)
            .map(|i| {
                let value = json!({
                    ATTRIBUTES_KEY: {
                        "type": object,
                        "url": format!("/services/data/v59.0/sobjects/{}/{:015}", object, i),
                    },
                    "Id": format!("{:015}", i),
                    "Name": format!("{} {}", object, i),
                });
                match value {
                    Value::Object(map) => map,
                    _ => Record::new(),
                }
            })
            .collect()
    }
}
