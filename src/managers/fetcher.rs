//! Paginated fetcher - pulls every record of one object

use crate::utils::cancel::CancelSignal;
use crate::utils::rest_api::{Record, PRIMARY_KEY};
use crate::utils::source_ops::{RecordSource, SourceError};
use tracing::{debug, info, warn};

/// Records retrieved for one object
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<Record>,
    pub total_size: u64,
    /// Pagination stopped early because cancellation was requested
    pub cancelled: bool,
}

impl FetchOutcome {
    pub fn is_empty(&self) -> bool {
        self.total_size == 0 || self.records.is_empty()
    }
}

/// Fetch all records of `object`, ordered by its primary key when it has one.
///
/// `cancel` is checked between pages only; a page request in flight always
/// completes. `on_page(retrieved, total)` runs after every page.
pub fn fetch_all(
    source: &dyn RecordSource,
    object: &str,
    cancel: &CancelSignal,
    mut on_page: impl FnMut(usize, u64),
) -> Result<FetchOutcome, SourceError> {
    let fields = source.describe_fields(object)?;
    debug!("{} has {} fields", object, fields.len());

    let order_by = fields
        .iter()
        .any(|f| f.name == PRIMARY_KEY)
        .then_some(PRIMARY_KEY);

    let mut page = source.query_all(object, &fields, order_by)?;
    let total_size = page.total_size;

    if total_size == 0 {
        return Ok(FetchOutcome::default());
    }

    let mut records = std::mem::take(&mut page.records);
    on_page(records.len(), total_size);

    loop {
        if !page.has_more() {
            if !page.done {
                warn!(
                    "{}: page is not done but has no continuation token, stopping at {} of {} records",
                    object,
                    records.len(),
                    total_size
                );
            } else if page.next_page_token.is_some() {
                debug!("{}: final page still carries a continuation token, ignoring it", object);
            }
            break;
        }

        let Some(token) = page.next_page_token.take() else {
            break;
        };

        if cancel.is_cancelled() {
            info!(
                "{}: cancelled after {} of {} records",
                object,
                records.len(),
                total_size
            );
            return Ok(FetchOutcome {
                records,
                total_size,
                cancelled: true,
            });
        }

        page = source.query_more(&token)?;
        records.append(&mut page.records);
        info!("Retrieved {} of {} records...", records.len(), total_size);
        on_page(records.len(), total_size);
    }

    Ok(FetchOutcome {
        records,
        total_size,
        cancelled: false,
    })
}
