//! Paging engine
//!
//! Learns the size of a NetBox collection with a `limit=1` count request, splits it
//! into offset/limit windows and fetches the windows concurrently. Results
//! come back either all at once ([`Pager::all`]) or one page at a time in
//! completion order ([`Pager::paginate`]).

use super::client::{Args, NetboxClient, OperationCaller};
use super::error::{NetboxError, Result};
use futures::stream::{FuturesUnordered, Stream};
use serde_json::{Map, Value};

/// Default number of records per page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// One offset/limit slice of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: usize,
    pub limit: usize,
}

/// Partition `[0, total_items)` into contiguous windows of at most `page_size`.
/// Only the last window may be short.
pub fn page_windows(total_items: usize, page_size: usize) -> Vec<PageWindow> {
    let page_size = page_size.max(1);
    (0..total_items)
        .step_by(page_size)
        .map(|offset| PageWindow {
            offset,
            limit: page_size.min(total_items - offset),
        })
        .collect()
}

/// A pending page fetch with its own copy of the query parameters
#[derive(Debug, Clone)]
struct PageJob {
    window: PageWindow,
    params: Map<String, Value>,
}

/// Concurrent pager over a list-style operation
pub struct Pager<'a> {
    caller: OperationCaller<'a>,
    page_size: usize,
    /// Collection size reported by the count request
    pub total_items: usize,
    jobs: Vec<PageJob>,
}

impl<'a> Pager<'a> {
    pub fn new(caller: OperationCaller<'a>, page_size: usize) -> Self {
        Self {
            caller,
            page_size: if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size },
            total_items: 0,
            jobs: Vec::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        if page_size > 0 {
            self.page_size = page_size;
        }
        self
    }

    /// Count the collection and plan one job per window.
    ///
    /// Every job gets its own copy of `params`; sharing one parameter map
    /// across jobs would leave them all pointing at the last offset.
    async fn setup(&mut self, params: Map<String, Value>) -> Result<&mut Self> {
        let mut count_params = params.clone();
        count_params.insert("limit".into(), Value::from(1));
        count_params.remove("offset");

        let res = self
            .caller
            .call(Args::new().params(count_params))
            .await?
            .error_for_status()?;
        let body: Value = res.json()?;

        self.total_items = body
            .get("count")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| NetboxError::InvalidResponse("missing 'count' in list response".into()))?
            as usize;

        self.jobs = page_windows(self.total_items, self.page_size)
            .into_iter()
            .map(|window| {
                let mut job_params = params.clone();
                job_params.insert("limit".into(), Value::from(window.limit));
                job_params.insert("offset".into(), Value::from(window.offset));
                PageJob {
                    window,
                    params: job_params,
                }
            })
            .collect();

        tracing::debug!(
            "{}: {} items in {} pages",
            self.caller.operation_id(),
            self.total_items,
            self.jobs.len()
        );
        Ok(self)
    }

    /// Fetch every page concurrently and concatenate the records.
    ///
    /// Any failed page fails the whole call. Pages already in flight are
    /// still awaited, their results discarded.
    pub async fn all(mut self, params: Map<String, Value>) -> Result<Vec<Value>> {
        self.setup(params).await?;
        self.fetch_all().await
    }

    async fn fetch_all(&self) -> Result<Vec<Value>> {
        let pages = futures::future::join_all(
            self.jobs
                .iter()
                .cloned()
                .map(|job| fetch_page(self.caller.clone(), job)),
        )
        .await;

        let mut data = Vec::with_capacity(self.total_items);
        for page in pages {
            data.extend(page?);
        }
        Ok(data)
    }

    /// Set up, then yield one page of records at a time as each fetch completes.
    ///
    /// Dropping the stream stops consumption; requests already dispatched may
    /// still complete on the server.
    pub async fn paginate(
        mut self,
        params: Map<String, Value>,
    ) -> Result<impl Stream<Item = Result<Vec<Value>>> + 'a> {
        self.setup(params).await?;
        let caller = self.caller;
        Ok(self
            .jobs
            .into_iter()
            .map(move |job| fetch_page(caller.clone(), job))
            .collect::<FuturesUnordered<_>>())
    }
}

async fn fetch_page(caller: OperationCaller<'_>, job: PageJob) -> Result<Vec<Value>> {
    let res = caller
        .call(Args::new().params(job.params))
        .await?
        .error_for_status()
        .map_err(|err| {
            tracing::error!(
                "{}: failed to fetch page at offset {}: {}",
                caller.operation_id(),
                job.window.offset,
                err
            );
            err
        })?;
    NetboxClient::response_items(&res.json()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_windows_exact_multiple() {
        let windows = page_windows(3000, 1000);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[2], PageWindow { offset: 2000, limit: 1000 });
    }

    #[test]
    fn test_page_windows_partial_last_page() {
        let windows = page_windows(1000, 300);
        let offsets: Vec<usize> = windows.iter().map(|w| w.offset).collect();
        assert_eq!(offsets, vec![0, 300, 600, 900]);
        assert_eq!(windows[3].limit, 100);
    }

    #[test]
    fn test_page_windows_empty_collection() {
        assert!(page_windows(0, 1000).is_empty());
    }

    #[test]
    fn test_page_windows_zero_page_size_does_not_loop() {
        assert_eq!(page_windows(3, 0).len(), 3);
    }
}
