#![forbid(unsafe_code)]

use crate::error::Error;
use crate::sensing::{ProcessInfo, ProcessSource};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a [`ProcessSource`] with a short-lived cache so that the polling
/// loop and concurrent IPC handlers hitting the source in the same window
/// share one snapshot instead of re-enumerating the process table.
pub struct CachedProcessSource {
    inner: Arc<dyn ProcessSource>,
    cache: Cache<(), Arc<Vec<ProcessInfo>>>,
}

impl CachedProcessSource {
    pub fn new(inner: Arc<dyn ProcessSource>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();
        Self { inner, cache }
    }
}

impl ProcessSource for CachedProcessSource {
    fn list_processes(&self) -> Result<Vec<ProcessInfo>, Error> {
        let inner = &self.inner;
        let snapshot = self
            .cache
            .try_get_with((), || inner.list_processes().map(Arc::new))
            .map_err(|err| Error::ProcessEnumeration(err.to_string()))?;
        Ok(snapshot.as_ref().clone())
    }
}
