//! Source retrieval boundary
//!
//! The engine never performs I/O itself. Callers implement [`SourceFetcher`]
//! for whatever transport a source uses; [`fetch_sources`] runs one fetch per
//! descriptor concurrently, each under its own time budget, and keeps only
//! the payloads that arrived.
//!
//! Copyright (c) 2025 Datamorph Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::types::{SourceDescriptor, SourcePayloads};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default per-source fetch budget
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Retrieves the raw payload of one source
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch a source; `Ok(None)` means the source has no data
    async fn fetch(&self, descriptor: &SourceDescriptor) -> Result<Option<Value>>;
}

/// Fetch every source concurrently.
///
/// Failures, empty results and timeouts are logged and left out of the
/// returned map, so one source can never fail the whole run.
pub async fn fetch_sources(
    fetcher: &dyn SourceFetcher,
    descriptors: &[SourceDescriptor],
    budget: Duration,
) -> SourcePayloads {
    let fetches = descriptors.iter().map(|descriptor| async move {
        let outcome = fetch_one(fetcher, descriptor, budget).await;
        (descriptor.id.clone(), outcome)
    });

    let mut payloads = SourcePayloads::new();
    for (id, outcome) in join_all(fetches).await {
        match outcome {
            Ok(Some(payload)) => {
                payloads.insert(id, payload);
            }
            Ok(None) => debug!(source = %id, "Source returned no data"),
            Err(e) => warn!(source = %id, error = %e, "Source unavailable, continuing without it"),
        }
    }

    debug!(requested = descriptors.len(), fetched = payloads.len(), "Fetched sources");
    payloads
}

async fn fetch_one(
    fetcher: &dyn SourceFetcher,
    descriptor: &SourceDescriptor,
    budget: Duration,
) -> Result<Option<Value>> {
    match timeout(budget, fetcher.fetch(descriptor)).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            source_id: descriptor.id.clone(),
            millis: budget.as_millis() as u64,
        }),
    }
}
