//! Network seam.

use async_trait::async_trait;

use crate::error::SwResult;
use crate::fetch::{FetchRequest, FetchResponse};

/// Performs requests on behalf of the worker.
///
/// `Err` means the request never produced a response (offline, DNS failure,
/// connection reset). HTTP error statuses come back as `Ok` responses.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> SwResult<FetchResponse>;
}
