//! Point writer seam between the batching sink and the HTTP client.

use async_trait::async_trait;
use migrate_core::{OutputPoint, Result};
use tracing::trace;

use crate::client::{InfluxClient, WriteResponse};
use crate::line::encode_batch;

/// Writes one batch of points to one retention policy.
///
/// Implementations return the response for any HTTP status; the caller
/// decides whether it counts as success.
#[async_trait]
pub trait PointWriter: Send + Sync {
    async fn write_points(
        &self,
        retention_policy: &str,
        points: &[OutputPoint],
    ) -> Result<WriteResponse>;
}

#[async_trait]
impl PointWriter for InfluxClient {
    async fn write_points(
        &self,
        retention_policy: &str,
        points: &[OutputPoint],
    ) -> Result<WriteResponse> {
        let body = encode_batch(points, self.config().precision);
        trace!(
            retention_policy = retention_policy,
            count = points.len(),
            bytes = body.len(),
            "Encoded batch"
        );
        self.write(retention_policy, body).await
    }
}
