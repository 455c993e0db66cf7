//! InfluxDB health checks.

use tracing::{debug, error};

use crate::client::InfluxClient;

/// Check InfluxDB connection health.
pub async fn check_connection(client: &InfluxClient) -> bool {
    match client.ping().await {
        Ok(status) if status == migrate_core::limits::WRITE_SUCCESS_STATUS => {
            debug!("InfluxDB connection healthy");
            true
        }
        Ok(status) => {
            error!("InfluxDB health check returned status {}", status);
            false
        }
        Err(e) => {
            error!("InfluxDB health check failed: {}", e);
            false
        }
    }
}
