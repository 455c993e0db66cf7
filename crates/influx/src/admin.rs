//! Database and retention policy administration.
//!
//! Statements are plain InfluxQL and are executed through `/query`.

use async_trait::async_trait;
use migrate_core::Result;
use tracing::info;

use crate::client::InfluxClient;

/// Executes administrative statements against the target.
#[async_trait]
pub trait TargetAdmin: Send + Sync {
    async fn execute(&self, statement: &str) -> Result<()>;
}

#[async_trait]
impl TargetAdmin for InfluxClient {
    async fn execute(&self, statement: &str) -> Result<()> {
        self.query(statement).await?;
        info!(statement = statement, "Executed statement");
        Ok(())
    }
}

/// Quote an identifier for InfluxQL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

pub fn create_database_stmt(database: &str) -> String {
    format!("CREATE DATABASE {}", quote_ident(database))
}

/// `CREATE RETENTION POLICY`, optionally marked as the database default.
pub fn create_retention_policy_stmt(
    name: &str,
    database: &str,
    duration: &str,
    replication: u32,
    default: bool,
) -> String {
    let mut stmt = format!(
        "CREATE RETENTION POLICY {} ON {} DURATION {} REPLICATION {}",
        quote_ident(name),
        quote_ident(database),
        duration,
        replication
    );
    if default {
        stmt.push_str(" DEFAULT");
    }
    stmt
}

/// Make an existing retention policy the database default.
pub fn alter_retention_policy_default_stmt(name: &str, database: &str) -> String {
    format!(
        "ALTER RETENTION POLICY {} ON {} DEFAULT",
        quote_ident(name),
        quote_ident(database)
    )
}
