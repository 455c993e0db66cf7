//! Target preparation: database and retention policies.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use influx_client::admin::{
    alter_retention_policy_default_stmt, create_database_stmt, create_retention_policy_stmt,
    TargetAdmin,
};
use migrate_core::limits::MIN_POLICY_DURATION_SECS;
use migrate_core::{retention_policy_name, Error, Result};
use tokio::task::JoinSet;
use tracing::{info, warn};
use whisper_archive::WhisperFile;

use crate::config::MigrationConfig;
use crate::discovery::find_archive_files;
use crate::limiter::ConcurrencyLimiter;

/// Create the database and one retention policy per archive retention found
/// under `root`.
///
/// Returns the names of the policies created, which seed the sink's batch
/// routing. Retentions shorter than an hour are below InfluxDB's minimum
/// policy duration and get no policy; their points go to the default batch.
/// Does nothing unless `create_database_and_policies` is set.
/// `confirm` is asked before each change when `interactive_confirm` is set;
/// a `false` answer aborts with [`Error::Aborted`].
pub async fn prepare_target<F>(
    config: &MigrationConfig,
    admin: &dyn TargetAdmin,
    root: &Path,
    mut confirm: F,
) -> Result<Vec<String>>
where
    F: FnMut(&str) -> bool,
{
    if !config.create_database_and_policies {
        return Ok(Vec::new());
    }

    let database = config.database.as_str();
    if database.is_empty() {
        return Err(Error::config("migration.database is empty"));
    }

    let mut ask = |question: String| -> Result<()> {
        if config.interactive_confirm && !confirm(&question) {
            return Err(Error::aborted(question));
        }
        Ok(())
    };

    ask(format!("Create database {:?}?", database))?;
    admin.execute(&create_database_stmt(database)).await?;

    let retentions = scan_retentions(root, config.max_concurrent_files).await?;
    let min = Duration::from_secs(MIN_POLICY_DURATION_SECS);
    let (kept, short): (Vec<Duration>, Vec<Duration>) =
        retentions.into_iter().partition(|r| *r >= min);
    if !short.is_empty() {
        let skipped: Vec<String> = short.into_iter().map(retention_policy_name).collect();
        warn!(
            retentions = ?skipped,
            "Retentions below 1h get no policy, their points use the default policy"
        );
    }
    let names: Vec<String> = kept.into_iter().map(retention_policy_name).collect();
    info!(policies = ?names, "Found archive retentions");

    if !names.is_empty() {
        ask(format!(
            "Create retention policies {} on {:?}?",
            names.join(", "),
            database
        ))?;
    }

    let mut created = Vec::with_capacity(names.len() + 1);
    for name in &names {
        admin
            .execute(&create_retention_policy_stmt(
                name,
                database,
                name,
                config.replication_factor,
                false,
            ))
            .await?;
        created.push(name.clone());
    }

    let default = config.default_retention_policy.as_str();
    if !default.is_empty() {
        if created.iter().any(|n| n == default) {
            admin
                .execute(&alter_retention_policy_default_stmt(default, database))
                .await?;
        } else {
            let duration = config.default_duration()?.ok_or_else(|| {
                Error::config(format!(
                    "migration.default_duration is required to create policy {:?}",
                    default
                ))
            })?;
            admin
                .execute(&create_retention_policy_stmt(
                    default,
                    database,
                    &retention_policy_name(duration),
                    config.replication_factor,
                    true,
                ))
                .await?;
            created.push(default.to_string());
        }
        info!(policy = default, "Set default retention policy");
    }

    Ok(created)
}

/// Distinct archive retentions across all files, read header-only.
///
/// Unreadable files are logged and skipped.
async fn scan_retentions(root: &Path, max_concurrent: usize) -> Result<BTreeSet<Duration>> {
    let root = root.to_path_buf();
    let files = tokio::task::spawn_blocking(move || find_archive_files(&root))
        .await
        .map_err(|e| Error::internal(format!("discovery task failed: {}", e)))??;

    let limiter = ConcurrencyLimiter::new(max_concurrent);
    let mut scans = JoinSet::new();
    let mut retentions = BTreeSet::new();

    for path in files {
        let permit = limiter.acquire().await?;
        scans.spawn_blocking(move || {
            let _permit = permit;
            let header = WhisperFile::read_header(&path);
            (path, header)
        });
    }

    while let Some(joined) = scans.join_next().await {
        match joined {
            Ok((_, Ok(header))) => {
                retentions.extend(header.archives.iter().map(|a| a.retention()));
            }
            Ok((path, Err(e))) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file");
            }
            Err(e) => warn!(error = %e, "Header scan task failed"),
        }
    }

    Ok(retentions)
}
