//! Periodic backup of the data and state files

use super::delayed_interval;
use crate::error::{MonitorError, MonitorResult};
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// Each run creates `<backup_root>/<timestamp>/`
    pub backup_root: PathBuf,
    pub data_file: PathBuf,
    pub state_file: PathBuf,
}

/// ISO-8601 timestamp made filesystem-safe (`:` and `.` become `-`)
pub fn backup_dir_name(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

/// Copy the data and state files into a fresh timestamped directory
///
/// Sources that don't exist yet (e.g. no balance computed) are skipped with
/// a warning. Any other failure aborts this run.
pub async fn create_backup(config: &BackupConfig, now: DateTime<Utc>) -> MonitorResult<PathBuf> {
    let target = config.backup_root.join(backup_dir_name(now));
    tokio::fs::create_dir_all(&target)
        .await
        .map_err(|e| MonitorError::file_access(&target, e))?;

    for source in [&config.data_file, &config.state_file] {
        copy_into(source, &target).await?;
    }

    Ok(target)
}

async fn copy_into(source: &Path, target_dir: &Path) -> MonitorResult<()> {
    let Some(name) = source.file_name() else {
        return Err(MonitorError::Config(format!(
            "backup source has no file name: {}",
            source.display()
        )));
    };

    match tokio::fs::copy(source, target_dir.join(name)).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("⚠️  Backup skipped missing file: {}", source.display());
            Ok(())
        }
        Err(e) => Err(MonitorError::file_access(source, e)),
    }
}

/// Spawn the backup timer; the first backup runs one period after startup
pub fn spawn_backup_task(config: BackupConfig, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("⏰ Starting backup scheduler (interval: {}s)", period.as_secs());
        let mut timer = delayed_interval(period);

        loop {
            timer.tick().await;
            match create_backup(&config, Utc::now()).await {
                Ok(dir) => log::info!("💾 Backup created in {}", dir.display()),
                Err(e) => log::error!("❌ Failed to create backup: {}", e),
            }
        }
    })
}
