//! Gzip retention for old day logs
//!
//! `app-2026-10-01.log` → `app-2026-10-01.log.gz`, then the original is
//! removed. Removal only happens after the encoder is finished and the
//! output is synced.

use super::delayed_interval;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

fn is_log_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "log")
}

fn is_older_than(path: &Path, max_age: Duration, now: SystemTime) -> io::Result<bool> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(now
        .duration_since(modified)
        .map(|age| age > max_age)
        .unwrap_or(false))
}

/// Compress one file to `<path>.gz` and delete the original
pub fn compress_file(path: &Path) -> io::Result<PathBuf> {
    let mut gz_name = path.as_os_str().to_owned();
    gz_name.push(".gz");
    let gz_path = PathBuf::from(gz_name);

    if let Err(e) = write_gz(path, &gz_path) {
        // Never leave a truncated archive next to the original
        let _ = fs::remove_file(&gz_path);
        return Err(e);
    }

    fs::remove_file(path)?;
    Ok(gz_path)
}

fn write_gz(source: &Path, gz_path: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(source)?);
    let output = BufWriter::new(File::create(gz_path)?);
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;

    let mut output = encoder.finish()?;
    output.flush()?;
    let file = output.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Compress every `*.log` in `log_dir` last modified more than `max_age` before `now`
///
/// Per-file failures are logged and skipped. Returns the `.gz` paths written.
pub fn compress_old_logs(log_dir: &Path, max_age: Duration, now: SystemTime) -> io::Result<Vec<PathBuf>> {
    let mut compressed = Vec::new();

    for entry in fs::read_dir(log_dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                log::warn!("⚠️  Failed to read log dir entry: {}", e);
                continue;
            }
        };

        if !is_log_file(&path) {
            continue;
        }

        match is_older_than(&path, max_age, now) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                log::warn!("⚠️  Failed to stat {}: {}", path.display(), e);
                continue;
            }
        }

        match compress_file(&path) {
            Ok(gz) => {
                log::info!("🗜️  Log compressed: {}", path.display());
                compressed.push(gz);
            }
            Err(e) => log::error!("❌ Failed to compress {}: {}", path.display(), e),
        }
    }

    Ok(compressed)
}

/// Spawn the daily compressor; file work runs on the blocking pool
pub fn spawn_compress_task(log_dir: PathBuf, max_age: Duration, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("⏰ Starting log compressor (interval: {}s)", period.as_secs());
        let mut timer = delayed_interval(period);

        loop {
            timer.tick().await;
            let dir = log_dir.clone();
            let result =
                tokio::task::spawn_blocking(move || compress_old_logs(&dir, max_age, SystemTime::now())).await;

            match result {
                Ok(Ok(files)) if !files.is_empty() => {
                    log::info!("🗜️  Compressed {} old log files", files.len());
                }
                Ok(Ok(_)) => log::debug!("No logs old enough to compress"),
                Ok(Err(e)) => log::error!("❌ Log compression failed: {}", e),
                Err(e) => log::error!("❌ Log compression task aborted: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    #[test]
    fn test_old_logs_are_compressed_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("app-2026-10-01.log");
        fs::write(&log, "2026-10-01T00:00:00.000Z - [INFO] - hello\n").unwrap();

        let later = SystemTime::now() + WEEK + Duration::from_secs(60);
        let written = compress_old_logs(dir.path(), WEEK, later).unwrap();

        assert_eq!(written, vec![dir.path().join("app-2026-10-01.log.gz")]);
        assert!(!log.exists());

        let mut decoded = String::new();
        GzDecoder::new(File::open(&written[0]).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "2026-10-01T00:00:00.000Z - [INFO] - hello\n");
    }

    #[test]
    fn test_recent_and_foreign_files_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let recent = dir.path().join("app-today.log");
        let other = dir.path().join("notes.txt");
        fs::write(&recent, "x").unwrap();
        fs::write(&other, "y").unwrap();

        let written = compress_old_logs(dir.path(), WEEK, SystemTime::now()).unwrap();
        assert!(written.is_empty());
        assert!(recent.exists());

        // Non-log files are skipped even when old
        let far_future = SystemTime::now() + WEEK * 10;
        let written = compress_old_logs(dir.path(), WEEK, far_future).unwrap();
        assert_eq!(written.len(), 1);
        assert!(other.exists());
    }

    #[test]
    fn test_failed_compression_leaves_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        // Opens fine but fails on read, after the .gz was created
        let unreadable = dir.path().join("app-2026-10-01.log");
        fs::create_dir(&unreadable).unwrap();

        assert!(compress_file(&unreadable).is_err());
        assert!(unreadable.exists());
        assert!(!dir.path().join("app-2026-10-01.log.gz").exists());
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(compress_old_logs(&dir.path().join("nope"), WEEK, SystemTime::now()).is_err());
    }
}
