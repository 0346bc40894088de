//! Durable scan-report storage.
//!
//! Each saved report lands twice: once under a timestamp-qualified name
//! in `history/`, once as the canonical `latest.json` pointer. Writes
//! are atomic (temp file in the destination directory, flush + sync,
//! re-parse verification, rename), so the canonical report is always
//! either the previous valid one or the new valid one, never a partial
//! write. An advisory file lock serializes concurrent invocations.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::StoreError;
use crate::report::ScanReport;

const LATEST_FILE: &str = "latest.json";
const HISTORY_DIR: &str = "history";
const LOCK_FILE: &str = "store.lock";

/// Paths a save produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedReport {
    pub latest: PathBuf,
    pub history: PathBuf,
}

/// Filesystem-backed report store rooted at one directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    root: PathBuf,
}

impl ReportStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn latest_path(&self) -> PathBuf {
        self.root.join(LATEST_FILE)
    }

    /// Persist a validated report atomically under both the canonical
    /// and the timestamp-qualified name.
    pub fn save(&self, report: &ScanReport) -> Result<SavedReport, StoreError> {
        report.validate()?;

        fs::create_dir_all(self.root.join(HISTORY_DIR)).map_err(|err| StoreError::Io {
            path: self.root.display().to_string(),
            detail: err.to_string(),
        })?;
        let _lock = self.acquire_lock()?;

        let history = self
            .root
            .join(HISTORY_DIR)
            .join(format!("scan-{}.json", sanitize_timestamp(&report.timestamp)));
        write_report_atomic(&history, report)?;
        let latest = self.latest_path();
        write_report_atomic(&latest, report)?;
        Ok(SavedReport { latest, history })
    }

    /// Load the canonical report, if any has been saved yet.
    pub fn load_latest(&self) -> Result<Option<ScanReport>, StoreError> {
        let path = self.latest_path();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    detail: err.to_string(),
                });
            },
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| StoreError::Reparse {
                path: path.display().to_string(),
                detail: err.to_string(),
            })
    }

    /// Timestamp-qualified history files, oldest first.
    pub fn history(&self) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.root.join(HISTORY_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = fs::read_dir(&dir)
            .map_err(|err| StoreError::Io {
                path: dir.display().to_string(),
                detail: err.to_string(),
            })?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect::<Vec<_>>();
        entries.sort();
        Ok(entries)
    }

    fn acquire_lock(&self) -> Result<std::fs::File, StoreError> {
        let path = self.root.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|err| StoreError::Lock {
                path: path.display().to_string(),
                detail: err.to_string(),
            })?;
        file.lock_exclusive().map_err(|err| StoreError::Lock {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        Ok(file)
    }
}

/// Timestamps carry `:` which is unfriendly in filenames; keep the rest.
fn sanitize_timestamp(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|ch| if ch == ':' { '-' } else { ch })
        .collect()
}

fn write_report_atomic(path: &Path, report: &ScanReport) -> Result<(), StoreError> {
    let parent = path.parent().ok_or_else(|| StoreError::Io {
        path: path.display().to_string(),
        detail: "path has no parent".to_string(),
    })?;
    fs::create_dir_all(parent).map_err(|err| StoreError::Io {
        path: parent.display().to_string(),
        detail: err.to_string(),
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|err| StoreError::Io {
        path: parent.display().to_string(),
        detail: err.to_string(),
    })?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), report).map_err(|err| StoreError::Io {
        path: path.display().to_string(),
        detail: err.to_string(),
    })?;
    tmp.as_file_mut()
        .write_all(b"\n")
        .and_then(|()| tmp.as_file_mut().flush())
        .and_then(|()| tmp.as_file_mut().sync_all())
        .map_err(|err| StoreError::Io {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;

    // Verify the temp file re-parses as a valid report before it can
    // replace the canonical location.
    let written = fs::read(tmp.path()).map_err(|err| StoreError::Io {
        path: tmp.path().display().to_string(),
        detail: err.to_string(),
    })?;
    let reparsed: ScanReport =
        serde_json::from_slice(&written).map_err(|err| StoreError::Reparse {
            path: tmp.path().display().to_string(),
            detail: err.to_string(),
        })?;
    reparsed.validate().map_err(|err| StoreError::Reparse {
        path: tmp.path().display().to_string(),
        detail: err.to_string(),
    })?;

    tmp.persist(path).map_err(|err| StoreError::Io {
        path: path.display().to_string(),
        detail: err.to_string(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{Finding, Severity};

    fn report(timestamp: &str, id: &str) -> ScanReport {
        ScanReport::with_timestamp(
            timestamp.to_string(),
            vec![Finding {
                id: id.to_string(),
                title: "issue".to_string(),
                severity: Severity::High,
                risk_score: Some(7.0),
                package: "lodash".to_string(),
                version: "4.17.15".to_string(),
                fixed_in: vec!["4.17.21".to_string()],
                description: String::new(),
                infrastructure: None,
            }],
        )
    }

    #[test]
    fn saved_report_round_trips_identically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ReportStore::new(dir.path());
        let original = report("2026-08-07T10:00:00Z", "V-1");

        store.save(&original).expect("save");
        let loaded = store
            .load_latest()
            .expect("load")
            .expect("latest present");
        assert_eq!(loaded, original);
    }

    #[test]
    fn latest_pointer_tracks_newest_save_and_history_accumulates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ReportStore::new(dir.path());

        store
            .save(&report("2026-08-07T10:00:00Z", "V-1"))
            .expect("first save");
        store
            .save(&report("2026-08-07T11:00:00Z", "V-2"))
            .expect("second save");

        let latest = store.load_latest().expect("load").expect("present");
        assert_eq!(latest.findings[0].id, "V-2");
        assert_eq!(store.history().expect("history").len(), 2);
    }

    #[test]
    fn history_name_embeds_sanitized_timestamp() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ReportStore::new(dir.path());
        let saved = store
            .save(&report("2026-08-07T10:00:00Z", "V-1"))
            .expect("save");
        let name = saved
            .history
            .file_name()
            .and_then(|n| n.to_str())
            .expect("file name");
        assert_eq!(name, "scan-2026-08-07T10-00-00Z.json");
    }

    #[test]
    fn invalid_report_is_rejected_before_any_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ReportStore::new(dir.path());
        let mut bad = report("2026-08-07T10:00:00Z", "V-1");
        bad.summary.total = 42;

        let err = store.save(&bad).expect_err("invalid report must not save");
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.load_latest().expect("load").is_none());
    }

    #[test]
    fn empty_store_has_no_latest_and_no_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ReportStore::new(dir.path());
        assert!(store.load_latest().expect("load").is_none());
        assert!(store.history().expect("history").is_empty());
    }
}
