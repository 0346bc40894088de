//! Dependency-manifest surgery for `package.json`.
//!
//! Only the direct dependency sections are eligible for rewriting; a
//! package that appears solely in the lock tree is reported as not
//! patchable rather than silently skipped. The rest of the document is
//! preserved through the edit.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ManifestError;

/// Direct dependency sections, in lookup order.
pub const DIRECT_SECTIONS: &[&str] = &["dependencies", "devDependencies"];

/// An in-memory `package.json` tied to its on-disk path.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    document: Value,
}

impl Manifest {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ManifestError> {
        let path = path.into();
        let raw = fs::read_to_string(&path).map_err(|err| ManifestError::Read {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        let document: Value = serde_json::from_str(&raw).map_err(|err| ManifestError::Parse {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        if !document.is_object() {
            return Err(ManifestError::NotAnObject {
                path: path.display().to_string(),
            });
        }
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared version of a direct dependency, first section wins.
    pub fn declared_version(&self, package: &str) -> Option<&str> {
        DIRECT_SECTIONS.iter().find_map(|section| {
            self.document
                .get(section)
                .and_then(|deps| deps.get(package))
                .and_then(Value::as_str)
        })
    }

    pub fn is_direct_dependency(&self, package: &str) -> bool {
        self.declared_version(package).is_some()
    }

    /// Rewrite the declared version in every direct section that carries
    /// the package. Errors when the package is not a direct dependency.
    pub fn set_version(&mut self, package: &str, version: &str) -> Result<(), ManifestError> {
        let mut updated = false;
        for section in DIRECT_SECTIONS {
            if let Some(deps) = self.document.get_mut(section).and_then(Value::as_object_mut) {
                if let Some(entry) = deps.get_mut(package) {
                    *entry = Value::String(version.to_string());
                    updated = true;
                }
            }
        }
        if !updated {
            return Err(ManifestError::NotADirectDependency {
                package: package.to_string(),
            });
        }
        Ok(())
    }

    /// Persist atomically: temp file beside the manifest, then rename.
    pub fn save(&self) -> Result<(), ManifestError> {
        let parent = self.path.parent().ok_or_else(|| ManifestError::Write {
            path: self.path.display().to_string(),
            detail: "path has no parent".to_string(),
        })?;
        let mut tmp =
            tempfile::NamedTempFile::new_in(parent).map_err(|err| ManifestError::Write {
                path: self.path.display().to_string(),
                detail: err.to_string(),
            })?;
        let rendered =
            serde_json::to_string_pretty(&self.document).map_err(|err| ManifestError::Write {
                path: self.path.display().to_string(),
                detail: err.to_string(),
            })?;
        tmp.write_all(rendered.as_bytes())
            .and_then(|()| tmp.write_all(b"\n"))
            .and_then(|()| tmp.flush())
            .map_err(|err| ManifestError::Write {
                path: self.path.display().to_string(),
                detail: err.to_string(),
            })?;
        tmp.persist(&self.path).map_err(|err| ManifestError::Write {
            path: self.path.display().to_string(),
            detail: err.to_string(),
        })?;
        Ok(())
    }
}
