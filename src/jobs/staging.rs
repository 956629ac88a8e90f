//! Local preparation of job payloads before upload.
//!
//! Directory payloads are copied into a temporary directory with excluded
//! entries filtered out, mirroring how the upload should look on the stage.
//! Patterns match individual path components, so `__pycache__` prunes that
//! directory at any depth and `*.pyc` drops matching files everywhere.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::error::StagingError;
use super::request::Payload;

/// Compiled exclusion patterns.
#[derive(Clone, Debug)]
pub struct ExcludePatterns {
    patterns: Vec<String>,
    set: GlobSet,
}

impl ExcludePatterns {
    /// Compiles glob patterns; blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`globset::Error`] when a pattern is not a valid glob.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let trimmed = pattern.as_ref().trim();
            if trimmed.is_empty() {
                continue;
            }
            builder.add(Glob::new(trimmed)?);
            kept.push(trimmed.to_owned());
        }
        Ok(Self {
            patterns: kept,
            set: builder.build()?,
        })
    }

    /// Patterns in the order they were supplied.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a single file or directory name is excluded.
    #[must_use]
    pub fn excludes_name(&self, name: &str) -> bool {
        self.set.is_match(name)
    }

    /// Whether any component of a relative path is excluded.
    #[must_use]
    pub fn excludes_path(&self, relative: &Utf8Path) -> bool {
        relative
            .components()
            .any(|component| self.excludes_name(component.as_str()))
    }
}

/// A payload ready for upload. Dropping it removes any temporary copy.
#[derive(Debug)]
pub struct StagedPayload {
    path: Utf8PathBuf,
    files: usize,
    _workspace: Option<TempDir>,
}

impl StagedPayload {
    /// Local path to upload.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Number of files that will be uploaded.
    #[must_use]
    pub const fn file_count(&self) -> usize {
        self.files
    }
}

/// Prepares `payload` for upload.
///
/// # Errors
///
/// Returns [`StagingError`] when the temporary copy cannot be made.
pub fn stage_payload(
    payload: &Payload,
    excludes: &ExcludePatterns,
) -> Result<StagedPayload, StagingError> {
    match payload {
        Payload::File { path } => Ok(StagedPayload {
            path: path.clone(),
            files: 1,
            _workspace: None,
        }),
        Payload::Directory { root, .. } => copy_filtered(root, excludes),
    }
}

fn copy_filtered(
    root: &Utf8Path,
    excludes: &ExcludePatterns,
) -> Result<StagedPayload, StagingError> {
    let io_error = |path: &Utf8Path, err: &dyn std::fmt::Display| StagingError {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let workspace = tempfile::Builder::new()
        .prefix("snowlift-stage-")
        .tempdir()
        .map_err(|err| io_error(root, &err))?;
    let target_root = Utf8PathBuf::from_path_buf(workspace.path().to_path_buf()).map_err(|raw| {
        StagingError {
            path: root.to_path_buf(),
            message: format!("temporary directory {} is not UTF-8", raw.display()),
        }
    })?;

    let source =
        Dir::open_ambient_dir(root, ambient_authority()).map_err(|err| io_error(root, &err))?;
    let target = Dir::open_ambient_dir(&target_root, ambient_authority())
        .map_err(|err| io_error(&target_root, &err))?;

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .file_name()
                    .to_str()
                    .is_none_or(|name| !excludes.excludes_name(name))
        });

    let mut files = 0_usize;
    for item in walker {
        let entry = item.map_err(|err| io_error(root, &err))?;
        if entry.depth() == 0 {
            continue;
        }
        let absolute = Utf8Path::from_path(entry.path()).ok_or_else(|| StagingError {
            path: root.to_path_buf(),
            message: format!("{} is not valid UTF-8", entry.path().display()),
        })?;
        let relative = absolute
            .strip_prefix(root)
            .map_err(|err| io_error(absolute, &err))?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            target
                .create_dir_all(relative)
                .map_err(|err| io_error(relative, &err))?;
        } else if file_type.is_file() {
            source
                .copy(relative, &target, relative)
                .map_err(|err| io_error(absolute, &err))?;
            files += 1;
        } else {
            warn!(path = %absolute, "skipping non-regular file in job payload");
        }
    }

    debug!(root = %root, staged = %target_root, files, "staged directory payload");
    Ok(StagedPayload {
        path: target_root,
        files,
        _workspace: Some(workspace),
    })
}
