//! Evidentiary file storage.
//!
//! Files land at `<media>/uploads/<event dir>/<patient id>/<YYYYMMDD>/<name>`
//! and the database keeps the path relative to the media root.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use uuid::Uuid;

use crate::config::{ALLOWED_UPLOAD_EXTENSIONS, MAX_UPLOAD_BYTES, MAX_UPLOAD_MB};
use crate::models::TrackedEvent;
use crate::validation::ValidationError;

const MAX_FILENAME_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w.\-]+").unwrap());

/// Strip directory parts and anything outside `[word . -]`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.replace("..", "");
    let cleaned = cleaned.trim_start_matches('.');
    let truncated: String = cleaned.chars().take(MAX_FILENAME_CHARS).collect();
    if truncated.is_empty() {
        "document".into()
    } else {
        truncated
    }
}

/// Lowercased extension if it is one of the accepted types.
pub fn check_upload(filename: &str, size: u64) -> Result<String, ValidationError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge { max_mb: MAX_UPLOAD_MB });
    }
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if !ALLOWED_UPLOAD_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::DisallowedExtension { extension });
    }
    Ok(extension)
}

/// Media-relative directory for an event upload.
pub fn upload_dir(event: TrackedEvent, patient_id: i64, day: NaiveDate) -> String {
    format!(
        "uploads/{}/{}/{}",
        event.upload_dir(),
        patient_id,
        day.format("%Y%m%d")
    )
}

/// Validate and store `bytes`; returns the media-relative path.
pub fn store_upload(
    media_root: &Path,
    event: TrackedEvent,
    patient_id: i64,
    original_name: &str,
    bytes: &[u8],
    today: NaiveDate,
) -> Result<String, UploadError> {
    check_upload(original_name, bytes.len() as u64)?;

    let relative_dir = upload_dir(event, patient_id, today);
    let dir = media_root.join(&relative_dir);
    std::fs::create_dir_all(&dir)?;

    let mut name = sanitize_filename(original_name);
    if dir.join(&name).exists() {
        name = with_suffix(&name);
    }

    let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
    std::io::Write::write_all(&mut staged, bytes)?;
    let target: PathBuf = dir.join(&name);
    staged.persist_noclobber(&target).map_err(|e| e.error)?;

    tracing::info!(
        patient_id,
        event = event.as_str(),
        size = bytes.len(),
        path = %target.display(),
        "Stored evidentiary upload"
    );
    Ok(format!("{relative_dir}/{name}"))
}

/// Remove a stored upload that no record points to.
pub fn discard_upload(media_root: &Path, relative_path: &str) {
    let target = media_root.join(relative_path);
    match std::fs::remove_file(&target) {
        Ok(()) => tracing::info!(path = %target.display(), "Discarded unreferenced upload"),
        Err(e) => tracing::warn!(path = %target.display(), error = %e, "Failed to discard upload"),
    }
}

/// `name.ext` -> `name_<8 hex>.ext`
fn with_suffix(name: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{suffix}.{ext}"),
        _ => format!("{name}_{suffix}"),
    }
}
