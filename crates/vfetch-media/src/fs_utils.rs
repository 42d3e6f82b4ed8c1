//! Filesystem utilities for moving downloaded files into place.
//!
//! Scratch directories may live on a different filesystem than the job
//! store, so moves fall back to copy-and-delete on EXDEV.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};
use crate::sanitize::sanitize_filename;

/// Suffixes yt-dlp uses for unfinished or intermediate files.
const SCRATCH_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp", ".tmp"];

/// Check whether a file name belongs to yt-dlp's intermediate output.
pub fn is_scratch_file(name: &str) -> bool {
    SCRATCH_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
        || name.contains(".part-Frag")
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// This function first attempts a fast rename. If that fails with EXDEV
/// (cross-device link error), it falls back to copy-and-delete.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

/// Copy file to destination (via temp file) then delete source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    // Best effort: the scratch directory is removed afterwards anyway
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

/// Move produced files into `dest_dir` under sanitized, unique names.
///
/// Names already present in `dest_dir` or listed in `reserved` get a
/// `_1`, `_2`, ... suffix before the extension. Returns the final names in
/// the order of `files`.
pub async fn collect_outputs(
    files: &[PathBuf],
    dest_dir: &Path,
    reserved: &[&str],
) -> MediaResult<Vec<String>> {
    fs::create_dir_all(dest_dir).await?;

    let mut taken: HashSet<String> = reserved.iter().map(|s| s.to_string()).collect();
    let mut names = Vec::with_capacity(files.len());

    for src in files {
        let original = src
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| MediaError::FileNotFound(src.clone()))?;

        let name = unique_name(&sanitize_filename(&original), dest_dir, &taken);
        move_file(src, dest_dir.join(&name)).await?;

        taken.insert(name.clone());
        names.push(name);
    }

    Ok(names)
}

fn unique_name(candidate: &str, dest_dir: &Path, taken: &HashSet<String>) -> String {
    let is_free = |name: &str| !taken.contains(name) && !dest_dir.join(name).exists();

    if is_free(candidate) {
        return candidate.to_string();
    }

    let (stem, ext) = match candidate.rfind('.') {
        Some(idx) if idx > 0 => (&candidate[..idx], &candidate[idx..]),
        _ => (candidate, ""),
    };

    let mut counter = 1;
    loop {
        let name = format!("{}_{}{}", stem, counter, ext);
        if is_free(&name) {
            return name;
        }
        counter += 1;
    }
}
