use std::fs::File;
use std::path::{Path, PathBuf};

use super::error::ImportError;

/// Extracts a Slack export zip to `dest_dir`. Blocking; callers run this on a
/// worker thread via `spawn_blocking`. Entries whose path would escape
/// `dest_dir` (as judged by `enclosed_name`) are skipped rather than trusted.
pub fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<(), ImportError> {
    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    std::fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            continue;
        };
        let out_path: PathBuf = dest_dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out_file = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out_file)?;
    }
    Ok(())
}

/// Top-level export files plus per-channel day files, used for the
/// `json_files_total` progress counter and as the fallback source when the
/// export archive has already been cleaned up (see `stats::count_zip_entries`).
pub fn count_json_files(extract_dir: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    for top in ["users.json", "channels.json", "groups.json", "dms.json", "mpims.json"] {
        if extract_dir.join(top).is_file() {
            total += 1;
        }
    }
    for entry in std::fs::read_dir(extract_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        for day in std::fs::read_dir(entry.path())? {
            let day = day?;
            if day.path().extension().and_then(|e| e.to_str()) == Some("json") {
                total += 1;
            }
        }
    }
    Ok(total)
}
