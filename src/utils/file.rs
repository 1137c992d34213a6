use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use anyhow::{anyhow, Result};
use flate2::read::MultiGzDecoder;
use log::debug;

pub fn is_gzipped(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 2];
    match file.read_exact(&mut buffer) {
        Ok(()) => Ok(buffer == [0x1F, 0x8B]), // Gzip magic bytes
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Opens a text input, transparently decompressing gzip.
///
/// # Arguments
///
/// * `path` - Plain or gzipped file.
///
/// # Returns
/// Buffered reader over the decoded bytes.
pub fn open_text_reader(path: &Path) -> io::Result<Box<dyn BufRead + Send>> {
    let file = File::open(path)?;
    if is_gzipped(path)? {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Resolves a configured directory: absolute paths are used as is,
/// relative ones are joined onto `base`.
pub fn resolve_dir(dir: &str, base: &Path) -> PathBuf {
    let path = PathBuf::from(dir);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Lists the regular, non-hidden files directly inside `dir`.
///
/// # Arguments
///
/// * `dir` - Input directory for one artifact collection.
///
/// # Returns
/// Sorted file paths. Sorting keeps collision reports stable between runs.
pub async fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !tokio::fs::metadata(dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(anyhow!("Input directory {} does not exist or is not a directory", dir.display()));
    }

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| anyhow!("Failed to read directory {}: {}", dir.display(), e))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !entry.file_type().await?.is_file() {
            debug!("Skipping {}", path.display());
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Builds the per-sample output path `<out_dir>/<sample_id><suffix>`.
pub fn sample_output_path(out_dir: &Path, sample_id: &str, suffix: &str) -> PathBuf {
    out_dir.join(format!("{}{}", sample_id, suffix))
}

/// Removes a per-sample output left over from an earlier run, so that only a
/// file written by the current transform can count as its result.
pub fn remove_stale_output(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale output {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Async form of `remove_stale_output`.
pub async fn remove_stale_output_async(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed stale output {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
