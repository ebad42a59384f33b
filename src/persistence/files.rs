use anyhow::{Context, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::NamedTempFile;

/// Name of the archive folder, both local and in the home directory
pub const STINT_DIR_NAME: &str = ".stint";

/// Archive documents are date-stamped: `YYYY-MM-DD.md` or `YYYY-MM-DD_label.md`
const ARCHIVE_FILE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}(_[\w\- ]+)?\.md$";

fn archive_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ARCHIVE_FILE_PATTERN).expect("archive file pattern is valid"))
}

/// Get the archive folder - an explicit override wins, then a local .stint
/// found by walking up from the current directory, then the global ~/.stint
pub fn get_stint_dir(override_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = override_dir {
        return Ok(dir.to_path_buf());
    }

    let current_dir = env::current_dir().context("Could not determine current directory")?;
    if let Some(local_dir) = find_local_stint(&current_dir) {
        return Ok(local_dir);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(STINT_DIR_NAME))
}

/// Find local .stint directory by walking up the directory tree
fn find_local_stint(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let candidate = current.join(STINT_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }

        current = current.parent()?;
    }
}

/// Create a folder (and parents). An existing folder is not an error.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    match fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to create directory: {}", dir.display()))
        }
    }
}

/// Initialize a local .stint directory in the current directory
pub fn init_local_stint() -> Result<PathBuf> {
    let current_dir = env::current_dir().context("Could not determine current directory")?;
    let stint_dir = current_dir.join(STINT_DIR_NAME);

    if stint_dir.exists() {
        anyhow::bail!("Stint directory already exists: {}", stint_dir.display());
    }

    ensure_dir(&stint_dir)?;
    Ok(stint_dir)
}

/// Default archive document name for a date
pub fn archive_file_name(date: chrono::NaiveDate) -> String {
    format!("{}_archive.md", date.format("%Y-%m-%d"))
}

/// Check if a file name follows the archive naming convention
pub fn is_archive_file_name(name: &str) -> bool {
    archive_file_regex().is_match(name)
}

/// Archive documents in a folder, sorted by name (and so by date).
/// A missing folder has none.
pub fn list_archive_files(dir: &Path) -> Result<Vec<String>> {
    let read_dir = match fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to list directory: {}", dir.display()))
        }
    };

    let mut files = Vec::new();
    for entry in read_dir {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if is_archive_file_name(name) {
                files.push(name.to_string());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Get path to the settings file inside an archive folder
pub fn settings_file(dir: &Path) -> PathBuf {
    dir.join("settings.json")
}

/// Atomically write content to a file using temp file + rename
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();
    let dir = path
        .parent()
        .context("File path has no parent directory")?;

    // Create temp file in the same directory
    let mut temp_file = NamedTempFile::new_in(dir)
        .context("Failed to create temporary file")?;

    temp_file
        .write_all(content.as_bytes())
        .context("Failed to write to temporary file")?;

    temp_file
        .as_file()
        .sync_all()
        .context("Failed to sync temporary file")?;

    // Atomically rename temp file to target
    temp_file
        .persist(path)
        .with_context(|| format!("Failed to persist file: {}", path.display()))?;

    Ok(())
}

/// Read file content, `None` if the file doesn't exist
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read file: {}", path.display())),
    }
}
