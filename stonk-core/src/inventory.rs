//! Directory inventory: walk a tree and write a timestamped JSON/CSV manifest.
//!
//! Used to record what the local archive holds so it can be rebuilt later.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> InventoryError + '_ {
    move |source| InventoryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    pub name: String,
    pub relative_path: String,
    pub absolute_path: String,
    pub size_bytes: Option<u64>,
    pub modified_time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    Csv,
    #[default]
    Both,
}

impl OutputFormat {
    fn json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    fn csv(self) -> bool {
        matches!(self, Self::Csv | Self::Both)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "both" => Ok(Self::Both),
            other => Err(format!("unknown output format '{other}' (expected json, csv or both)")),
        }
    }
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    scan_time: String,
    root_directory: String,
    total_items: usize,
    items: &'a [InventoryItem],
}

/// Paths written by [`write_manifest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestPaths {
    pub json: Option<PathBuf>,
    pub csv: Option<PathBuf>,
}

/// Recursively list `root`. Directories named in `exclude_dirs` are skipped entirely.
///
/// Within each directory, subdirectories come first, then files, both by name.
pub fn scan(root: &Path, exclude_dirs: &[String]) -> Result<Vec<InventoryItem>, InventoryError> {
    let root = fs::canonicalize(root).map_err(io_err(root))?;
    if !root.is_dir() {
        return Err(InventoryError::NotADirectory(root));
    }

    let mut items = Vec::new();
    walk(&root, &root, exclude_dirs, &mut items)?;
    Ok(items)
}

fn walk(
    root: &Path,
    dir: &Path,
    exclude_dirs: &[String],
    items: &mut Vec<InventoryItem>,
) -> Result<(), InventoryError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // The root itself was checked by the caller; anything deeper is skipped.
        Err(e) if dir != root => {
            warn!(path = %dir.display(), error = %e, "could not read directory");
            return Ok(());
        }
        Err(e) => return Err(io_err(dir)(e)),
    };

    let mut dirs = Vec::new();
    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "could not read directory entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();
        match entry.file_type() {
            Ok(t) if t.is_dir() => {
                if !exclude_dirs.iter().any(|x| *x == name) {
                    dirs.push((name, entry.path()));
                }
            }
            Ok(_) => files.push((name, entry.path())),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "could not stat entry"),
        }
    }
    dirs.sort();
    files.sort();

    for (name, path) in &dirs {
        if let Some(item) = describe(root, name, path, ItemKind::Directory) {
            items.push(item);
        }
    }
    for (name, path) in &files {
        if let Some(item) = describe(root, name, path, ItemKind::File) {
            items.push(item);
        }
    }
    for (_, path) in &dirs {
        walk(root, path, exclude_dirs, items)?;
    }
    Ok(())
}

fn describe(root: &Path, name: &str, path: &Path, kind: ItemKind) -> Option<InventoryItem> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not access entry");
            return None;
        }
    };

    let relative = path.strip_prefix(root).unwrap_or(path);
    Some(InventoryItem {
        kind,
        name: name.to_string(),
        relative_path: relative.to_string_lossy().into_owned(),
        absolute_path: path.to_string_lossy().into_owned(),
        size_bytes: (kind == ItemKind::File).then(|| meta.len()),
        modified_time: meta.modified().map(iso_local).unwrap_or_default(),
    })
}

fn iso_local(t: SystemTime) -> String {
    DateTime::<Local>::from(t)
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

/// Write `directory_tree_<YYYYmmdd_HHMMSS>.{json,csv}` into `logs_dir`.
///
/// `root` is recorded as its resolved absolute path.
pub fn write_manifest(
    items: &[InventoryItem],
    root: &Path,
    logs_dir: &Path,
    format: OutputFormat,
) -> Result<ManifestPaths, InventoryError> {
    let root = fs::canonicalize(root).map_err(io_err(root))?;
    fs::create_dir_all(logs_dir).map_err(io_err(logs_dir))?;

    let now = Local::now();
    let stem = format!("directory_tree_{}", now.format("%Y%m%d_%H%M%S"));
    let mut written = ManifestPaths::default();

    if format.json() {
        let path = logs_dir.join(format!("{stem}.json"));
        let manifest = Manifest {
            scan_time: now.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            root_directory: root.to_string_lossy().into_owned(),
            total_items: items.len(),
            items,
        };
        fs::write(&path, serde_json::to_string_pretty(&manifest)?).map_err(io_err(&path))?;
        info!(path = %path.display(), "JSON manifest written");
        written.json = Some(path);
    }

    if format.csv() {
        let path = logs_dir.join(format!("{stem}.csv"));
        let mut writer = csv::Writer::from_path(&path)?;
        for item in items {
            writer.serialize(item)?;
        }
        writer.flush().map_err(io_err(&path))?;
        info!(path = %path.display(), "CSV manifest written");
        written.csv = Some(path);
    }

    let files = items.iter().filter(|i| i.kind == ItemKind::File).count();
    info!(
        total = items.len(),
        files,
        directories = items.len() - files,
        "inventory complete"
    );
    Ok(written)
}
