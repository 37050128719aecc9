//! Identity folder indexing.
//!
//! The dataset root is expected to hold one subfolder per identity:
//!
//! ```text
//! root/
//! ├── Aaron_Eckhart/
//! │   ├── 0001.jpg
//! │   └── 0002.jpg
//! ├── Abel_Pacheco/
//! │   └── ...
//! └── ...
//! ```
//!
//! Identities are numbered by the sorted folder names; that number is the
//! label written to every list file.

use std::path::{Path, PathBuf};

use facever_core::{Error, IndexerConfig, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

/// One identity folder and its images
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Folder name
    pub name: String,
    /// Absolute image paths, sorted
    pub images: Vec<PathBuf>,
}

/// Per-identity image lists, indexed by label
#[derive(Debug, Clone)]
pub struct ImageIndex {
    /// Root directory that was scanned
    pub root: PathBuf,
    /// Identities in label order
    pub identities: Vec<Identity>,
}

/// Folder count and images-per-folder bounds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSummary {
    pub folders: usize,
    pub total_images: usize,
    pub min_images: usize,
    pub max_images: usize,
}

impl ImageIndex {
    /// Scan `root` and collect the images of every identity folder.
    pub fn scan<P: AsRef<Path>>(root: P, config: &IndexerConfig) -> Result<Self> {
        let root = std::path::absolute(root.as_ref())?;
        info!("Indexing identity folders under {:?}", root);

        if !root.exists() {
            return Err(Error::NotFound(format!(
                "Directory not found: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        let mut folders: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            let path = entry.path();
            // follows symlinks, so linked identity folders keep their label
            if !path.is_dir() {
                debug!("Skipping non-folder entry {:?}", path);
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            folders.push((name, path));
        }
        folders.sort_by(|a, b| a.0.cmp(&b.0));

        if folders.is_empty() {
            return Err(Error::Dataset(format!(
                "No identity folders in {}",
                root.display()
            )));
        }

        let mut identities = Vec::with_capacity(folders.len());
        for (name, dir) in folders {
            let images = scan_identity(&dir, config)?;
            debug!("Identity '{}' (label {}): {} images", name, identities.len(), images.len());
            identities.push(Identity { name, images });
        }

        let index = Self { root, identities };
        let summary = index.summary();
        info!("Totally {} folders.", summary.folders);
        info!("{} {}", summary.min_images, summary.max_images);

        Ok(index)
    }

    /// Number of identities
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Images of the identity with the given label
    pub fn images(&self, label: usize) -> &[PathBuf] {
        &self.identities[label].images
    }

    pub fn total_images(&self) -> usize {
        self.identities.iter().map(|id| id.images.len()).sum()
    }

    pub fn summary(&self) -> IndexSummary {
        let counts = self.identities.iter().map(|id| id.images.len());
        IndexSummary {
            folders: self.identities.len(),
            total_images: self.total_images(),
            min_images: counts.clone().min().unwrap_or(0),
            max_images: counts.max().unwrap_or(0),
        }
    }
}

/// Collect the images directly inside one identity folder.
fn scan_identity(dir: &Path, config: &IndexerConfig) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            debug!("Skipping nested folder {:?}", path);
            continue;
        }

        let accepted = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| config.accepts(e))
            .unwrap_or(false);
        if !accepted {
            debug!("Skipping non-image file {:?}", path);
            continue;
        }

        images.push(path.to_path_buf());
    }

    images.sort();
    Ok(images)
}
