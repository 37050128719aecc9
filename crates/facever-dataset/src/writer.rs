//! Flat `path label` list files.
//!
//! Lines are joined with `\n` and the last line has no terminator, which is
//! what the image-data readers on the training side expect.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use facever_core::{Result, SplitThreshold};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::sampler::{ImageGroup, VerificationPair};
use crate::split::Split;

pub const TRAIN_TRIPLETS_FILE: &str = "train_triplets.txt";
pub const VALID_TRIPLETS_FILE: &str = "valid_triplets.txt";
pub const PAIR_TRAIN_FILE: &str = "ident_verif_train.txt";
pub const PAIR_TRAIN_PARTNER_FILE: &str = "ident_verif_train_p.txt";
pub const PAIR_TEST_FILE: &str = "ident_verif_test.txt";
pub const PAIR_TEST_PARTNER_FILE: &str = "ident_verif_test_p.txt";
pub const MANIFEST_FILE: &str = "split_info.json";

/// `"{path} {label}"`
pub fn format_line(path: &Path, label: usize) -> String {
    format!("{} {}", path.display(), label)
}

/// Write `lines` joined by newlines, replacing any existing file.
pub fn write_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.write_all(b"\n")?;
        }
        out.write_all(line.as_ref().as_bytes())?;
    }
    out.flush()?;
    Ok(())
}

/// Expand groups into one line per image.
fn group_lines(groups: &[ImageGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|g| g.paths.iter().map(move |p| format_line(p, g.label)))
        .collect()
}

/// Train/validation triplet lists
pub struct TripletLists<'a> {
    pub split: &'a Split<ImageGroup>,
}

impl TripletLists<'_> {
    /// Writes `train_triplets.txt` and `valid_triplets.txt` into `dir`.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let train = dir.join(TRAIN_TRIPLETS_FILE);
        let valid = dir.join(VALID_TRIPLETS_FILE);
        write_lines(&train, &group_lines(&self.split.train))?;
        write_lines(&valid, &group_lines(&self.split.validation))?;

        info!(
            "Wrote {} train and {} validation groups to {:?}",
            self.split.train.len(),
            self.split.validation.len(),
            dir
        );
        Ok(vec![train, valid])
    }
}

/// Train/test verification lists; each anchor file has a `_p` partner file
pub struct PairLists<'a> {
    pub split: &'a Split<VerificationPair>,
}

impl PairLists<'_> {
    fn write_side(pairs: &[VerificationPair], anchors: &Path, partners: &Path) -> Result<()> {
        let anchor_lines: Vec<String> = pairs
            .iter()
            .map(|p| format_line(&p.anchor, p.anchor_label))
            .collect();
        let partner_lines: Vec<String> = pairs
            .iter()
            .map(|p| format_line(&p.other, p.other_label))
            .collect();
        write_lines(anchors, &anchor_lines)?;
        write_lines(partners, &partner_lines)
    }

    /// Writes the four `ident_verif_*` files into `dir`.
    pub fn write(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let files = vec![
            dir.join(PAIR_TRAIN_FILE),
            dir.join(PAIR_TRAIN_PARTNER_FILE),
            dir.join(PAIR_TEST_FILE),
            dir.join(PAIR_TEST_PARTNER_FILE),
        ];
        Self::write_side(&self.split.train, &files[0], &files[1])?;
        Self::write_side(&self.split.validation, &files[2], &files[3])?;

        info!(
            "Wrote {} train and {} test pairs to {:?}",
            self.split.train.len(),
            self.split.validation.len(),
            dir
        );
        Ok(files)
    }
}

/// Metadata saved next to the generated lists
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitManifest {
    /// `"triplets"` or `"pairs"`
    pub kind: String,
    pub source: PathBuf,
    pub seed: Option<u64>,
    /// Group size for triplet lists
    pub pair_size: Option<usize>,
    pub validation: SplitThreshold,
    pub identities: usize,
    pub images: usize,
    pub train_count: usize,
    pub validation_count: usize,
    pub files: Vec<PathBuf>,
}

impl SplitManifest {
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facever_core::SplitThreshold;
    use std::fs;
    use tempfile::TempDir;

    fn group(label: usize, names: &[&str]) -> ImageGroup {
        ImageGroup {
            paths: names.iter().map(|n| PathBuf::from(format!("/faces/{n}"))).collect(),
            label,
        }
    }

    #[test]
    fn test_format_line() {
        assert_eq!(format_line(Path::new("/faces/a b/1.jpg"), 12), "/faces/a b/1.jpg 12");
    }

    #[test]
    fn test_write_lines_no_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.txt");
        write_lines(&path, &["a 0", "b 1"]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a 0\nb 1");

        write_lines::<&str>(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_triplet_lists() {
        let dir = TempDir::new().unwrap();
        let split = Split {
            train: vec![group(0, &["a1", "a2", "a3"]), group(2, &["c1", "c2", "c3"])],
            validation: vec![group(1, &["b1", "b2", "b3"])],
        };

        let files = TripletLists { split: &split }.write(dir.path()).unwrap();
        assert_eq!(files.len(), 2);

        let train = fs::read_to_string(dir.path().join(TRAIN_TRIPLETS_FILE)).unwrap();
        let lines: Vec<_> = train.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "/faces/a1 0");
        assert_eq!(lines[5], "/faces/c3 2");

        let valid = fs::read_to_string(dir.path().join(VALID_TRIPLETS_FILE)).unwrap();
        assert_eq!(valid, "/faces/b1 1\n/faces/b2 1\n/faces/b3 1");
    }

    #[test]
    fn test_pair_lists_are_aligned() {
        let dir = TempDir::new().unwrap();
        let pair = |a: &str, al, o: &str, ol| VerificationPair {
            anchor: PathBuf::from(a),
            anchor_label: al,
            other: PathBuf::from(o),
            other_label: ol,
        };
        let split = Split {
            train: vec![pair("x1", 0, "x2", 0), pair("x1", 0, "y1", 1)],
            validation: vec![pair("y1", 1, "z1", 2)],
        };

        PairLists { split: &split }.write(dir.path()).unwrap();

        let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read(PAIR_TRAIN_FILE), "x1 0\nx1 0");
        assert_eq!(read(PAIR_TRAIN_PARTNER_FILE), "x2 0\ny1 1");
        assert_eq!(read(PAIR_TEST_FILE), "y1 1");
        assert_eq!(read(PAIR_TEST_PARTNER_FILE), "z1 2");
    }

    #[test]
    fn test_manifest_roundtrip() {
        let dir = TempDir::new().unwrap();
        let manifest = SplitManifest {
            kind: "triplets".to_string(),
            source: PathBuf::from("/faces"),
            seed: Some(42),
            pair_size: Some(3),
            validation: SplitThreshold::Count(1000),
            identities: 10,
            images: 55,
            train_count: 0,
            validation_count: 120,
            files: vec![],
        };
        let path = manifest.write(dir.path()).unwrap();
        let loaded: SplitManifest =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(loaded, manifest);
    }
}
