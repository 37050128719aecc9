//! Configuration structures for the facever tools.
//!
//! Every struct has a `Default` impl matching the behaviour of the command
//! line tools, and every field is `#[serde(default)]` so a TOML file only
//! has to name the values it overrides.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::{Error, Result};

/// Default number of validation groups for triplet lists
pub const DEFAULT_TRIPLET_VALIDATION: usize = 1000;

/// Default number of validation pairs for verification lists
pub const DEFAULT_PAIR_VALIDATION: usize = 10000;

/// Top-level configuration for list generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Directory scan settings
    pub indexer: IndexerConfig,
    /// Triplet (k-combination) generation settings
    pub triplets: TripletConfig,
    /// Verification pair generation settings
    pub pairs: PairConfig,
    /// Random seed; `None` draws one from the OS
    pub seed: Option<u64>,
    /// Directory the list files are written to
    pub output_dir: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            indexer: IndexerConfig::default(),
            triplets: TripletConfig::default(),
            pairs: PairConfig::default(),
            seed: None,
            output_dir: PathBuf::from("."),
        }
    }
}

/// Which files count as images when scanning identity folders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IndexerConfig {
    /// Accepted extensions, without the leading dot
    pub extensions: Vec<String>,
    /// Compare extensions byte-for-byte
    pub case_sensitive: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            case_sensitive: true,
        }
    }
}

impl IndexerConfig {
    /// Whether a file extension (without dot) is accepted.
    pub fn accepts(&self, ext: &str) -> bool {
        if self.case_sensitive {
            self.extensions.iter().any(|e| e == ext)
        } else {
            self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
        }
    }
}

/// Triplet list settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TripletConfig {
    /// Images per group (`k` of the k-combinations)
    pub pair_size: usize,
    /// How many groups go to the validation list
    pub validation: SplitThreshold,
}

impl Default for TripletConfig {
    fn default() -> Self {
        Self {
            pair_size: 3,
            validation: SplitThreshold::Count(DEFAULT_TRIPLET_VALIDATION),
        }
    }
}

/// Verification pair list settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// How many pairs go to the validation lists
    pub validation: SplitThreshold,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            validation: SplitThreshold::Count(DEFAULT_PAIR_VALIDATION),
        }
    }
}

/// Size of the validation subset, either absolute or as a fraction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SplitThreshold {
    /// First `n` items go to validation
    Count(usize),
    /// First `floor(total * r)` items go to validation
    Ratio(f64),
}

impl SplitThreshold {
    /// Checks that a ratio lies in `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            SplitThreshold::Ratio(r) if !(0.0..=1.0).contains(&r) => Err(Error::Config(format!(
                "Validation ratio must be between 0.0 and 1.0, got {r}"
            ))),
            _ => Ok(()),
        }
    }

    /// Number of validation items out of `total`.
    pub fn validation_len(&self, total: usize) -> usize {
        match *self {
            SplitThreshold::Count(n) => n.min(total),
            SplitThreshold::Ratio(r) => ((total as f64 * r).floor() as usize).min(total),
        }
    }
}

impl std::fmt::Display for SplitThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitThreshold::Count(n) => write!(f, "{n}"),
            SplitThreshold::Ratio(r) => write!(f, "{:.1}%", r * 100.0),
        }
    }
}

impl FromStr for SplitThreshold {
    type Err = Error;

    /// `"1000"` is a count, `"0.1"` a ratio.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let threshold = if s.contains('.') {
            let r: f64 = s
                .parse()
                .map_err(|e| Error::InvalidArgument(format!("Bad validation ratio '{s}': {e}")))?;
            SplitThreshold::Ratio(r)
        } else {
            let n: usize = s
                .parse()
                .map_err(|e| Error::InvalidArgument(format!("Bad validation count '{s}': {e}")))?;
            SplitThreshold::Count(n)
        };
        threshold.validate()?;
        Ok(threshold)
    }
}

/// Settings for cutting square face patches out of listed images
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PatchConfig {
    /// Crop box `(left, top, right, bottom)`; `None` keeps the whole image
    pub crop: Option<(u32, u32, u32, u32)>,
    /// Output size `(width, height)`; `None` keeps the cropped size
    pub resize: Option<(u32, u32)>,
    /// Convert to single-channel luma before saving
    pub gray: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            crop: None,
            resize: None,
            gray: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_generation_config() {
        let config = GenerationConfig::default();
        assert_eq!(config.seed, None);
        assert_eq!(config.triplets.pair_size, 3);
        assert_eq!(config.triplets.validation, SplitThreshold::Count(1000));
        assert_eq!(config.pairs.validation, SplitThreshold::Count(10000));
    }

    #[test]
    fn test_indexer_accepts() {
        let config = IndexerConfig::default();
        assert!(config.accepts("jpg"));
        assert!(config.accepts("png"));
        assert!(!config.accepts("JPG"));
        assert!(!config.accepts("txt"));

        let relaxed = IndexerConfig {
            case_sensitive: false,
            ..IndexerConfig::default()
        };
        assert!(relaxed.accepts("JPG"));
        assert!(relaxed.accepts("Jpeg"));
    }

    #[test]
    fn test_split_threshold_parse() {
        assert_eq!("1000".parse::<SplitThreshold>().unwrap(), SplitThreshold::Count(1000));
        assert_eq!("0.25".parse::<SplitThreshold>().unwrap(), SplitThreshold::Ratio(0.25));
        assert!("1.5".parse::<SplitThreshold>().is_err());
        assert!("many".parse::<SplitThreshold>().is_err());
    }

    #[test]
    fn test_split_threshold_len() {
        assert_eq!(SplitThreshold::Count(10).validation_len(4), 4);
        assert_eq!(SplitThreshold::Count(3).validation_len(10), 3);
        assert_eq!(SplitThreshold::Ratio(0.25).validation_len(10), 2);
        assert_eq!(SplitThreshold::Ratio(1.0).validation_len(7), 7);
        assert_eq!(SplitThreshold::Ratio(0.0).validation_len(7), 0);
    }

    #[test]
    fn test_split_threshold_toml() {
        let config: TripletConfig = toml::from_str("pair_size = 2\nvalidation = { ratio = 0.1 }").unwrap();
        assert_eq!(config.pair_size, 2);
        assert_eq!(config.validation, SplitThreshold::Ratio(0.1));
    }
}
