//! Pair and triplet sampling over an [`ImageIndex`].
//!
//! Two strategies are provided:
//!
//! - [`generate_groups`]: every k-combination of images inside each identity,
//!   labeled with the identity index. With `k = 3` these are the anchor /
//!   positive / positive groups consumed by the sampling triplet loss, which
//!   mines negatives online.
//! - [`generate_pairs`]: one positive and one negative partner per image,
//!   for verification training.
//!
//! Both shuffle their output so the validation split taken from the front
//! of the list is a random sample.

use std::path::PathBuf;

use facever_core::{Error, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::indexer::ImageIndex;

/// `k` images of one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageGroup {
    pub paths: Vec<PathBuf>,
    pub label: usize,
}

/// An anchor image and the partner it is compared against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPair {
    pub anchor: PathBuf,
    pub anchor_label: usize,
    pub other: PathBuf,
    pub other_label: usize,
}

impl VerificationPair {
    /// Both images show the same identity
    pub fn is_positive(&self) -> bool {
        self.anchor_label == self.other_label
    }
}

/// Build the RNG used for sampling; a fixed seed makes the lists reproducible.
pub fn sampler_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Binomial coefficient C(n, k), `None` on overflow.
pub fn combination_count(n: usize, k: usize) -> Option<usize> {
    if k > n {
        return Some(0);
    }
    let k = k.min(n - k);
    let mut acc: usize = 1;
    for i in 0..k {
        // acc * (n - i) / (i + 1) stays an integer at every step
        acc = acc.checked_mul(n - i)? / (i + 1);
    }
    Some(acc)
}

/// Lexicographic k-combinations of `0..n`, in the same order as Python's
/// `itertools.combinations`.
pub struct Combinations {
    n: usize,
    indices: Vec<usize>,
    first: bool,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: if k > n { Vec::new() } else { (0..k).collect() },
            first: true,
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.first {
            self.first = false;
            return Some(self.indices.clone());
        }

        let k = self.indices.len();
        // rightmost position that can still be advanced
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                return None;
            }
            i -= 1;
            if self.indices[i] != i + self.n - k {
                break;
            }
        }

        self.indices[i] += 1;
        for j in i + 1..k {
            self.indices[j] = self.indices[j - 1] + 1;
        }
        Some(self.indices.clone())
    }
}

/// All k-combinations of images within each identity, shuffled.
pub fn generate_groups<R: Rng + ?Sized>(
    index: &ImageIndex,
    k: usize,
    rng: &mut R,
) -> Result<Vec<ImageGroup>> {
    if k == 0 {
        return Err(Error::InvalidArgument(
            "Group size must be at least 1".to_string(),
        ));
    }

    let mut total: usize = 0;
    for identity in &index.identities {
        let count = combination_count(identity.images.len(), k).ok_or_else(|| {
            Error::Dataset(format!(
                "Too many {}-combinations for identity '{}' ({} images)",
                k,
                identity.name,
                identity.images.len()
            ))
        })?;
        total = total.checked_add(count).ok_or_else(|| {
            Error::Dataset(format!("Total number of {k}-combinations overflows"))
        })?;
    }

    let mut groups = Vec::with_capacity(total);
    for (label, identity) in index.identities.iter().enumerate() {
        if identity.images.len() < k {
            debug!("{} images and 0 pairs in {}", identity.images.len(), label);
            continue;
        }
        let before = groups.len();
        for combo in Combinations::new(identity.images.len(), k) {
            groups.push(ImageGroup {
                paths: combo.iter().map(|&i| identity.images[i].clone()).collect(),
                label,
            });
        }
        debug!(
            "{} images and {} pairs in {}",
            identity.images.len(),
            groups.len() - before,
            label
        );
    }

    info!("Totally {} triplets", groups.len());
    groups.shuffle(rng);

    Ok(groups)
}

/// One positive and one negative pair per image, shuffled.
pub fn generate_pairs<R: Rng + ?Sized>(
    index: &ImageIndex,
    rng: &mut R,
) -> Result<Vec<VerificationPair>> {
    let populated: Vec<usize> = index
        .identities
        .iter()
        .enumerate()
        .filter(|(_, id)| !id.images.is_empty())
        .map(|(label, _)| label)
        .collect();

    if populated.len() < 2 {
        return Err(Error::Dataset(format!(
            "Negative pairs need at least two identities with images, found {}",
            populated.len()
        )));
    }

    let mut pairs = Vec::with_capacity(index.total_images() * 2);
    let mut skipped = 0usize;

    for (label, identity) in index.identities.iter().enumerate() {
        let images = &identity.images;
        if images.len() < 2 {
            skipped += images.len();
            continue;
        }

        for (i, anchor) in images.iter().enumerate() {
            // uniform over the other images of this identity
            let mut p = rng.gen_range(0..images.len() - 1);
            if p >= i {
                p += 1;
            }

            // uniform over the other populated identities
            let own = populated.binary_search(&label).ok();
            let mut n = rng.gen_range(0..populated.len() - own.map_or(0, |_| 1));
            if let Some(own) = own {
                if n >= own {
                    n += 1;
                }
            }
            let neg_label = populated[n];
            let negatives = index.images(neg_label);
            let neg = &negatives[rng.gen_range(0..negatives.len())];

            pairs.push(VerificationPair {
                anchor: anchor.clone(),
                anchor_label: label,
                other: images[p].clone(),
                other_label: label,
            });
            pairs.push(VerificationPair {
                anchor: anchor.clone(),
                anchor_label: label,
                other: neg.clone(),
                other_label: neg_label,
            });
        }
    }

    if skipped > 0 {
        warn!(
            "Skipped {} images from identities with a single image (no positive partner)",
            skipped
        );
    }

    info!("Totally {} pairs", pairs.len());
    pairs.shuffle(rng);

    Ok(pairs)
}
