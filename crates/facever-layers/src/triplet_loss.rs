//! Triplet loss with online negative sampling.
//!
//! The batch is laid out in consecutive groups of `pair_size` rows taken
//! from one identity (the layout written by the triplet list generator).
//! Row 0 of a group is the anchor, the remaining rows are positives, and
//! negatives are mined from every other-label row in the batch.
//!
//! Distances are negative dot products, so features are expected to be
//! L2-normalised first (see [`crate::L2NormLayer`]).
//!
//! For each positive pair the candidates are the negatives that violate the
//! margin. When there are more than `num_negative` of them the closest
//! `num_negative` form a hard pool and the rest a random pool; a
//! `hard_ratio` share is drawn from the hard pool and a `random_ratio`
//! share from the random pool (plus unused hard candidates).
//!
//! Both pools are rebuilt for every positive pair. Candidates found for an
//! earlier positive of the same group are not carried over, so each
//! positive draws at most `num_negative` negatives of its own.

use facever_core::{Error, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::blob::Blob;
use crate::layer::Layer;

/// Parameters of [`TripletLossWithSample`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TripletLossParams {
    pub margin: f32,
    /// Rows per identity group
    pub pair_size: usize,
    /// Negatives kept per positive pair; 0 keeps every violating negative
    pub num_negative: usize,
    pub hard_ratio: f32,
    pub random_ratio: f32,
    /// Also score `<p, a, n>`
    pub mirror: bool,
    /// Measure distances to the group centroid instead of the anchor
    pub cluster: bool,
    pub seed: Option<u64>,
    /// Forward passes between triplet-count log lines
    pub log_interval: usize,
}

impl Default for TripletLossParams {
    fn default() -> Self {
        Self {
            margin: 0.2,
            pair_size: 3,
            num_negative: 0,
            hard_ratio: 1.0,
            random_ratio: 0.0,
            mirror: false,
            cluster: false,
            seed: None,
            log_interval: 2500,
        }
    }
}

pub struct TripletLossWithSample {
    params: TripletLossParams,
    rng: ChaCha8Rng,
    iter_count: usize,
    num: usize,
    /// `num x num` pairwise distances
    dist: Vec<f32>,
    /// `num x num`; `flag[p * num + n]` marks negative `n` for positive row `p`
    flag: Vec<bool>,
    /// `groups x num` mean distance of each group to each row
    cluster_dist: Vec<f32>,
    last_triplet_count: usize,
}

impl TripletLossWithSample {
    pub fn new(params: TripletLossParams) -> Result<Self> {
        if params.pair_size == 0 {
            return Err(Error::Layer("pair_size must be at least 1".to_string()));
        }
        let rng = match params.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            params,
            rng,
            iter_count: 0,
            num: 0,
            dist: Vec::new(),
            flag: Vec::new(),
            cluster_dist: Vec::new(),
            last_triplet_count: 0,
        })
    }

    pub fn params(&self) -> &TripletLossParams {
        &self.params
    }

    /// Active triplets in the most recent forward pass
    pub fn last_triplet_count(&self) -> usize {
        self.last_triplet_count
    }

    fn d(&self, i: usize, j: usize) -> f32 {
        self.dist[i * self.num + j]
    }

    fn cd(&self, group: usize, j: usize) -> f32 {
        self.cluster_dist[group * self.num + j]
    }

    /// Hinge of `<anchor, pos, neg>` (or its cluster variant) before clamping.
    fn violation(&self, anchor: usize, pos: usize, neg: usize) -> f32 {
        let group = anchor / self.params.pair_size;
        if self.params.cluster {
            self.params.margin + self.cd(group, pos) - self.cd(group, neg)
        } else {
            self.params.margin + self.d(anchor, pos) - self.d(anchor, neg)
        }
    }

    fn compute_distances(&mut self, features: &[f32], dim: usize) {
        let (num, pair_size) = (self.num, self.params.pair_size);
        self.dist.iter_mut().for_each(|d| *d = 0.0);

        for i in 0..num {
            for j in i + 1..num {
                let fi = &features[i * dim..(i + 1) * dim];
                let fj = &features[j * dim..(j + 1) * dim];
                let d = -fi.iter().zip(fj).map(|(a, b)| a * b).sum::<f32>();
                self.dist[i * num + j] = d;
                self.dist[j * num + i] = d;
            }
        }

        for group in 0..num / pair_size {
            let first = group * pair_size;
            for j in 0..num {
                let sum: f32 = (first..first + pair_size).map(|m| self.dist[m * num + j]).sum();
                self.cluster_dist[group * num + j] = sum / pair_size as f32;
            }
        }
    }

    fn select_triplets(&mut self, labels: &[f32]) {
        let num = self.num;
        let p = self.params.clone();
        let hard_num = (p.num_negative as f32 * p.hard_ratio) as usize;
        let random_num = (p.num_negative as f32 * p.random_ratio) as usize;

        self.flag.iter_mut().for_each(|f| *f = false);

        for anchor in (0..num).step_by(p.pair_size) {
            for k in 0..p.pair_size {
                let pos = anchor + k;
                if labels[pos] != labels[anchor] {
                    continue;
                }
                // <a, a, n> is meaningless without the centroid
                if k == 0 && !p.cluster {
                    continue;
                }

                let mut candidates: Vec<(f32, usize)> = (0..num)
                    .filter(|&j| labels[j] != labels[anchor])
                    .filter(|&j| self.violation(anchor, pos, j) > 0.0)
                    .map(|j| {
                        let dist = if p.cluster {
                            self.cd(anchor / p.pair_size, j)
                        } else {
                            self.d(anchor, j)
                        };
                        (dist, j)
                    })
                    .collect();

                if p.num_negative == 0 || candidates.len() <= p.num_negative {
                    for &(_, j) in &candidates {
                        self.flag[pos * num + j] = true;
                    }
                    continue;
                }

                candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
                let mut hard: Vec<usize> =
                    candidates[..p.num_negative].iter().map(|&(_, j)| j).collect();
                let mut random: Vec<usize> =
                    candidates[p.num_negative..].iter().map(|&(_, j)| j).collect();

                hard.shuffle(&mut self.rng);
                for &j in hard.iter().take(hard_num) {
                    self.flag[pos * num + j] = true;
                }

                random.extend(hard.iter().skip(hard_num));
                random.shuffle(&mut self.rng);
                for &j in random.iter().take(random_num) {
                    self.flag[pos * num + j] = true;
                }
            }
        }
    }

    /// Selected `(anchor, positive, negative)` row triples, in scan order.
    fn selected(&self) -> Vec<(usize, usize, usize)> {
        let (num, pair_size) = (self.num, self.params.pair_size);
        let mut out = Vec::new();
        for anchor in (0..num).step_by(pair_size) {
            for k in 0..pair_size {
                if k == 0 && !self.params.cluster {
                    continue;
                }
                let pos = anchor + k;
                for neg in 0..num {
                    if self.flag[pos * num + neg] {
                        out.push((anchor, pos, neg));
                    }
                }
            }
        }
        out
    }
}

impl Layer for TripletLossWithSample {
    fn layer_type(&self) -> &'static str {
        "TripletLossWithSample"
    }

    fn exact_num_bottom(&self) -> Option<usize> {
        Some(2)
    }

    fn reshape(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()> {
        let num = bottom[0].num();
        if num % self.params.pair_size != 0 {
            return Err(Error::Layer(format!(
                "Batch of {} rows is not a multiple of pair_size {}",
                num, self.params.pair_size
            )));
        }
        if bottom[1].count() != num {
            return Err(Error::Layer(format!(
                "Expected {} labels, got {}",
                num,
                bottom[1].count()
            )));
        }

        self.num = num;
        self.dist = vec![0.0; num * num];
        self.flag = vec![false; num * num];
        self.cluster_dist = vec![0.0; (num / self.params.pair_size) * num];
        top[0].reshape(&[1]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()> {
        let (features, labels) = (&bottom[0], &bottom[1]);
        self.compute_distances(&features.data, features.dim());
        self.select_triplets(&labels.data);

        let mut loss = 0.0f32;
        let mut triplet_count = 0usize;
        for (anchor, pos, neg) in self.selected() {
            let v = self.violation(anchor, pos, neg);
            if v > 0.0 {
                loss += v;
                triplet_count += 1;
            }

            // <p, a, n>
            if self.params.mirror && !self.params.cluster {
                let v = self.params.margin + self.d(anchor, pos) - self.d(pos, neg);
                if v > 0.0 {
                    loss += v;
                    triplet_count += 1;
                }
            }
        }

        if triplet_count != 0 {
            loss /= triplet_count as f32;
        }
        top[0].data[0] = loss;

        if self.iter_count % self.params.log_interval.max(1) == 0 {
            info!("Totally {} <a, p, n> triplets.", triplet_count);
        }
        self.iter_count += 1;
        self.last_triplet_count = triplet_count;
        Ok(())
    }

    fn backward(
        &mut self,
        top: &[Blob],
        propagate_down: &[bool],
        bottom: &mut [Blob],
    ) -> Result<()> {
        if !propagate_down.first().copied().unwrap_or(false) {
            return Ok(());
        }

        let num = self.num;
        let pair_size = self.params.pair_size;
        let selected = self.selected();

        let x = &mut bottom[0];
        let dim = x.dim();
        let (data, diff) = (&x.data, &mut x.diff);
        diff.iter_mut().for_each(|d| *d = 0.0);

        let row = |r: usize| r * dim..(r + 1) * dim;

        // group centroids
        let mut centroid = vec![0.0f32; (num / pair_size) * dim];
        for group in 0..num / pair_size {
            for m in group * pair_size..(group + 1) * pair_size {
                for d in 0..dim {
                    centroid[group * dim + d] += data[m * dim + d] / pair_size as f32;
                }
            }
        }

        let mut triplet_count = 0usize;
        for (anchor, pos, neg) in selected {
            if self.violation(anchor, pos, neg) > 0.0 {
                triplet_count += 1;
                if self.params.cluster {
                    let c = &centroid[row(anchor / pair_size)];
                    for d in 0..dim {
                        diff[pos * dim + d] -= c[d];
                        diff[neg * dim + d] += c[d];
                    }
                } else {
                    for d in 0..dim {
                        let (a, p, n) = (data[anchor * dim + d], data[pos * dim + d], data[neg * dim + d]);
                        diff[anchor * dim + d] += n - p;
                        diff[pos * dim + d] -= a;
                        diff[neg * dim + d] += a;
                    }
                }
            }

            if self.params.mirror && !self.params.cluster {
                let v = self.params.margin + self.d(anchor, pos) - self.d(pos, neg);
                if v > 0.0 {
                    triplet_count += 1;
                    for d in 0..dim {
                        let (a, p, n) = (data[anchor * dim + d], data[pos * dim + d], data[neg * dim + d]);
                        diff[anchor * dim + d] -= p;
                        diff[pos * dim + d] += n - a;
                        diff[neg * dim + d] += p;
                    }
                }
            }
        }

        if triplet_count != 0 {
            let scale = top[0].diff[0] / triplet_count as f32;
            diff.iter_mut().for_each(|d| *d *= scale);
        }
        Ok(())
    }
}
