//! L2 normalisation across channels.
//!
//! For every sample `n` and spatial position `s` the channel vector
//! `x[n, :, s]` is divided by its Euclidean norm, so embeddings fed to the
//! triplet loss lie on the unit sphere.

use facever_core::{Error, Result};

use crate::blob::Blob;
use crate::layer::Layer;

/// Lower bound on the norm to keep all-zero vectors finite
pub const NORM_EPS: f32 = 1e-12;

#[derive(Debug, Default, Clone)]
pub struct L2NormLayer {
    /// `num * spatial_dim` norms from the last forward pass
    norm: Vec<f32>,
}

impl L2NormLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for L2NormLayer {
    fn layer_type(&self) -> &'static str {
        "L2N"
    }

    fn exact_num_bottom(&self) -> Option<usize> {
        Some(1)
    }

    fn reshape(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()> {
        if bottom[0].shape().len() < 2 {
            return Err(Error::Layer(format!(
                "L2N needs at least (num, channels) axes, got shape {:?}",
                bottom[0].shape()
            )));
        }
        top[0].reshape_like(&bottom[0]);
        self.norm = vec![0.0; bottom[0].num() * bottom[0].spatial_dim()];
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()> {
        let x = &bottom[0];
        let (num, channels, spatial) = (x.num(), x.channels(), x.spatial_dim());
        let y = &mut top[0].data;

        for n in 0..num {
            for s in 0..spatial {
                let idx = |c: usize| (n * channels + c) * spatial + s;
                let sq: f32 = (0..channels).map(|c| x.data[idx(c)].powi(2)).sum();
                let norm = sq.sqrt().max(NORM_EPS);
                self.norm[n * spatial + s] = norm;
                for c in 0..channels {
                    y[idx(c)] = x.data[idx(c)] / norm;
                }
            }
        }
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

        let (dy, y) = (&top[0].diff, &top[0].data);
        let x = &mut bottom[0];
        let (num, channels, spatial) = (x.num(), x.channels(), x.spatial_dim());

        // dx = dy / |x| - x * <dy, y> / |x|^2
        for n in 0..num {
            for s in 0..spatial {
                let idx = |c: usize| (n * channels + c) * spatial + s;
                let norm = self.norm[n * spatial + s];
                let dot: f32 = (0..channels).map(|c| dy[idx(c)] * y[idx(c)]).sum::<f32>()
                    / (norm * norm);
                for c in 0..channels {
                    let i = idx(c);
                    x.diff[i] = dy[i] / norm - x.data[i] * dot;
                }
            }
        }
        Ok(())
    }
}
