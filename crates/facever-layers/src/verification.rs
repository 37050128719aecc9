//! Elementwise equality of two inputs.
//!
//! Fed with the label blobs of an anchor batch and its partner batch this
//! yields the same/different-identity target for verification training.

use facever_core::{Error, Result};
use tracing::debug;

use crate::blob::Blob;
use crate::layer::{check_blob_counts, Layer};

/// `top[i] = 1.0` where both inputs are exactly equal, `0.0` elsewhere.
#[derive(Debug, Default, Clone)]
pub struct VerificationLayer;

impl VerificationLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Layer for VerificationLayer {
    fn layer_type(&self) -> &'static str {
        "Verification"
    }

    fn exact_num_bottom(&self) -> Option<usize> {
        Some(2)
    }

    fn setup(&mut self, bottom: &[Blob], top: &[Blob]) -> Result<()> {
        if bottom.len() != 2 {
            return Err(Error::Layer("Need two inputs to verify.".to_string()));
        }
        check_blob_counts(&*self, bottom, top)
    }

    fn reshape(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()> {
        if bottom[0].count() != bottom[1].count() {
            return Err(Error::Layer(
                "Inputs must have the same dimensions.".to_string(),
            ));
        }
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()> {
        let (a, b) = (&bottom[0].data, &bottom[1].data);
        for ((out, x), y) in top[0].data.iter_mut().zip(a).zip(b) {
            *out = if x == y { 1.0 } else { 0.0 };
        }
        debug!("verification output: {:?}", top[0].data);
        Ok(())
    }

    fn backward(
        &mut self,
        _top: &[Blob],
        _propagate_down: &[bool],
        _bottom: &mut [Blob],
    ) -> Result<()> {
        Ok(())
    }
}
