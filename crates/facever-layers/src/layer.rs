//! Layer contract shared by every layer in this crate.

use facever_core::{Error, Result};

use crate::blob::Blob;

/// A layer with the setup / reshape / forward / backward life cycle.
///
/// `bottom` blobs are inputs and `top` blobs outputs. `backward` reads the
/// top gradients and writes into `bottom[i].diff` wherever
/// `propagate_down[i]` is set.
pub trait Layer: Send {
    /// Layer type name, e.g. `"Verification"`
    fn layer_type(&self) -> &'static str;

    /// Required number of inputs, if fixed
    fn exact_num_bottom(&self) -> Option<usize> {
        None
    }

    /// Required number of outputs, if fixed
    fn exact_num_top(&self) -> Option<usize> {
        Some(1)
    }

    /// One-time checks against the first inputs
    fn setup(&mut self, bottom: &[Blob], top: &[Blob]) -> Result<()> {
        check_blob_counts(&*self, bottom, top)
    }

    /// Size the outputs (and internal buffers) for the current inputs
    fn reshape(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()>;

    fn forward(&mut self, bottom: &[Blob], top: &mut [Blob]) -> Result<()>;

    fn backward(
        &mut self,
        top: &[Blob],
        propagate_down: &[bool],
        bottom: &mut [Blob],
    ) -> Result<()>;
}

/// Validate `exact_num_bottom` / `exact_num_top`.
pub fn check_blob_counts<L: Layer + ?Sized>(layer: &L, bottom: &[Blob], top: &[Blob]) -> Result<()> {
    if let Some(n) = layer.exact_num_bottom() {
        if bottom.len() != n {
            return Err(Error::Layer(format!(
                "{} layer takes {} bottom blob(s), got {}",
                layer.layer_type(),
                n,
                bottom.len()
            )));
        }
    }
    if let Some(n) = layer.exact_num_top() {
        if top.len() != n {
            return Err(Error::Layer(format!(
                "{} layer produces {} top blob(s), got {}",
                layer.layer_type(),
                n,
                top.len()
            )));
        }
    }
    Ok(())
}
