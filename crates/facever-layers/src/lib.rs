//! CPU layers for face verification networks.
//!
//! Layers follow the bottom/top blob contract of [`Layer`]. The crate has
//! no autograd; each layer writes its own input gradients in `backward`.

pub mod blob;
pub mod l2norm;
pub mod layer;
pub mod triplet_loss;
pub mod verification;

pub use blob::Blob;
pub use l2norm::L2NormLayer;
pub use layer::{check_blob_counts, Layer};
pub use triplet_loss::{TripletLossParams, TripletLossWithSample};
pub use verification::VerificationLayer;
