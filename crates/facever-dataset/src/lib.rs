//! Dataset preparation for face verification and metric learning.
//!
//! This crate turns a folder of per-identity image folders into the flat
//! `path label` lists used for training:
//!
//! - [`ImageIndex`] scans and labels identity folders
//! - [`generate_groups`] / [`generate_pairs`] sample triplet groups and
//!   verification pairs
//! - [`split_validation_first`] carves off the validation subset
//! - [`TripletLists`] / [`PairLists`] write the list files
//! - [`read_list_file`] parses them back
//! - [`extract_patches`] cuts fixed face patches out of listed images

pub mod indexer;
pub mod patches;
pub mod reader;
pub mod sampler;
pub mod split;
pub mod writer;

pub use indexer::{Identity, ImageIndex, IndexSummary};
pub use patches::{extract_patches, make_patch, patch_size};
pub use reader::{parse_list_line, read_list_file, ListEntry};
pub use sampler::{
    combination_count, generate_groups, generate_pairs, sampler_rng, Combinations, ImageGroup,
    VerificationPair,
};
pub use split::{split_validation_first, Split};
pub use writer::{format_line, write_lines, PairLists, SplitManifest, TripletLists};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::indexer::*;
    pub use crate::reader::*;
    pub use crate::sampler::*;
    pub use crate::split::*;
    pub use crate::writer::*;
}
