//! List generation tool for face verification training.
//!
//! Subcommands:
//! - `triplets`: every k-combination of images within each identity
//! - `pairs`: one positive and one negative verification pair per image
//! - `stats`: per-identity image counts
//! - `check`: consistency and positive ratio of a pair list
//! - `patches`: crop fixed face patches out of listed images

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use facever_core::{
    load_toml_config, setup_cli_logging, GenerationConfig, IndexerConfig, PatchConfig,
    SplitThreshold,
};
use facever_dataset::{
    extract_patches, generate_groups, generate_pairs, read_list_file, sampler_rng,
    split_validation_first, ImageIndex, ListEntry, PairLists, SplitManifest, TripletLists,
};
use facever_layers::{Blob, Layer, VerificationLayer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "gen-data")]
#[command(version)]
#[command(about = "Generate training lists for face verification", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the list generators
#[derive(clap::Args, Debug)]
struct GenerateOpts {
    /// Directory with one sub-folder of images per identity
    folder: PathBuf,

    /// Validation size: an integer count or a ratio such as 0.1
    #[arg(long)]
    validation: Option<SplitThreshold>,

    /// Random seed for reproducible lists
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the list files are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Match image extensions case-insensitively
    #[arg(long)]
    ignore_case: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write train_triplets.txt / valid_triplets.txt
    Triplets {
        #[command(flatten)]
        opts: GenerateOpts,

        /// Images per group
        pair_size: Option<usize>,
    },

    /// Write the ident_verif_{train,test}[_p].txt pair lists
    Pairs {
        #[command(flatten)]
        opts: GenerateOpts,
    },

    /// Show image counts per identity
    Stats {
        /// Directory with one sub-folder of images per identity
        folder: PathBuf,

        /// Save the statistics as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Match image extensions case-insensitively
        #[arg(long)]
        ignore_case: bool,
    },

    /// Verify that a pair list and its partner file line up
    Check {
        /// Anchor list, e.g. ident_verif_test.txt
        anchors: PathBuf,

        /// Partner list, e.g. ident_verif_test_p.txt
        partners: PathBuf,

        /// Also check that every listed image exists
        #[arg(long)]
        check_files: bool,
    },

    /// Crop, resize and save a patch of every listed image as <line>.jpg
    Patches {
        /// File with one image path per line
        list: PathBuf,

        /// Output directory for the patches
        out_dir: PathBuf,

        #[arg(long, requires_all = ["top", "right", "bottom"])]
        left: Option<u32>,
        #[arg(long, requires_all = ["left", "right", "bottom"])]
        top: Option<u32>,
        #[arg(long, requires_all = ["left", "top", "bottom"])]
        right: Option<u32>,
        #[arg(long, requires_all = ["left", "top", "right"])]
        bottom: Option<u32>,

        #[arg(long, requires = "resize_height")]
        resize_width: Option<u32>,
        #[arg(long, requires = "resize_width")]
        resize_height: Option<u32>,

        /// Save single-channel patches
        #[arg(long)]
        gray: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_cli_logging(cli.verbose)?;

    match cli.command {
        Commands::Triplets { opts, pair_size } => generate_triplet_lists(&opts, pair_size)?,
        Commands::Pairs { opts } => generate_pair_lists(&opts)?,
        Commands::Stats {
            folder,
            output,
            ignore_case,
        } => show_stats(&folder, output.as_deref(), ignore_case)?,
        Commands::Check {
            anchors,
            partners,
            check_files,
        } => check_pairs(&anchors, &partners, check_files)?,
        Commands::Patches {
            list,
            out_dir,
            left,
            top,
            right,
            bottom,
            resize_width,
            resize_height,
            gray,
        } => {
            let config = PatchConfig {
                crop: left.zip(top).zip(right).zip(bottom).map(|(((l, t), r), b)| (l, t, r, b)),
                resize: resize_width.zip(resize_height),
                gray,
            };
            let written = extract_patches(&list, &out_dir, &config)?;
            println!(
                "{} {} patches written to {:?}",
                "✓".green(),
                written.len(),
                out_dir
            );
        }
    }

    Ok(())
}

/// File config (or defaults) with command line overrides applied.
fn resolve_config(opts: &GenerateOpts) -> Result<GenerationConfig> {
    let mut config: GenerationConfig = match &opts.config {
        Some(path) => load_toml_config(path)
            .with_context(|| format!("Failed to load config {:?}", path))?,
        None => GenerationConfig::default(),
    };

    if let Some(seed) = opts.seed {
        config.seed = Some(seed);
    }
    if let Some(dir) = &opts.output_dir {
        config.output_dir = dir.clone();
    }
    if opts.ignore_case {
        config.indexer.case_sensitive = false;
    }
    Ok(config)
}

fn generate_triplet_lists(opts: &GenerateOpts, pair_size: Option<usize>) -> Result<()> {
    let mut config = resolve_config(opts)?;
    if let Some(k) = pair_size {
        config.triplets.pair_size = k;
    }
    if let Some(v) = opts.validation {
        config.triplets.validation = v;
    }
    config.triplets.validation.validate()?;

    let index = ImageIndex::scan(&opts.folder, &config.indexer)
        .with_context(|| format!("Failed to index {:?}", opts.folder))?;
    let mut rng = sampler_rng(config.seed);
    let groups = generate_groups(&index, config.triplets.pair_size, &mut rng)?;
    let split = split_validation_first(groups, config.triplets.validation);

    if split.train.is_empty() {
        warn!("Every group went to validation; the train list is empty");
    }

    let files = TripletLists { split: &split }.write(&config.output_dir)?;
    let manifest = SplitManifest {
        kind: "triplets".to_string(),
        source: index.root.clone(),
        seed: config.seed,
        pair_size: Some(config.triplets.pair_size),
        validation: config.triplets.validation,
        identities: index.len(),
        images: index.total_images(),
        train_count: split.train.len(),
        validation_count: split.validation.len(),
        files,
    };
    let manifest_path = manifest.write(&config.output_dir)?;
    info!("Split info saved to {:?}", manifest_path);

    print_summary("Triplet lists", &manifest);
    Ok(())
}

fn generate_pair_lists(opts: &GenerateOpts) -> Result<()> {
    let mut config = resolve_config(opts)?;
    if let Some(v) = opts.validation {
        config.pairs.validation = v;
    }
    config.pairs.validation.validate()?;

    let index = ImageIndex::scan(&opts.folder, &config.indexer)
        .with_context(|| format!("Failed to index {:?}", opts.folder))?;
    let mut rng = sampler_rng(config.seed);
    let pairs = generate_pairs(&index, &mut rng)?;
    let split = split_validation_first(pairs, config.pairs.validation);

    let files = PairLists { split: &split }.write(&config.output_dir)?;
    let manifest = SplitManifest {
        kind: "pairs".to_string(),
        source: index.root.clone(),
        seed: config.seed,
        pair_size: None,
        validation: config.pairs.validation,
        identities: index.len(),
        images: index.total_images(),
        train_count: split.train.len(),
        validation_count: split.validation.len(),
        files,
    };
    let manifest_path = manifest.write(&config.output_dir)?;
    info!("Split info saved to {:?}", manifest_path);

    print_summary("Verification pairs", &manifest);
    Ok(())
}

fn print_summary(title: &str, manifest: &SplitManifest) {
    println!();
    println!("{}", format!("{title}:").cyan().bold());
    println!("  Identities:   {}", manifest.identities);
    println!("  Images:       {}", manifest.images);
    println!("  Train:        {}", manifest.train_count);
    println!(
        "  Validation:   {} (threshold {})",
        manifest.validation_count, manifest.validation
    );
    for file in &manifest.files {
        println!("  {} {}", "✓".green(), file.display());
    }
}

fn show_stats(folder: &Path, output: Option<&Path>, ignore_case: bool) -> Result<()> {
    let mut config = IndexerConfig::default();
    if ignore_case {
        config.case_sensitive = false;
    }
    let index = ImageIndex::scan(folder, &config)?;
    let summary = index.summary();

    println!();
    println!("{}", "Identity Statistics".cyan().bold());
    println!("{:<6} {:<40} {:>8}", "Label", "Identity", "Images");
    println!("{}", "=".repeat(56));
    for (label, identity) in index.identities.iter().enumerate() {
        let count = identity.images.len();
        let line = format!("{:<6} {:<40} {:>8}", label, identity.name, count);
        if count < 2 {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
    println!("{}", "=".repeat(56));
    println!("  Total identities:   {}", summary.folders);
    println!("  Total images:       {}", summary.total_images);
    println!("  Min / max images:   {} / {}", summary.min_images, summary.max_images);

    let sparse = index.identities.iter().filter(|id| id.images.len() < 2).count();
    if sparse > 0 {
        println!(
            "  {}",
            format!("{sparse} identities have fewer than 2 images").yellow()
        );
    }

    if let Some(path) = output {
        let identities: Vec<_> = index
            .identities
            .iter()
            .enumerate()
            .map(|(label, id)| {
                serde_json::json!({
                    "label": label,
                    "name": id.name,
                    "images": id.images.len(),
                })
            })
            .collect();
        let stats = serde_json::json!({
            "root": index.root,
            "summary": summary,
            "identities": identities,
        });
        fs::write(path, serde_json::to_string_pretty(&stats)?)?;
        info!("Statistics saved to {:?}", path);
    }

    Ok(())
}

fn label_blob(entries: &[ListEntry]) -> Result<Blob> {
    let data = entries.iter().map(|e| e.label as f32).collect();
    Ok(Blob::from_data(&[entries.len()], data)?)
}

fn check_pairs(anchors: &Path, partners: &Path, check_files: bool) -> Result<()> {
    let left = read_list_file(anchors).with_context(|| format!("Failed to read {:?}", anchors))?;
    let right =
        read_list_file(partners).with_context(|| format!("Failed to read {:?}", partners))?;
    if left.len() != right.len() {
        bail!(
            "{:?} has {} lines but {:?} has {}",
            anchors,
            left.len(),
            partners,
            right.len()
        );
    }

    let bottom = vec![label_blob(&left)?, label_blob(&right)?];
    let mut top = vec![Blob::empty()];

    let mut layer = VerificationLayer::new();
    layer.setup(&bottom, &top)?;
    layer.reshape(&bottom, &mut top)?;
    layer.forward(&bottom, &mut top)?;

    let positives = top[0].data.iter().filter(|&&v| v == 1.0).count();
    let total = left.len();

    println!();
    println!("{}", "Pair List Check".cyan().bold());
    println!("  Pairs:      {}", total);
    println!(
        "  Positive:   {} ({:.1}%)",
        positives,
        100.0 * positives as f64 / total as f64
    );
    println!("  Negative:   {}", total - positives);

    if check_files {
        let missing: Vec<&Path> = left
            .iter()
            .chain(&right)
            .map(|e| e.path.as_path())
            .filter(|p| !p.exists())
            .collect();
        if missing.is_empty() {
            println!("  {} all listed images exist", "✓".green());
        } else {
            for path in missing.iter().take(10) {
                warn!("Missing image {:?}", path);
            }
            bail!("{} listed images are missing", missing.len());
        }
    }

    Ok(())
}
