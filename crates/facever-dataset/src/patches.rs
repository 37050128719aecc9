//! Square face patch extraction.
//!
//! Reads a list of image paths (one per line), optionally crops a square
//! patch anchored at the top-left corner of a fixed box, optionally resizes
//! it and writes `<out_dir>/<line>.jpg`.

use std::path::{Path, PathBuf};

use facever_core::{Error, PatchConfig, Result};
use image::imageops::FilterType;
use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

/// Side length of the square patch for the crop box `(left, top, right, bottom)`.
///
/// The box has to lie inside the image. The side is the larger of the box's
/// width and height, shrunk so the square still fits in the image.
pub fn patch_size(
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
    img_width: u32,
    img_height: u32,
) -> Result<u32> {
    let inside = left < img_width && right < img_width && top < img_height && bottom < img_height;
    if !inside {
        return Err(Error::InvalidArgument(format!(
            "Crop ({left}, {top}, {right}, {bottom}) must be in the {img_width}x{img_height} image"
        )));
    }
    if right < left || bottom < top {
        return Err(Error::InvalidArgument(format!(
            "Crop ({left}, {top}, {right}, {bottom}) has negative extent"
        )));
    }

    Ok((right - left)
        .max(bottom - top)
        .min(img_width - left)
        .min(img_height - top))
}

/// Apply the crop / resize / gray settings to one image.
pub fn make_patch(img: DynamicImage, config: &PatchConfig) -> Result<DynamicImage> {
    let mut img = if config.gray {
        DynamicImage::ImageLuma8(img.to_luma8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };

    if let Some((left, top, right, bottom)) = config.crop {
        let side = patch_size(left, top, right, bottom, img.width(), img.height())?;
        debug!("Patch size: {}", side);
        img = img.crop_imm(left, top, side, side);
    }

    if let Some((width, height)) = config.resize {
        if width == 0 || height == 0 {
            return Err(Error::InvalidArgument(
                "Resize width and height must both be positive".to_string(),
            ));
        }
        img = img.resize_exact(width, height, FilterType::Triangle);
    }

    Ok(img)
}

/// Cut a patch out of every image listed in `list_file`.
pub fn extract_patches(list_file: &Path, out_dir: &Path, config: &PatchConfig) -> Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(list_file)?;
    let lines: Vec<&str> = content.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    info!("A total of {} images.", lines.len());

    std::fs::create_dir_all(out_dir)?;

    let pb = ProgressBar::new(lines.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .map_err(|e| Error::Config(e.to_string()))?
            .progress_chars("=>-"),
    );

    let mut written = Vec::with_capacity(lines.len());
    for (line_id, line) in lines.iter().enumerate() {
        let img = image::open(line)
            .map_err(|e| Error::Image(format!("Could not load {line}: {e}")))?;
        let patch = make_patch(img, config)?;

        let out = out_dir.join(format!("{line_id}.jpg"));
        patch
            .save(&out)
            .map_err(|e| Error::Image(format!("Could not save {}: {e}", out.display())))?;
        written.push(out);
        pb.inc(1);
    }
    pb.finish_with_message("Done");

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn create_test_image(path: &Path, width: u32, height: u32) {
        let img = ImageBuffer::from_fn(width, height, |x, _| Rgb([(x % 256) as u8, 0u8, 0u8]));
        img.save(path).unwrap();
    }

    #[test]
    fn test_patch_size() {
        assert_eq!(patch_size(10, 10, 50, 40, 100, 100).unwrap(), 40);
        // clamped by the right edge of the image
        assert_eq!(patch_size(80, 0, 99, 60, 100, 100).unwrap(), 20);
        assert!(patch_size(0, 0, 100, 10, 100, 100).is_err());
        assert!(patch_size(50, 0, 10, 10, 100, 100).is_err());
    }

    #[test]
    fn test_make_patch_crop_resize_gray() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(64, 48, Rgb([10, 20, 30])));
        let config = PatchConfig {
            crop: Some((4, 4, 36, 20)),
            resize: Some((16, 16)),
            gray: true,
        };
        let patch = make_patch(img, &config).unwrap();
        assert_eq!((patch.width(), patch.height()), (16, 16));
        assert!(matches!(patch, DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn test_make_patch_rejects_zero_resize() {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(8, 8, Rgb([0, 0, 0])));
        let config = PatchConfig {
            resize: Some((0, 8)),
            ..PatchConfig::default()
        };
        assert!(make_patch(img, &config).is_err());
    }

    #[test]
    fn test_extract_patches() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        create_test_image(&a, 40, 30);
        create_test_image(&b, 50, 50);

        let list = dir.path().join("list.txt");
        std::fs::write(&list, format!("{}\n{}\n", a.display(), b.display())).unwrap();

        let out = dir.path().join("patches");
        let config = PatchConfig {
            crop: Some((0, 0, 20, 20)),
            resize: Some((10, 10)),
            gray: false,
        };
        let written = extract_patches(&list, &out, &config).unwrap();
        assert_eq!(written, vec![out.join("0.jpg"), out.join("1.jpg")]);

        let patch = image::open(&written[1]).unwrap();
        assert_eq!((patch.width(), patch.height()), (10, 10));
    }
}
