//! Raster operations on job images: placeholder fill and cover-fit resize.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::io::Reader as ImageReader;
use image::{ColorType, ImageError, Rgb, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use engine::Resolution;

use crate::error::MediaResult;

/// Fill color of generated placeholders.
pub const PLACEHOLDER_RGB: [u8; 3] = [59, 130, 246];

pub const JPEG_QUALITY: u8 = 90;

/// Write a solid placeholder PNG of exactly `canvas` size.
pub async fn create_placeholder(path: PathBuf, canvas: Resolution) -> MediaResult<PathBuf> {
    tokio::task::spawn_blocking(move || -> MediaResult<PathBuf> {
        write_placeholder(&path, canvas)?;
        Ok(path)
    })
    .await?
}

/// Cover-fit `src` onto `canvas` and re-encode it as JPEG at `dest`.
pub async fn cover_fit(src: PathBuf, dest: PathBuf, canvas: Resolution) -> MediaResult<PathBuf> {
    tokio::task::spawn_blocking(move || -> MediaResult<PathBuf> {
        write_cover_fit(&src, &dest, canvas)?;
        Ok(dest)
    })
    .await?
}

fn write_placeholder(path: &Path, canvas: Resolution) -> MediaResult<()> {
    let img = RgbImage::from_pixel(canvas.width, canvas.height, Rgb(PLACEHOLDER_RGB));
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

fn write_cover_fit(src: &Path, dest: &Path, canvas: Resolution) -> MediaResult<()> {
    // Downloads carry no trustworthy extension, so sniff the format
    let img = ImageReader::open(src)?.with_guessed_format()?.decode()?;

    // Scale to fill, crop centered
    let filled = img.resize_to_fill(canvas.width, canvas.height, FilterType::Lanczos3);
    let rgb = filled.to_rgb8();

    let mut writer = BufWriter::new(File::create(dest)?);
    let written = {
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
    }
    .and_then(|_| writer.flush().map_err(ImageError::IoError));

    if let Err(e) = written {
        let _ = std::fs::remove_file(dest);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::CANONICAL_CANVAS;
    use image::GenericImageView;

    #[tokio::test]
    async fn placeholder_is_canvas_sized_solid_fill() {
        let dir = tempfile::tempdir().unwrap();
        let path = create_placeholder(dir.path().join("p.png"), CANONICAL_CANVAS)
            .await
            .unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (1080, 1920));
        assert_eq!(img.get_pixel(0, 0).0, PLACEHOLDER_RGB);
        assert_eq!(img.get_pixel(1079, 1919).0, PLACEHOLDER_RGB);
    }

    #[tokio::test]
    async fn landscape_image_is_cropped_to_portrait() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("wide.download");
        // Left half red, right half green: a centered crop keeps both colors
        let wide = RgbImage::from_fn(400, 300, |x, _| {
            if x < 200 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 255, 0])
            }
        });
        wide.save_with_format(&src, image::ImageFormat::Png).unwrap();

        let dest = cover_fit(src, dir.path().join("wide.jpg"), CANONICAL_CANVAS)
            .await
            .unwrap();

        let out = image::open(&dest).unwrap();
        assert_eq!(out.dimensions(), (1080, 1920));
        let left = out.get_pixel(10, 960).0;
        let right = out.get_pixel(1070, 960).0;
        assert!(left[0] > 200 && left[1] < 60, "left {left:?}");
        assert!(right[1] > 200 && right[0] < 60, "right {right:?}");
    }

    #[tokio::test]
    async fn small_image_is_upscaled() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("tiny.download");
        RgbImage::from_pixel(9, 16, Rgb([10, 20, 30]))
            .save_with_format(&src, image::ImageFormat::Jpeg)
            .unwrap();

        let dest = cover_fit(src, dir.path().join("tiny.jpg"), CANONICAL_CANVAS)
            .await
            .unwrap();
        assert_eq!(image::image_dimensions(&dest).unwrap(), (1080, 1920));
    }

    #[tokio::test]
    async fn corrupt_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("broken.download");
        std::fs::write(&src, b"<html>not an image</html>").unwrap();

        let result = cover_fit(src, dir.path().join("broken.jpg"), CANONICAL_CANVAS).await;
        assert!(result.is_err());
        assert!(!dir.path().join("broken.jpg").exists());
    }
}
