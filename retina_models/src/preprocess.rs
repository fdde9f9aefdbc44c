use crate::error::ModelError;
use image::{imageops::FilterType, DynamicImage, ImageReader};
use ndarray::{Array, Ix4};
use std::{io::Cursor, path::Path};

/// Opens the image at `path` and turns it into a `[1, 3, size, size]` tensor.
pub fn preprocess_path(path: &Path, size: u32) -> Result<Array<f32, Ix4>, ModelError> {
    let image_reader = ImageReader::open(path)
        .map_err(|source| ModelError::ImageOpen {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| ModelError::ImageOpen {
            path: path.to_path_buf(),
            source,
        })?;

    let image = image_reader.decode()?;
    Ok(to_input_tensor(&image, size))
}

pub fn preprocess_bytes(image_data: &[u8], size: u32) -> Result<Array<f32, Ix4>, ModelError> {
    let image = ImageReader::new(Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| ModelError::ImageDecode(image::ImageError::IoError(e)))?
        .decode()?;

    Ok(to_input_tensor(&image, size))
}

/// Resizes to a square and scales each channel to [0, 1] in NCHW layout.
pub fn to_input_tensor(image: &DynamicImage, size: u32) -> Array<f32, Ix4> {
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);

    let side = size as usize;
    let mut input = Array::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = x as usize;
        let y = y as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgb, Rgba};

    fn encode_png(img: DynamicImage) -> Vec<u8> {
        let mut image_data: Vec<u8> = Vec::new();
        img.write_to(&mut Cursor::new(&mut image_data), image::ImageFormat::Png)
            .unwrap();
        image_data
    }

    #[test]
    fn test_preprocess_bytes_shape_and_scale() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 60, Rgb([255, 0, 51]));
        let image_data = encode_png(DynamicImage::ImageRgb8(img));

        let input = preprocess_bytes(&image_data, 224).unwrap();

        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        assert!((input[[0, 0, 10, 10]] - 1.0).abs() < 1e-2);
        assert!(input[[0, 1, 10, 10]].abs() < 1e-2);
        assert!((input[[0, 2, 10, 10]] - 0.2).abs() < 1e-2);
    }

    #[test]
    fn test_grayscale_and_alpha_become_three_channels() {
        let gray = ImageBuffer::<Luma<u8>, Vec<u8>>::from_pixel(8, 8, Luma([128]));
        let input = to_input_tensor(&DynamicImage::ImageLuma8(gray), 16);
        assert_eq!(input.shape(), &[1, 3, 16, 16]);
        assert_eq!(input[[0, 0, 3, 3]], input[[0, 2, 3, 3]]);

        let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(8, 8, Rgba([0, 255, 0, 10]));
        let input = to_input_tensor(&DynamicImage::ImageRgba8(rgba), 16);
        assert!((input[[0, 1, 0, 0]] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_preprocess_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fundus.png");
        ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(32, 32, Rgb([0, 0, 255]))
            .save(&path)
            .unwrap();

        let input = preprocess_path(&path, 224).unwrap();
        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        assert!((input[[0, 2, 100, 100]] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn test_preprocess_path_rejects_missing_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let missing = preprocess_path(&dir.path().join("nope.png"), 224);
        assert!(matches!(missing, Err(ModelError::ImageOpen { .. })));

        let garbage = dir.path().join("garbage.jpg");
        std::fs::write(&garbage, b"definitely not an image").unwrap();
        assert!(preprocess_path(&garbage, 224).is_err());
    }
}
