use image::{imageops::FilterType, DynamicImage, ImageReader};
use ndarray::{Array4, ArrayView4};
use serde::Deserialize;
use std::{io::Cursor, path::Path};
use thiserror::Error;

const DEFAULT_SIDE: u32 = 224;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreprocessConfig {
    #[serde(default = "default_side")]
    pub width: u32,
    #[serde(default = "default_side")]
    pub height: u32,
    #[serde(default)]
    pub filter: ResizeFilter,
}

fn default_side() -> u32 {
    DEFAULT_SIDE
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_SIDE,
            height: DEFAULT_SIDE,
            filter: ResizeFilter::default(),
        }
    }
}

impl PreprocessConfig {
    /// NHWC shape of the tensor handed to the model.
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

/// Batched RGB image with values in `[0, 1]`, laid out as `(1, H, W, 3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    pub fn zeros(shape: [usize; 4]) -> Self {
        Self(Array4::zeros(shape))
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn preprocess(&self, image_data: &[u8]) -> Result<NormalizedTensor, PreprocessError> {
        let image_reader = ImageReader::new(Cursor::new(image_data)).with_guessed_format()?;
        Ok(self.normalize(image_reader.decode()?))
    }

    /// Same pipeline as [`Preprocessor::preprocess`], reading a persisted upload.
    pub fn preprocess_file(&self, path: &Path) -> Result<NormalizedTensor, PreprocessError> {
        let image_reader = ImageReader::open(path)?.with_guessed_format()?;
        Ok(self.normalize(image_reader.decode()?))
    }

    fn normalize(&self, original_img: DynamicImage) -> NormalizedTensor {
        let (width, height) = (self.config.width, self.config.height);
        let rgb = original_img.to_rgb8();
        let img = image::imageops::resize(&rgb, width, height, self.config.filter.into());

        let mut input = Array4::zeros((1, height as usize, width as usize, 3));
        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            let [r, g, b] = pixel.0;
            input[[0, y, x, 0]] = (r as f32) / 255.;
            input[[0, y, x, 1]] = (g as f32) / 255.;
            input[[0, y, x, 2]] = (b as f32) / 255.;
        }

        NormalizedTensor(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Luma, Rgb, Rgba};
    use std::io::Write;

    fn encode(img: impl Into<DynamicImage>, format: ImageFormat) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        img.into().write_to(&mut cursor, format).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_preprocess_red_png() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(10, 10, Rgb([255, 0, 0]));
        let image_data = encode(img, ImageFormat::Png);

        let tensor = Preprocessor::default().preprocess(&image_data).unwrap();

        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        let view = tensor.view();
        assert!((view[[0, 0, 0, 0]] - 1.0).abs() < 1e-2);
        assert!(view[[0, 100, 57, 1]].abs() < 1e-2);
        assert!(view[[0, 223, 223, 2]].abs() < 1e-2);
    }

    #[test]
    fn test_values_stay_in_unit_range() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(16, 9, |x, y| {
            Rgb([(x * 16) as u8, (y * 28) as u8, 255 - (x * y) as u8])
        });
        let image_data = encode(img, ImageFormat::Png);

        let tensor = Preprocessor::default().preprocess(&image_data).unwrap();

        assert!(tensor.view().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_grayscale_and_rgba_become_three_channels() {
        let gray = ImageBuffer::<Luma<u8>, Vec<u8>>::from_pixel(8, 8, Luma([51]));
        let rgba = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_pixel(8, 8, Rgba([0, 0, 255, 10]));
        let preprocessor = Preprocessor::new(PreprocessConfig {
            width: 4,
            height: 4,
            filter: ResizeFilter::Nearest,
        });

        let gray_tensor = preprocessor
            .preprocess(&encode(gray, ImageFormat::Png))
            .unwrap();
        let rgba_tensor = preprocessor
            .preprocess(&encode(rgba, ImageFormat::Png))
            .unwrap();

        assert_eq!(gray_tensor.shape(), &[1, 4, 4, 3]);
        assert_eq!(rgba_tensor.shape(), &[1, 4, 4, 3]);
        for c in 0..3 {
            assert!((gray_tensor.view()[[0, 2, 2, c]] - 0.2).abs() < 1e-6);
        }
        assert!((rgba_tensor.view()[[0, 1, 1, 2]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_custom_target_size() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 40, Rgb([0, 128, 0]));
        let preprocessor = Preprocessor::new(PreprocessConfig {
            width: 28,
            height: 32,
            filter: ResizeFilter::Triangle,
        });

        let tensor = preprocessor
            .preprocess(&encode(img, ImageFormat::Jpeg))
            .unwrap();

        assert_eq!(tensor.shape(), &[1, 32, 28, 3]);
        assert_eq!(preprocessor.config().input_shape(), [1, 32, 28, 3]);
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_fn(30, 30, |x, y| {
            Rgb([x as u8 * 8, y as u8 * 8, 100])
        });
        let image_data = encode(img, ImageFormat::Png);
        let preprocessor = Preprocessor::default();

        assert_eq!(
            preprocessor.preprocess(&image_data).unwrap(),
            preprocessor.preprocess(&image_data).unwrap()
        );
    }

    #[test]
    fn test_non_image_bytes_fail_to_decode() {
        let result = Preprocessor::default().preprocess(b"these are my notes, not a picture");

        assert!(matches!(result, Err(PreprocessError::Decode(_))));
    }

    #[test]
    fn test_preprocess_file_matches_in_memory() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(10, 10, Rgb([12, 34, 56]));
        let image_data = encode(img, ImageFormat::Png);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&image_data).unwrap();
        let preprocessor = Preprocessor::default();

        assert_eq!(
            preprocessor.preprocess_file(file.path()).unwrap(),
            preprocessor.preprocess(&image_data).unwrap()
        );
    }

    #[test]
    fn test_preprocess_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        let result = Preprocessor::default().preprocess_file(&dir.path().join("gone.png"));

        assert!(matches!(result, Err(PreprocessError::Io(_))));
    }
}
