//! Turns uploaded image bytes into the fixed-shape tensor the classifier expects.
//!
//! The pipeline is: decode, force RGB, resize to the exact target size,
//! normalize, wrap in a batch of one.
//!
//! # Normalization
//!
//! The scheme must be the one the network was trained with. Nothing here can
//! detect a mismatch: a model fed `[-1, 1]` input when it was trained on
//! `0..255` still returns a perfectly valid probability vector, just a worse
//! one. Treat [`Normalization`] as part of the model artifact.

use std::fmt;
use std::str::FromStr;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

pub const DEFAULT_IMAGE_SIZE: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("Uploaded file is empty")]
    Empty,
    #[error("Could not decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Numeric range the pixel values are mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Raw `0..255` values. EfficientNetV2 exports rescale inside the graph.
    #[default]
    Raw,
    /// `[-1, 1]`, as used by MobileNet and Inception families.
    Signed,
    /// `[0, 1]` followed by the ImageNet per-channel mean/std.
    ImageNet,
}

impl Normalization {
    #[inline]
    fn apply(self, value: u8, channel: usize) -> f32 {
        let v = f32::from(value);
        match self {
            Self::Raw => v,
            Self::Signed => v / 127.5 - 1.0,
            Self::ImageNet => (v / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
        }
    }
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "signed" => Ok(Self::Signed),
            "imagenet" => Ok(Self::ImageNet),
            other => Err(format!("unknown normalization '{}' (expected raw, signed or imagenet)", other)),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Signed => "signed",
            Self::ImageNet => "imagenet",
        })
    }
}

/// Memory layout of the input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    /// `[batch, height, width, channels]` (TensorFlow / Keras exports)
    #[default]
    Nhwc,
    /// `[batch, channels, height, width]` (PyTorch exports)
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nhwc" => Ok(Self::Nhwc),
            "nchw" => Ok(Self::Nchw),
            other => Err(format!("unknown tensor layout '{}' (expected nhwc or nchw)", other)),
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nhwc => "nhwc",
            Self::Nchw => "nchw",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessConfig {
    pub width: u32,
    pub height: u32,
    pub normalization: Normalization,
    pub layout: TensorLayout,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
            normalization: Normalization::default(),
            layout: TensorLayout::default(),
        }
    }
}

impl PreprocessConfig {
    /// Shape of the batch produced by [`ImagePreprocessor::preprocess`].
    pub fn batch_shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Decodes `bytes` and returns a batch of one normalized image.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<Array4<f32>, PreprocessError> {
        if bytes.is_empty() {
            return Err(PreprocessError::Empty);
        }
        let decoded = image::load_from_memory(bytes)?;
        let rgb = decoded.to_rgb8();
        let resized = if rgb.dimensions() == (self.config.width, self.config.height) {
            rgb
        } else {
            image::imageops::resize(&rgb, self.config.width, self.config.height, FilterType::Triangle)
        };
        Ok(self.to_tensor(&resized))
    }

    fn to_tensor(&self, rgb: &RgbImage) -> Array4<f32> {
        let norm = self.config.normalization;
        let [n, d1, d2, d3] = self.config.batch_shape();
        match self.config.layout {
            TensorLayout::Nhwc => Array4::from_shape_fn((n, d1, d2, d3), |(_, y, x, c)| {
                norm.apply(rgb.get_pixel(x as u32, y as u32)[c], c)
            }),
            TensorLayout::Nchw => Array4::from_shape_fn((n, d1, d2, d3), |(_, c, y, x)| {
                norm.apply(rgb.get_pixel(x as u32, y as u32)[c], c)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_any_size_and_mode_yields_target_shape() {
        let inputs = vec![
            DynamicImage::ImageRgb8(RgbImage::new(640, 480)),
            DynamicImage::ImageLuma8(GrayImage::from_pixel(31, 97, Luma([200]))),
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 0]))),
        ];
        let preprocessor = ImagePreprocessor::default();
        for img in inputs {
            let bytes = encode(img, ImageFormat::Png);
            let tensor = preprocessor.preprocess(&bytes).unwrap();
            assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        }
    }

    #[test]
    fn test_nchw_layout() {
        let preprocessor = ImagePreprocessor::new(PreprocessConfig {
            width: 64,
            height: 32,
            layout: TensorLayout::Nchw,
            ..Default::default()
        });
        let bytes = encode(DynamicImage::ImageRgb8(RgbImage::new(300, 200)), ImageFormat::Png);
        let tensor = preprocessor.preprocess(&bytes).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 64]);
    }

    #[test]
    fn test_normalization_ranges() {
        let white = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]))),
            ImageFormat::Png,
        );
        let config = |normalization| PreprocessConfig { width: 8, height: 8, normalization, ..Default::default() };

        let raw = ImagePreprocessor::new(config(Normalization::Raw)).preprocess(&white).unwrap();
        assert!(raw.iter().all(|&v| v == 255.0));

        let signed = ImagePreprocessor::new(config(Normalization::Signed)).preprocess(&white).unwrap();
        assert!(signed.iter().all(|&v| (v - 1.0).abs() < 1e-6));

        let imagenet = ImagePreprocessor::new(config(Normalization::ImageNet)).preprocess(&white).unwrap();
        let expected_red = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        assert!((imagenet[[0, 0, 0, 0]] - expected_red).abs() < 1e-5);
    }

    #[test]
    fn test_grayscale_replicated_to_three_channels() {
        let bytes = encode(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 4, Luma([100]))),
            ImageFormat::Png,
        );
        let preprocessor = ImagePreprocessor::new(PreprocessConfig { width: 4, height: 4, ..Default::default() });
        let tensor = preprocessor.preprocess(&bytes).unwrap();
        assert_eq!(tensor[[0, 1, 2, 0]], 100.0);
        assert_eq!(tensor[[0, 1, 2, 1]], 100.0);
        assert_eq!(tensor[[0, 1, 2, 2]], 100.0);
    }

    #[test]
    fn test_invalid_bytes_fail_to_decode() {
        let preprocessor = ImagePreprocessor::default();
        assert!(matches!(preprocessor.preprocess(b"definitely not an image"), Err(PreprocessError::Decode(_))));
        assert!(matches!(preprocessor.preprocess(&[]), Err(PreprocessError::Empty)));
    }

    #[test]
    fn test_parse_options() {
        assert_eq!("ImageNet".parse::<Normalization>(), Ok(Normalization::ImageNet));
        assert_eq!("nchw".parse::<TensorLayout>(), Ok(TensorLayout::Nchw));
        assert!("bogus".parse::<Normalization>().is_err());
    }
}
