use image::imageops::FilterType;
use image::DynamicImage;
use rand::Rng;

use crate::data::options::DecodeOptions;
use crate::error::{GanError, Result};

/// How a decoded image is brought to the configured (height, width)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapePolicy {
    /// size must already match
    None,
    /// crop around the center, zero-padding dimensions that are too small
    CenterCrop,
    /// nearest-neighbour resize
    Resize,
    /// uniformly placed window; the source must be at least as large
    RandomCrop,
}

/// Dense 8-bit pixels laid out `[height, width, channels]`
#[derive(Debug, Clone, PartialEq)]
pub struct Pixels {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl Pixels {
    pub fn from_image(image: &DynamicImage, channels: usize) -> Result<Self> {
        let data = match channels {
            1 => image.to_luma8().into_raw(),
            2 => image.to_luma_alpha8().into_raw(),
            3 => image.to_rgb8().into_raw(),
            4 => image.to_rgba8().into_raw(),
            other => {
                return Err(GanError::config(format!(
                    "cannot decode into {other} channels"
                )))
            }
        };
        Ok(Self {
            height: image.height() as usize,
            width: image.width() as usize,
            channels,
            data,
        })
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    /// Rescales from [0, 255] to [-1, 1]
    pub fn normalized(&self) -> Vec<f32> {
        self.data.iter().map(|&v| v as f32 / 127.5 - 1.0).collect()
    }

    fn crop_or_pad(&self, height: usize, width: usize) -> Pixels {
        let c = self.channels;
        let (src_x, dst_x, copy_w) = placement(self.width, width);
        let (src_y, dst_y, copy_h) = placement(self.height, height);

        let mut data = vec![0u8; height * width * c];
        for row in 0..copy_h {
            let src = ((src_y + row) * self.width + src_x) * c;
            let dst = ((dst_y + row) * width + dst_x) * c;
            data[dst..dst + copy_w * c].copy_from_slice(&self.data[src..src + copy_w * c]);
        }

        Pixels {
            height,
            width,
            channels: c,
            data,
        }
    }
}

/// (source offset, destination offset, extent) centering `src` inside `dst`
fn placement(src: usize, dst: usize) -> (usize, usize, usize) {
    if src >= dst {
        ((src - dst) / 2, 0, dst)
    } else {
        (0, (dst - src) / 2, src)
    }
}

/// Applies the shape policy and channel conversion, then checks the result
/// is exactly `(height, width, channels)`.
pub fn shape_image(image: DynamicImage, options: &DecodeOptions, source: &str) -> Result<Pixels> {
    let (height, width, channels) = options.sample_shape();

    let pixels = match options.policy {
        ShapePolicy::None => Pixels::from_image(&image, channels)?,
        ShapePolicy::Resize => {
            let resized = image.resize_exact(width as u32, height as u32, FilterType::Nearest);
            Pixels::from_image(&resized, channels)?
        }
        ShapePolicy::CenterCrop => Pixels::from_image(&image, channels)?.crop_or_pad(height, width),
        ShapePolicy::RandomCrop => {
            let (src_w, src_h) = (image.width() as usize, image.height() as usize);
            if src_w < width || src_h < height {
                return Err(GanError::ShapeMismatch {
                    source_name: source.to_string(),
                    expected: (height, width, channels),
                    actual: (src_h, src_w, channels),
                });
            }
            let mut rng = rand::thread_rng();
            let x = rng.gen_range(0..=src_w - width);
            let y = rng.gen_range(0..=src_h - height);
            let window = image.crop_imm(x as u32, y as u32, width as u32, height as u32);
            Pixels::from_image(&window, channels)?
        }
    };

    if pixels.shape() != (height, width, channels) {
        return Err(GanError::ShapeMismatch {
            source_name: source.to_string(),
            expected: (height, width, channels),
            actual: pixels.shape(),
        });
    }
    Ok(pixels)
}
