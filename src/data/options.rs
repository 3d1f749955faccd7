use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::transform::ShapePolicy;
use crate::error::{GanError, Result};

/// On-disk layout of a source root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    /// directory of JPEG files
    Jpg,
    /// directory of PNG files
    Png,
    /// a single shard whose records carry raw pixels under `image`
    TfRecord,
    /// directory of shards whose records carry encoded images under `image/encoded`
    TfRecords,
}

impl SourceFormat {
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            SourceFormat::Jpg => &["jpg", "jpeg"],
            SourceFormat::Png => &["png"],
            SourceFormat::TfRecord | SourceFormat::TfRecords => &["tfrecord"],
        }
    }
}

impl FromStr for SourceFormat {
    type Err = GanError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jpg" => Ok(SourceFormat::Jpg),
            "png" => Ok(SourceFormat::Png),
            "tfrecord" => Ok(SourceFormat::TfRecord),
            "tfrecords" => Ok(SourceFormat::TfRecords),
            other => Err(GanError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Sample order within one pass over a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traversal {
    /// natural-sort order, identical on every pass
    Sequential,
    /// reshuffled before every pass
    Shuffled,
}

/// Validated decode and batching settings shared by every stream
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub format: SourceFormat,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub policy: ShapePolicy,
    pub traversal: Traversal,
    pub batch_size: usize,
    pub decode_workers: usize,
    /// Fixes the shuffle order; `None` draws from entropy
    pub seed: Option<u64>,
}

impl DecodeOptions {
    pub fn new(format: SourceFormat, width: usize, height: usize, channels: usize) -> Self {
        Self {
            format,
            width,
            height,
            channels,
            policy: ShapePolicy::None,
            traversal: Traversal::Shuffled,
            batch_size: 32,
            decode_workers: 4,
            seed: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GanError::config("width and height must be positive"));
        }
        if !(1..=4).contains(&self.channels) {
            return Err(GanError::config(format!(
                "channels must be between 1 and 4, got {}",
                self.channels
            )));
        }
        if self.batch_size == 0 {
            return Err(GanError::config("batch_size must be positive"));
        }
        if self.decode_workers == 0 {
            return Err(GanError::config("decode_workers must be positive"));
        }
        Ok(())
    }

    /// (height, width, channels) of every decoded sample
    pub fn sample_shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }
}

/// The `input` section of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub roots: Vec<PathBuf>,
    pub format: String,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub crop: bool,
    pub resize: bool,
    pub random_crop: bool,
    pub sequential: bool,
    pub batch_size: usize,
    pub decode_workers: usize,
    pub seed: Option<u64>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            format: "png".to_string(),
            width: 64,
            height: 64,
            channels: 3,
            crop: false,
            resize: false,
            random_crop: false,
            sequential: false,
            batch_size: 32,
            decode_workers: 4,
            seed: None,
        }
    }
}

impl InputConfig {
    pub fn decode_options(&self) -> Result<DecodeOptions> {
        let policy = match (self.crop, self.resize, self.random_crop) {
            (false, false, false) => ShapePolicy::None,
            (true, false, false) => ShapePolicy::CenterCrop,
            (false, true, false) => ShapePolicy::Resize,
            (false, false, true) => ShapePolicy::RandomCrop,
            _ => {
                return Err(GanError::config(
                    "crop, resize and random_crop are mutually exclusive",
                ))
            }
        };

        let options = DecodeOptions {
            format: self.format.parse()?,
            width: self.width,
            height: self.height,
            channels: self.channels,
            policy,
            traversal: if self.sequential {
                Traversal::Sequential
            } else {
                Traversal::Shuffled
            },
            batch_size: self.batch_size,
            decode_workers: self.decode_workers,
            seed: self.seed,
        };
        options.validate()?;
        Ok(options)
    }
}
