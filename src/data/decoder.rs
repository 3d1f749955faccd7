use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};
use tracing::info;

use crate::data::discovery::discover_files;
use crate::data::options::{DecodeOptions, SourceFormat};
use crate::data::record::{self, RecordRef};
use crate::error::{GanError, Result};

/// One decodable unit of a source: an image file or a record inside a shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleRef {
    File(PathBuf),
    Record(RecordRef),
}

impl fmt::Display for SampleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleRef::File(path) => write!(f, "{}", path.display()),
            SampleRef::Record(record) => write!(f, "{record}"),
        }
    }
}

/// Turns a sample into an image; one implementation per source format
pub trait DecoderStrategy: Send + Sync {
    fn decode(&self, sample: &SampleRef) -> Result<DynamicImage>;
}

/// `jpg` / `png` directories
#[derive(Debug, Default)]
pub struct ImageFileDecoder;

impl DecoderStrategy for ImageFileDecoder {
    fn decode(&self, sample: &SampleRef) -> Result<DynamicImage> {
        match sample {
            SampleRef::File(path) => image::open(path).map_err(|source| GanError::Decode {
                source_name: path.display().to_string(),
                source,
            }),
            SampleRef::Record(record) => Err(GanError::config(format!(
                "image file decoder received record {record}"
            ))),
        }
    }
}

/// `tfrecord` shards: raw `u8` pixels under the `image` feature
#[derive(Debug)]
pub struct RawRecordDecoder {
    width: usize,
    height: usize,
    channels: usize,
}

impl RawRecordDecoder {
    pub const FEATURE: &'static str = "image";

    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }
}

impl DecoderStrategy for RawRecordDecoder {
    fn decode(&self, sample: &SampleRef) -> Result<DynamicImage> {
        let record = expect_record(sample)?;
        let payload = record::read_payload(record)?;
        let raw = record::bytes_feature(record, &payload, Self::FEATURE)?;

        let expected = self.width * self.height * self.channels;
        if raw.len() != expected {
            return Err(GanError::Record {
                path: record.shard.clone(),
                reason: format!(
                    "{record}: {} raw bytes cannot be reshaped to {}x{}x{}",
                    raw.len(),
                    self.height,
                    self.width,
                    self.channels
                ),
            });
        }

        let (w, h) = (self.width as u32, self.height as u32);
        let image = match self.channels {
            1 => GrayImage::from_raw(w, h, raw).map(DynamicImage::ImageLuma8),
            2 => GrayAlphaImage::from_raw(w, h, raw).map(DynamicImage::ImageLumaA8),
            3 => RgbImage::from_raw(w, h, raw).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, raw).map(DynamicImage::ImageRgba8),
            _ => None,
        };
        image.ok_or_else(|| GanError::Record {
            path: record.shard.clone(),
            reason: format!("{record}: unsupported channel count {}", self.channels),
        })
    }
}

/// `tfrecords` shards: encoded JPEG/PNG bytes under `image/encoded`
#[derive(Debug, Default)]
pub struct EncodedRecordDecoder;

impl EncodedRecordDecoder {
    pub const FEATURE: &'static str = "image/encoded";
}

impl DecoderStrategy for EncodedRecordDecoder {
    fn decode(&self, sample: &SampleRef) -> Result<DynamicImage> {
        let record = expect_record(sample)?;
        let payload = record::read_payload(record)?;
        let encoded = record::bytes_feature(record, &payload, Self::FEATURE)?;
        image::load_from_memory(&encoded).map_err(|source| GanError::Decode {
            source_name: record.to_string(),
            source,
        })
    }
}

fn expect_record(sample: &SampleRef) -> Result<&RecordRef> {
    match sample {
        SampleRef::Record(record) => Ok(record),
        SampleRef::File(path) => Err(GanError::config(format!(
            "record decoder received file {}",
            path.display()
        ))),
    }
}

impl SourceFormat {
    /// Picks the decoder for this format; done once per stream
    pub fn decoder(&self, options: &DecodeOptions) -> Arc<dyn DecoderStrategy> {
        match self {
            SourceFormat::Jpg | SourceFormat::Png => Arc::new(ImageFileDecoder),
            SourceFormat::TfRecord => Arc::new(RawRecordDecoder::new(
                options.width,
                options.height,
                options.channels,
            )),
            SourceFormat::TfRecords => Arc::new(EncodedRecordDecoder),
        }
    }

    /// Enumerates every sample under `root` in natural order
    pub fn discover(&self, root: &Path) -> Result<Vec<SampleRef>> {
        let samples: Vec<SampleRef> = match self {
            SourceFormat::Jpg | SourceFormat::Png => discover_files(root, self.extensions())?
                .into_iter()
                .map(SampleRef::File)
                .collect(),
            SourceFormat::TfRecord => {
                if !root.is_file() {
                    return Err(GanError::NoDataFound {
                        path: root.to_path_buf(),
                    });
                }
                index_shards(&[root.to_path_buf()])?
            }
            SourceFormat::TfRecords => {
                let shards = discover_files(root, self.extensions())?;
                info!(root = %root.display(), shards = shards.len(), "found tfrecord shards");
                index_shards(&shards)?
            }
        };

        if samples.is_empty() {
            return Err(GanError::NoDataFound {
                path: root.to_path_buf(),
            });
        }
        info!(root = %root.display(), count = samples.len(), "discovered samples");
        Ok(samples)
    }
}

fn index_shards(shards: &[PathBuf]) -> Result<Vec<SampleRef>> {
    let mut samples = Vec::new();
    for shard in shards {
        samples.extend(record::index_shard(shard)?.into_iter().map(SampleRef::Record));
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{example_with_bytes, frame_records};
    use prost::Message;
    use std::io::Cursor;

    fn png_bytes(value: u8) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, image::Rgb([value; 3])));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_raw_record_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let payload = example_with_bytes("image", vec![7u8; 2 * 3 * 3]).encode_to_vec();
        let shard = dir.path().join("raw.tfrecord");
        std::fs::write(&shard, frame_records([payload.as_slice()])).unwrap();

        let samples = SourceFormat::TfRecord.discover(&shard).unwrap();
        assert_eq!(samples.len(), 1);

        let options = DecodeOptions::new(SourceFormat::TfRecord, 3, 2, 3);
        let image = SourceFormat::TfRecord
            .decoder(&options)
            .decode(&samples[0])
            .unwrap();
        assert_eq!((image.width(), image.height()), (3, 2));
    }

    #[test]
    fn test_raw_record_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let payload = example_with_bytes("image", vec![7u8; 5]).encode_to_vec();
        let shard = dir.path().join("raw.tfrecord");
        std::fs::write(&shard, frame_records([payload.as_slice()])).unwrap();

        let samples = SourceFormat::TfRecord.discover(&shard).unwrap();
        let decoder = RawRecordDecoder::new(2, 2, 3);
        assert!(matches!(
            decoder.decode(&samples[0]),
            Err(GanError::Record { .. })
        ));
    }

    #[test]
    fn test_encoded_records_across_shards() {
        let dir = tempfile::tempdir().unwrap();
        for (name, values) in [("s10.tfrecord", [30u8, 40]), ("s2.tfrecord", [10, 20])] {
            let payloads: Vec<Vec<u8>> = values
                .iter()
                .map(|&v| example_with_bytes("image/encoded", png_bytes(v)).encode_to_vec())
                .collect();
            std::fs::write(
                dir.path().join(name),
                frame_records(payloads.iter().map(|p| p.as_slice())),
            )
            .unwrap();
        }

        let samples = SourceFormat::TfRecords.discover(dir.path()).unwrap();
        assert_eq!(samples.len(), 4);

        let decoder = EncodedRecordDecoder;
        let firsts: Vec<u8> = samples
            .iter()
            .map(|s| decoder.decode(s).unwrap().to_rgb8().get_pixel(0, 0)[0])
            .collect();
        assert_eq!(firsts, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_missing_shard_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = SourceFormat::TfRecord
            .discover(&dir.path().join("absent.tfrecord"))
            .unwrap_err();
        assert!(matches!(err, GanError::NoDataFound { .. }));
    }
}
