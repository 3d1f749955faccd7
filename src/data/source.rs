use std::path::PathBuf;

use tracing::info;

use crate::data::batcher::HostBatch;
use crate::data::options::DecodeOptions;
use crate::data::stream::BatchStream;
use crate::error::{GanError, Result};

/// One independent stream per source root, in the order the roots were given.
///
/// Image-to-image setups use `first()` and `second()` as domains A and B.
pub struct InputStreams {
    streams: Vec<(String, BatchStream)>,
}

impl InputStreams {
    /// Opens a stream for every root; fails before any decoding if one is empty
    pub fn create(roots: &[PathBuf], options: &DecodeOptions) -> Result<Self> {
        if roots.is_empty() {
            return Err(GanError::config("at least one input root is required"));
        }

        let mut streams = Vec::with_capacity(roots.len());
        for root in roots {
            let stream = BatchStream::open(root, options)?;
            info!(
                root = %root.display(),
                samples = stream.len(),
                batch_size = options.batch_size,
                "opened input stream"
            );
            streams.push((root.display().to_string(), stream));
        }
        Ok(Self { streams })
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.streams.iter().map(|(name, _)| name.as_str())
    }

    pub fn get(&mut self, name: &str) -> Option<&mut BatchStream> {
        self.streams
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, stream)| stream)
    }

    /// Domain A; always present
    pub fn first(&mut self) -> &mut BatchStream {
        &mut self.streams[0].1
    }

    /// Domain B, when a second root was given
    pub fn second(&mut self) -> Option<&mut BatchStream> {
        self.streams.get_mut(1).map(|(_, stream)| stream)
    }

    /// Advances every stream by one batch, in root order
    pub fn next_batches(&mut self) -> Result<Vec<HostBatch>> {
        self.streams
            .iter_mut()
            .map(|(_, stream)| stream.next_batch())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::options::{SourceFormat, Traversal};
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn fill(dir: &Path, count: usize, value: u8) {
        for i in 0..count {
            RgbImage::from_pixel(2, 2, Rgb([value; 3]))
                .save(dir.join(format!("{i}.png")))
                .unwrap();
        }
    }

    fn options() -> DecodeOptions {
        DecodeOptions {
            batch_size: 2,
            traversal: Traversal::Sequential,
            ..DecodeOptions::new(SourceFormat::Png, 2, 2, 3)
        }
    }

    #[test]
    fn test_two_domains() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fill(a.path(), 2, 0);
        fill(b.path(), 4, 255);

        let roots = vec![a.path().to_path_buf(), b.path().to_path_buf()];
        let mut streams = InputStreams::create(&roots, &options()).unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams.first().len(), 2);
        assert_eq!(streams.second().unwrap().len(), 4);

        let name = b.path().display().to_string();
        assert!(streams.get(&name).is_some());

        let batches = streams.next_batches().unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches[0].values().all(|v| v == -1.0));
        assert!(batches[1].values().all(|v| v == 1.0));
    }

    #[test]
    fn test_empty_root_fails_construction() {
        let full = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();
        fill(full.path(), 2, 0);

        let roots = vec![full.path().to_path_buf(), empty.path().to_path_buf()];
        let err = InputStreams::create(&roots, &options()).err().unwrap();
        assert!(matches!(err, GanError::NoDataFound { .. }));
        assert!(err.to_string().contains(&empty.path().display().to_string()));
    }

    #[test]
    fn test_no_roots() {
        assert!(matches!(
            InputStreams::create(&[], &options()),
            Err(GanError::Configuration(_))
        ));
    }
}
