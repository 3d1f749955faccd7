use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::data::batcher::{HostBatch, ImageItem};
use crate::data::decoder::{DecoderStrategy, SampleRef};
use crate::data::options::{DecodeOptions, Traversal};
use crate::data::transform::shape_image;
use crate::error::{GanError, Result};

/// Channel capacity; zero makes every send a hand-off, so the producer holds
/// at most one finished batch the consumer has not taken yet
const CHANNEL_CAPACITY: usize = 0;

/// Infinite stream of fixed-size batches from one source root.
///
/// A background producer walks the samples (natural order or reshuffled per
/// pass), decodes each batch on a bounded worker pool and keeps at most one
/// finished batch ready ahead of the consumer. The final partial batch of a pass is
/// dropped. A decode error is delivered once and ends the stream.
pub struct BatchStream {
    root: PathBuf,
    receiver: Option<Receiver<Result<HostBatch>>>,
    producer: Option<thread::JoinHandle<()>>,
    samples: usize,
}

impl BatchStream {
    pub fn open(root: &Path, options: &DecodeOptions) -> Result<Self> {
        options.validate()?;
        let samples = options.format.discover(root)?;
        if samples.len() < options.batch_size {
            return Err(GanError::InsufficientData {
                path: root.to_path_buf(),
                found: samples.len(),
                batch_size: options.batch_size,
            });
        }
        let decoder = options.format.decoder(options);
        Self::spawn(root, samples, decoder, options.clone())
    }

    fn spawn(
        root: &Path,
        samples: Vec<SampleRef>,
        decoder: Arc<dyn DecoderStrategy>,
        options: DecodeOptions,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.decode_workers)
            .thread_name(|i| format!("gan-decode-{i}"))
            .build()
            .map_err(|e| GanError::config(format!("failed to start decode workers: {e}")))?;

        let count = samples.len();
        let (sender, receiver) = mpsc::sync_channel(CHANNEL_CAPACITY);
        let producer = Producer {
            samples,
            decoder,
            options,
            pool,
        };
        let name = root.display().to_string();
        let handle = thread::Builder::new()
            .name(format!("gan-input-{name}"))
            .spawn(move || producer.run(sender))
            .map_err(|e| GanError::io(root, e))?;

        Ok(Self {
            root: root.to_path_buf(),
            receiver: Some(receiver),
            producer: Some(handle),
            samples: count,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of samples in one pass
    pub fn len(&self) -> usize {
        self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Blocks until the next batch is ready
    pub fn next_batch(&mut self) -> Result<HostBatch> {
        self.next()
            .unwrap_or_else(|| Err(GanError::StreamClosed(self.root.display().to_string())))
    }
}

impl Iterator for BatchStream {
    type Item = Result<HostBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.as_ref()?.recv().ok()
    }
}

impl Drop for BatchStream {
    fn drop(&mut self) {
        // closing the channel makes the producer's next send fail
        drop(self.receiver.take());
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                warn!(root = %self.root.display(), "input producer panicked");
            }
        }
    }
}

struct Producer {
    samples: Vec<SampleRef>,
    decoder: Arc<dyn DecoderStrategy>,
    options: DecodeOptions,
    pool: ThreadPool,
}

impl Producer {
    fn run(self, sender: SyncSender<Result<HostBatch>>) {
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..self.samples.len()).collect();
        let mut pass = 0u64;

        loop {
            if self.options.traversal == Traversal::Shuffled {
                order.shuffle(&mut rng);
            }

            for chunk in order.chunks_exact(self.options.batch_size) {
                let batch = self.decode_batch(chunk);
                let failed = batch.is_err();
                if sender.send(batch).is_err() {
                    debug!("input stream dropped, stopping producer");
                    return;
                }
                if failed {
                    return;
                }
            }

            pass += 1;
            debug!(pass, "input pass complete");
        }
    }

    /// Decodes in parallel; collection keeps the chunk order
    fn decode_batch(&self, chunk: &[usize]) -> Result<HostBatch> {
        let items = self.pool.install(|| {
            chunk
                .par_iter()
                .map(|&index| self.load_item(&self.samples[index]))
                .collect::<Result<Vec<ImageItem>>>()
        })?;
        Ok(HostBatch::new(items))
    }

    fn load_item(&self, sample: &SampleRef) -> Result<ImageItem> {
        let source = sample.to_string();
        let image = self.decoder.decode(sample)?;
        let pixels = shape_image(image, &self.options, &source)?;
        Ok(ImageItem {
            pixels: pixels.normalized(),
            height: pixels.height,
            width: pixels.width,
            channels: pixels.channels,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::options::SourceFormat;
    use crate::data::transform::ShapePolicy;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn write_png(dir: &Path, name: &str, value: u8, size: u32) {
        RgbImage::from_pixel(size, size, Rgb([value, value, value]))
            .save(dir.join(name))
            .unwrap();
    }

    fn options(batch_size: usize, traversal: Traversal) -> DecodeOptions {
        DecodeOptions {
            batch_size,
            traversal,
            decode_workers: 2,
            ..DecodeOptions::new(SourceFormat::Png, 4, 4, 3)
        }
    }

    fn file_names(batch: &HostBatch) -> Vec<String> {
        batch
            .sources()
            .iter()
            .map(|s| Path::new(s).file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_sequential_order_repeats_on_wraparound() {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in ["img10.png", "img2.png", "img1.png", "img3.png"].iter().enumerate() {
            write_png(dir.path(), name, (i * 40) as u8, 4);
        }

        let mut stream = BatchStream::open(dir.path(), &options(2, Traversal::Sequential)).unwrap();
        let passes: Vec<Vec<String>> = (0..4)
            .map(|_| file_names(&stream.next_batch().unwrap()))
            .collect();

        assert_eq!(passes[0], vec!["img1.png", "img2.png"]);
        assert_eq!(passes[1], vec!["img3.png", "img10.png"]);
        assert_eq!(passes[2], passes[0]);
        assert_eq!(passes[3], passes[1]);
    }

    #[test]
    fn test_batches_have_fixed_shape_and_range() {
        let dir = tempfile::tempdir().unwrap();
        for (i, value) in [0u8, 255, 128, 7, 99].iter().enumerate() {
            write_png(dir.path(), &format!("{i}.png"), *value, 6);
        }

        for policy in [ShapePolicy::CenterCrop, ShapePolicy::Resize, ShapePolicy::RandomCrop] {
            let opts = DecodeOptions {
                policy,
                ..options(2, Traversal::Shuffled)
            };
            let mut stream = BatchStream::open(dir.path(), &opts).unwrap();
            for _ in 0..5 {
                let batch = stream.next_batch().unwrap();
                assert_eq!(batch.shape(), [2, 4, 4, 3]);
                assert!(batch.values().all(|v| (-1.0..=1.0).contains(&v)));
            }
        }
    }

    #[test]
    fn test_partial_batch_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_png(dir.path(), &format!("{i}.png"), 10 * i as u8, 4);
        }

        let mut stream = BatchStream::open(dir.path(), &options(2, Traversal::Sequential)).unwrap();
        let names: Vec<Vec<String>> = (0..3)
            .map(|_| file_names(&stream.next_batch().unwrap()))
            .collect();
        // 4.png never appears: the pass ends after two full batches
        assert_eq!(names[2], vec!["0.png", "1.png"]);
    }

    #[test]
    fn test_shuffled_passes_differ() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            write_png(dir.path(), &format!("{i}.png"), 10 * i as u8, 4);
        }

        let mut stream = BatchStream::open(dir.path(), &options(1, Traversal::Shuffled)).unwrap();
        let mut pass = || -> Vec<String> {
            (0..6)
                .flat_map(|_| file_names(&stream.next_batch().unwrap()))
                .collect()
        };
        let first = pass();
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted.len(), 6);
        sorted.dedup();
        assert_eq!(sorted.len(), 6, "every sample appears once per pass");

        let differs = (0..10).any(|_| pass() != first);
        assert!(differs, "ten reshuffled passes all matched the first");
    }

    #[test]
    fn test_seeded_shuffle_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..6 {
            write_png(dir.path(), &format!("{i}.png"), 10 * i as u8, 4);
        }
        let opts = DecodeOptions {
            seed: Some(17),
            ..options(3, Traversal::Shuffled)
        };

        let mut a = BatchStream::open(dir.path(), &opts).unwrap();
        let mut b = BatchStream::open(dir.path(), &opts).unwrap();
        for _ in 0..4 {
            assert_eq!(
                file_names(&a.next_batch().unwrap()),
                file_names(&b.next_batch().unwrap())
            );
        }
    }

    #[test]
    fn test_too_few_samples_for_a_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "only.png", 1, 4);
        let err = BatchStream::open(dir.path(), &options(2, Traversal::Sequential))
            .err()
            .unwrap();
        assert!(matches!(err, GanError::InsufficientData { found: 1, .. }));
    }

    #[test]
    fn test_decode_error_surfaces_in_stream() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 1, 4);
        write_png(dir.path(), "b.png", 1, 5);

        let mut stream = BatchStream::open(dir.path(), &options(2, Traversal::Sequential)).unwrap();
        let err = stream.next_batch().unwrap_err();
        assert!(matches!(err, GanError::ShapeMismatch { .. }));
        assert!(matches!(stream.next_batch(), Err(GanError::StreamClosed(_))));
    }

    struct CountingDecoder {
        decoded: Arc<AtomicUsize>,
    }

    impl DecoderStrategy for CountingDecoder {
        fn decode(&self, _sample: &SampleRef) -> Result<DynamicImage> {
            self.decoded.fetch_add(1, Ordering::SeqCst);
            Ok(DynamicImage::ImageRgb8(RgbImage::new(4, 4)))
        }
    }

    /// Waits for the producer to reach `target` decodes, then gives it time to overshoot
    fn settled_count(decoded: &AtomicUsize, target: usize) -> usize {
        let deadline = Instant::now() + Duration::from_secs(5);
        while decoded.load(Ordering::SeqCst) < target && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(300));
        decoded.load(Ordering::SeqCst)
    }

    #[test]
    fn test_producer_reads_at_most_one_batch_ahead() {
        let decoded = Arc::new(AtomicUsize::new(0));
        let samples = (0..20)
            .map(|i| SampleRef::File(PathBuf::from(format!("{i}.png"))))
            .collect();
        let decoder = Arc::new(CountingDecoder {
            decoded: decoded.clone(),
        });

        let mut stream = BatchStream::spawn(
            Path::new("counting"),
            samples,
            decoder,
            options(2, Traversal::Sequential),
        )
        .unwrap();

        assert_eq!(settled_count(&decoded, 2), 2);
        stream.next_batch().unwrap();
        assert_eq!(settled_count(&decoded, 4), 4);
        stream.next_batch().unwrap();
        assert_eq!(settled_count(&decoded, 6), 6);
    }
}
