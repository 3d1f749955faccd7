pub mod batcher;
pub mod decoder;
pub mod discovery;
pub mod options;
pub mod record;
pub mod source;
pub mod stream;
pub mod transform;

pub use batcher::{HostBatch, ImageBatcher, ImageItem};
pub use decoder::{DecoderStrategy, SampleRef};
pub use discovery::{discover_files, natural_cmp};
pub use options::{DecodeOptions, InputConfig, SourceFormat, Traversal};
pub use source::InputStreams;
pub use stream::BatchStream;
pub use transform::ShapePolicy;
