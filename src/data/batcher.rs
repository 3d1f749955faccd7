use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Tensor, TensorData},
};

/// A single decoded sample, already normalized to [-1, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct ImageItem {
    /// Pixel values laid out [height, width, channels]
    pub pixels: Vec<f32>,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    /// Where the sample came from (file path or shard@offset)
    pub source: String,
}

/// A full batch as produced by a stream, still on the host
#[derive(Debug, Clone, PartialEq)]
pub struct HostBatch {
    pub items: Vec<ImageItem>,
}

impl HostBatch {
    pub fn new(items: Vec<ImageItem>) -> Self {
        Self { items }
    }

    /// [batch, height, width, channels]
    pub fn shape(&self) -> [usize; 4] {
        match self.items.first() {
            Some(item) => [self.items.len(), item.height, item.width, item.channels],
            None => [0, 0, 0, 0],
        }
    }

    pub fn sources(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.source.as_str()).collect()
    }

    /// All pixel values, batch-major
    pub fn values(&self) -> impl Iterator<Item = f32> + '_ {
        self.items.iter().flat_map(|item| item.pixels.iter().copied())
    }

    pub fn into_items(self) -> Vec<ImageItem> {
        self.items
    }
}

/// Stacks image items into a [batch, height, width, channels] tensor
#[derive(Clone, Debug, Default)]
pub struct ImageBatcher;

impl ImageBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, ImageItem, Tensor<B, 4>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> Tensor<B, 4> {
        let batch_size = items.len();
        let (height, width, channels) = items
            .first()
            .map(|item| (item.height, item.width, item.channels))
            .unwrap_or((0, 0, 0));

        let pixels_flat: Vec<f32> = items
            .into_iter()
            .flat_map(|item| item.pixels.into_iter())
            .collect();

        Tensor::<B, 4>::from_data(
            TensorData::new(pixels_flat, [batch_size, height, width, channels]),
            device,
        )
    }
}
