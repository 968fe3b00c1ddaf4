//! Output delivery to the host.

use comfydeploy_core::asset::DecodedImage;

/// Receives decoded assets one at a time as downloads complete.
///
/// Delivery order follows completion order, not output order.
pub trait OutputSink: Send {
    fn deliver(&mut self, asset: DecodedImage);
}

impl<F> OutputSink for F
where
    F: FnMut(DecodedImage) + Send,
{
    fn deliver(&mut self, asset: DecodedImage) {
        self(asset)
    }
}

/// Sink that appends every delivered asset to a list.
#[derive(Debug, Default)]
pub struct CollectSink {
    images: Vec<DecodedImage>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn into_images(self) -> Vec<DecodedImage> {
        self.images
    }
}

impl OutputSink for CollectSink {
    fn deliver(&mut self, asset: DecodedImage) {
        self.images.push(asset);
    }
}
