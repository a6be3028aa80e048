use std::collections::HashMap;

use rand::{Rng, RngCore};

use fixturegen_core::ImageSpec;

/// Default cap on reusable assets per image category.
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// Logical handle to a pooled image asset. Rasterization happens outside
/// the engine; losing or skipping an assignment never invalidates a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub category: String,
    pub width: u32,
    pub height: u32,
    pub slot: usize,
}

impl ImageAsset {
    /// Stable file stem for the rasterizing collaborator.
    pub fn file_stem(&self) -> String {
        format!(
            "{}_{}x{}_{:02}",
            self.category, self.width, self.height, self.slot
        )
    }
}

/// Bounded per-category pool of image assets, reused across rows of the
/// same type as a resource optimization.
#[derive(Debug)]
pub struct ImagePool {
    capacity: usize,
    allocated: HashMap<String, usize>,
}

impl ImagePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            allocated: HashMap::new(),
        }
    }

    /// Hand out an asset for `spec`, allocating new slots until the category
    /// pool is full and reusing random slots afterwards.
    pub fn assign(&mut self, spec: &ImageSpec, rng: &mut dyn RngCore) -> ImageAsset {
        let category = spec
            .category
            .clone()
            .unwrap_or_else(|| spec.directory.clone());
        let allocated = self.allocated.entry(category.clone()).or_insert(0);
        let slot = if *allocated < self.capacity {
            *allocated += 1;
            *allocated - 1
        } else {
            rng.random_range(0..self.capacity)
        };
        ImageAsset {
            category,
            width: spec.width,
            height: spec.height,
            slot,
        }
    }
}

impl Default for ImagePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
