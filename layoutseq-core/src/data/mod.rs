//! Batch schema, dataset contract, partitioning and batch iteration.

pub mod batch;
pub mod loader;
pub mod partition;

pub use batch::{BoundingBox, FrameworkMeta, LayoutBatch};
pub use loader::{Batches, DataLoader, LayoutDataset};
pub use partition::{Partition, random_split};
