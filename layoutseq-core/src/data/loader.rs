//! Dataset contract and batch iteration over a partition.

use crate::context::ExecutionContext;
use crate::data::batch::LayoutBatch;
use crate::error::TrainResult;
use rand::Rng;
use rand::seq::SliceRandom;

/// Source of samples plus the collation that turns them into a batch.
pub trait LayoutDataset {
    type Sample;

    /// Total number of samples.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch one sample by index.
    fn get(&self, index: usize) -> TrainResult<Self::Sample>;

    /// Collate a group of samples into a batch on `ctx.device`.
    fn collate(&self, samples: Vec<Self::Sample>, ctx: &ExecutionContext)
    -> TrainResult<LayoutBatch>;
}

/// Fixed index set of a dataset, batched in order or reshuffled per pass.
#[derive(Debug, Clone)]
pub struct DataLoader {
    indices: Vec<usize>,
    batch_size: usize,
    shuffle: bool,
}

impl DataLoader {
    /// `batch_size` of zero is treated as one.
    pub fn new(indices: Vec<usize>, batch_size: usize, shuffle: bool) -> Self {
        Self {
            indices,
            batch_size: batch_size.max(1),
            shuffle,
        }
    }

    /// Number of samples covered.
    pub fn num_samples(&self) -> usize {
        self.indices.len()
    }

    /// Number of batches per pass; the last batch may be smaller.
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    pub fn shuffles(&self) -> bool {
        self.shuffle
    }

    /// Batch index groups for one pass, shuffled if this loader shuffles.
    pub fn plan<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec<usize>> {
        let mut order = self.indices.clone();
        if self.shuffle {
            order.shuffle(rng);
        }
        order
            .chunks(self.batch_size)
            .map(<[usize]>::to_vec)
            .collect()
    }

    /// Lazily collated batches for one pass.
    pub fn iter<'a, D, R>(
        &self,
        dataset: &'a D,
        ctx: &'a ExecutionContext,
        rng: &mut R,
    ) -> Batches<'a, D>
    where
        D: LayoutDataset,
        R: Rng + ?Sized,
    {
        Batches {
            dataset,
            ctx,
            groups: self.plan(rng).into_iter(),
        }
    }
}

/// Iterator yielding collated batches; collation errors are surfaced per item.
pub struct Batches<'a, D: LayoutDataset> {
    dataset: &'a D,
    ctx: &'a ExecutionContext,
    groups: std::vec::IntoIter<Vec<usize>>,
}

impl<D: LayoutDataset> Iterator for Batches<'_, D> {
    type Item = TrainResult<LayoutBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let group = self.groups.next()?;
        let samples = group
            .into_iter()
            .map(|i| self.dataset.get(i))
            .collect::<TrainResult<Vec<_>>>();
        Some(samples.and_then(|s| self.dataset.collate(s, self.ctx)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.groups.size_hint()
    }
}

impl<D: LayoutDataset> ExactSizeIterator for Batches<'_, D> {}
