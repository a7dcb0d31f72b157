//! Random train/eval split of a dataset, computed once per run.

use crate::error::{TrainError, TrainResult};
use rand::Rng;
use rand::seq::SliceRandom;

/// Disjoint train and eval index sets over `0..total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub eval: Vec<usize>,
}

impl Partition {
    /// Number of samples the split covers.
    pub fn total(&self) -> usize {
        self.train.len() + self.eval.len()
    }
}

/// Number of training samples for `total` samples at `ratio` (floored).
pub fn train_len(total: usize, ratio: f64) -> usize {
    ((total as f64) * ratio).floor() as usize
}

/// Shuffle `0..total` and cut it at `train_len(total, ratio)`.
///
/// Fails with [`TrainError::EmptyPartition`] if either side would be empty.
pub fn random_split<R: Rng + ?Sized>(
    total: usize,
    ratio: f64,
    rng: &mut R,
) -> TrainResult<Partition> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(TrainError::invalid_input(format!(
            "split ratio must be in (0, 1), got {ratio}"
        )));
    }
    let n_train = train_len(total, ratio).min(total);
    if n_train == 0 {
        return Err(TrainError::EmptyPartition {
            partition: "train",
            total,
            ratio,
        });
    }
    if n_train == total {
        return Err(TrainError::EmptyPartition {
            partition: "eval",
            total,
            ratio,
        });
    }

    let mut indices: Vec<usize> = (0..total).collect();
    indices.shuffle(rng);
    let eval = indices.split_off(n_train);
    Ok(Partition {
        train: indices,
        eval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn test_split_sizes_for_hundred() {
        let mut rng = StdRng::seed_from_u64(7);
        let partition = random_split(100, 0.9, &mut rng).unwrap();
        assert_eq!(partition.train.len(), 90);
        assert_eq!(partition.eval.len(), 10);

        let train: HashSet<_> = partition.train.iter().collect();
        assert!(partition.eval.iter().all(|i| !train.contains(i)));
    }

    #[test]
    fn test_split_floors_train_side() {
        assert_eq!(train_len(15, 0.9), 13);
        assert_eq!(train_len(3860, 0.9), 3474);
    }

    #[test]
    fn test_split_rejects_empty_eval() {
        // floor(0.9 * 10) == 9, floor(0.9 * 1) == 0
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_split(10, 0.9, &mut rng).is_ok());
        match random_split(1, 0.9, &mut rng) {
            Err(TrainError::EmptyPartition { partition, .. }) => assert_eq!(partition, "train"),
            other => panic!("expected empty train partition, got {other:?}"),
        }
        match random_split(0, 0.9, &mut rng) {
            Err(TrainError::EmptyPartition { partition, .. }) => assert_eq!(partition, "train"),
            other => panic!("expected empty train partition, got {other:?}"),
        }
    }

    #[test]
    fn test_split_is_reproducible_with_seed() {
        let a = random_split(50, 0.9, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = random_split(50, 0.9, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }
}
