//! Train/validation splitting of an already shuffled list.

use facever_core::SplitThreshold;
use serde::{Deserialize, Serialize};

/// Items divided into train and validation subsets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
}

impl<T> Split<T> {
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.validation.is_empty()
    }
}

/// The leading `threshold.validation_len(..)` items become the validation
/// subset, the remainder the training subset. Order is preserved.
pub fn split_validation_first<T>(mut items: Vec<T>, threshold: SplitThreshold) -> Split<T> {
    let n_valid = threshold.validation_len(items.len());
    let train = items.split_off(n_valid);
    Split {
        train,
        validation: items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_by_count() {
        let split = split_validation_first((0..10).collect(), SplitThreshold::Count(3));
        assert_eq!(split.validation, vec![0, 1, 2]);
        assert_eq!(split.train, (3..10).collect::<Vec<_>>());
        assert_eq!(split.len(), 10);
    }

    #[test]
    fn test_split_count_larger_than_list() {
        let split = split_validation_first(vec!['a', 'b'], SplitThreshold::Count(1000));
        assert_eq!(split.validation, vec!['a', 'b']);
        assert!(split.train.is_empty());
    }

    #[test]
    fn test_split_by_ratio() {
        let split = split_validation_first((0..9).collect::<Vec<u32>>(), SplitThreshold::Ratio(0.5));
        assert_eq!(split.validation.len(), 4);
        assert_eq!(split.train.len(), 5);
        assert_eq!(split.train[0], 4);
    }

    #[test]
    fn test_split_empty() {
        let split = split_validation_first(Vec::<u8>::new(), SplitThreshold::Count(10));
        assert!(split.is_empty());
    }
}
