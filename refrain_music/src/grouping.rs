// Deterministic regrouping of unit sequences.
//
// Grouping turns a flat sequence into runs that can themselves be walked as
// Markov states (generate.rs `generate_grouped`), then flattened back. None
// of these functions draw randomness.

use crate::error::ValidationError;
use std::collections::BTreeSet;

/// Maximal runs of adjacent equal elements.
///
/// `[1, 2, 2, 1, 1, 1, 3]` → `[[1], [2, 2], [1, 1, 1], [3]]`.
pub fn group_by_pitch<T: PartialEq + Clone>(
    sequence: &[T],
) -> Result<Vec<Vec<T>>, ValidationError> {
    if sequence.is_empty() {
        return Err(ValidationError::EmptySequence);
    }
    Ok(sequence.chunk_by(|a, b| a == b).map(<[T]>::to_vec).collect())
}

/// Split so that pauses glue onto the material that follows them.
///
/// A group closes right before a pause that follows a non-pause element;
/// consecutive pauses stay together. With `P` the pause,
/// `[1, P, 2, 3, P, P, 4]` → `[[1], [P, 2, 3], [P, P, 4]]`.
pub fn group_by_pauses<T: PartialEq + Clone>(
    sequence: &[T],
    pause: &T,
) -> Result<Vec<Vec<T>>, ValidationError> {
    if sequence.is_empty() {
        return Err(ValidationError::EmptySequence);
    }
    Ok(sequence
        .chunk_by(|a, b| a == pause || b != pause)
        .map(<[T]>::to_vec)
        .collect())
}

/// Fixed-size groups; the last one may be shorter.
pub fn group_in_chunks<T: Clone>(
    sequence: &[T],
    chunk_size: usize,
) -> Result<Vec<Vec<T>>, ValidationError> {
    if chunk_size == 0 {
        return Err(ValidationError::ZeroChunkSize);
    }
    Ok(sequence.chunks(chunk_size).map(<[T]>::to_vec).collect())
}

/// Concatenate groups back into one sequence.
pub fn flatten<T, G: IntoIterator<Item = T>>(groups: impl IntoIterator<Item = G>) -> Vec<T> {
    groups.into_iter().flatten().collect()
}

/// Distinct elements in order of first appearance.
pub fn ordered_set<T: Ord + Clone>(sequence: &[T]) -> Vec<T> {
    let mut seen = BTreeSet::new();
    sequence
        .iter()
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Unit, notes};

    #[test]
    fn test_group_by_pitch_reference() {
        let groups = group_by_pitch(&notes(&[1, 2, 2, 1, 1, 1, 3, 1, 3, 2])).unwrap();
        let expected: Vec<Vec<Unit>> = vec![
            notes(&[1]),
            notes(&[2, 2]),
            notes(&[1, 1, 1]),
            notes(&[3]),
            notes(&[1]),
            notes(&[3]),
            notes(&[2]),
        ];
        assert_eq!(groups, expected);
    }

    #[test]
    fn test_group_by_pauses() {
        let p = 5u8;
        assert_eq!(
            group_by_pauses(&[1, p, 2, 3, p, p, 4], &p).unwrap(),
            vec![vec![1], vec![p, 2, 3], vec![p, p, 4]]
        );
        assert_eq!(group_by_pauses(&[p, 1, 2], &p).unwrap(), vec![vec![p, 1, 2]]);
        assert_eq!(group_by_pauses(&[1, 2, p], &p).unwrap(), vec![vec![1, 2], vec![p]]);
        assert_eq!(group_by_pauses(&[p], &p).unwrap(), vec![vec![p]]);
    }

    #[test]
    fn test_empty_input_rejected() {
        let empty: [u8; 0] = [];
        assert_eq!(group_by_pitch(&empty), Err(ValidationError::EmptySequence));
        assert_eq!(group_by_pauses(&empty, &5), Err(ValidationError::EmptySequence));
    }

    #[test]
    fn test_group_in_chunks_keeps_remainder() {
        assert_eq!(
            group_in_chunks(&[1, 2, 3, 4, 5, 6, 7], 3).unwrap(),
            vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]
        );
        assert_eq!(group_in_chunks(&[1, 2], 0), Err(ValidationError::ZeroChunkSize));
        assert!(group_in_chunks::<u8>(&[], 2).unwrap().is_empty());
    }

    #[test]
    fn test_flatten_inverts_grouping() {
        let seq = [4u8, 4, 5, 7, 7, 7, 5];
        assert_eq!(flatten(group_by_pitch(&seq).unwrap()), seq.to_vec());
        assert_eq!(flatten(group_by_pauses(&seq, &5).unwrap()), seq.to_vec());
        assert_eq!(flatten(group_in_chunks(&seq, 2).unwrap()), seq.to_vec());
    }

    #[test]
    fn test_ordered_set() {
        assert_eq!(ordered_set(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
