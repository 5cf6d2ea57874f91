//! Ordered-sequence diffing: edit scripts with move detection.
//!
//! [`compare`] computes an Added/Deleted edit script between two ordered
//! sequences using Hirschberg's divide-and-conquer alignment — O(n·m) time
//! but only O(m) auxiliary space, no full score matrix. Two post-passes
//! refine the script: [`detect_moves`] coalesces delete/add pairs of equal
//! elements into moves, and [`replay_order`] rewrites indices so the
//! script can be replayed operation by operation against a live sequence.
//! [`changes`] runs the whole pipeline.
//!
//! This engine backs every bulk replace of a multi-valued feature: the
//! model diffs the old against the new list and raises one fine-grained
//! notification per change.

mod moves;
mod replay;

pub use moves::{detect_moves, detect_moves_by};
pub use replay::{replay, replay_order};

/// One operation of an edit script over an ordered sequence.
///
/// `left_index` positions refer to the old ("left") sequence,
/// `right_index` positions to the new ("right") one. After
/// [`replay_order`], indices are relative to the sequence as mutated by
/// all prior operations of the same script.
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange<T> {
    Added { element: T, right_index: usize },
    Deleted { element: T, left_index: usize },
    Replaced { left: T, index: usize, right: T },
    Moved {
        left: T,
        left_index: usize,
        right: T,
        right_index: usize,
    },
}

/// Diffs `left` against `right` with `PartialEq` equality.
///
/// Output lists all deletions ordered by left index, then all additions
/// ordered by right index; indices are absolute positions in the two
/// input sequences.
pub fn compare<T: Clone + PartialEq>(left: &[T], right: &[T]) -> Vec<ListChange<T>> {
    compare_by(left, right, |a, b| a == b)
}

/// Diffs `left` against `right` with a supplied equality.
pub fn compare_by<T: Clone>(
    left: &[T],
    right: &[T],
    eq: impl Fn(&T, &T) -> bool,
) -> Vec<ListChange<T>> {
    let mut deletes = Vec::new();
    let mut adds = Vec::new();
    align(left, 0, right, 0, &eq, &mut deletes, &mut adds);
    deletes.extend(adds);
    deletes
}

/// Full pipeline: compare, detect moves, normalize for replay.
pub fn changes<T: Clone + PartialEq>(left: &[T], right: &[T]) -> Vec<ListChange<T>> {
    changes_by(left, right, |a, b| a == b)
}

/// Full pipeline with a supplied equality.
pub fn changes_by<T: Clone>(
    left: &[T],
    right: &[T],
    eq: impl Fn(&T, &T) -> bool,
) -> Vec<ListChange<T>> {
    let script = compare_by(left, right, &eq);
    let script = detect_moves_by(script, &eq);
    replay_order(script, left.len())
}

fn align<T: Clone>(
    left: &[T],
    left_offset: usize,
    right: &[T],
    right_offset: usize,
    eq: &impl Fn(&T, &T) -> bool,
    deletes: &mut Vec<ListChange<T>>,
    adds: &mut Vec<ListChange<T>>,
) {
    if left.is_empty() {
        for (k, element) in right.iter().enumerate() {
            adds.push(ListChange::Added {
                element: element.clone(),
                right_index: right_offset + k,
            });
        }
        return;
    }
    if right.is_empty() {
        for (k, element) in left.iter().enumerate() {
            deletes.push(ListChange::Deleted {
                element: element.clone(),
                left_index: left_offset + k,
            });
        }
        return;
    }
    if left.len() == 1 {
        align_single(&left[0], left_offset, right, right_offset, eq, deletes, adds);
        return;
    }

    // Hirschberg: split left at its midpoint, find the right split that
    // minimizes forward + reverse alignment cost, recurse on the halves.
    let mid = left.len() / 2;
    let forward = score(&left[..mid], right, eq);
    let reverse = score_rev(&left[mid..], right, eq);
    let split = (0..=right.len())
        .min_by_key(|j| forward[*j] + reverse[*j])
        .expect("non-empty cost row");

    align(&left[..mid], left_offset, &right[..split], right_offset, eq, deletes, adds);
    align(
        &left[mid..],
        left_offset + mid,
        &right[split..],
        right_offset + split,
        eq,
        deletes,
        adds,
    );
}

/// Single left element: the best crossover is the first equal right
/// element, which then needs no delete; without one, the element is
/// deleted and every right element added.
fn align_single<T: Clone>(
    element: &T,
    left_offset: usize,
    right: &[T],
    right_offset: usize,
    eq: &impl Fn(&T, &T) -> bool,
    deletes: &mut Vec<ListChange<T>>,
    adds: &mut Vec<ListChange<T>>,
) {
    let crossover = right.iter().position(|candidate| eq(element, candidate));
    if crossover.is_none() {
        deletes.push(ListChange::Deleted {
            element: element.clone(),
            left_index: left_offset,
        });
    }
    for (k, candidate) in right.iter().enumerate() {
        if Some(k) != crossover {
            adds.push(ListChange::Added {
                element: candidate.clone(),
                right_index: right_offset + k,
            });
        }
    }
}

/// Forward cost pass: `row[j]` = alignment cost of `left` against
/// `right[..j]`. Two rolling rows, unit indel cost, unit mismatch cost
/// (the mismatch cost only steers the split; substitutions are never
/// emitted).
fn score<T>(left: &[T], right: &[T], eq: &impl Fn(&T, &T) -> bool) -> Vec<usize> {
    let n = right.len();
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];
    for (i, left_element) in left.iter().enumerate() {
        curr[0] = i + 1;
        for (j, right_element) in right.iter().enumerate() {
            let substitute = prev[j] + usize::from(!eq(left_element, right_element));
            curr[j + 1] = substitute.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev
}

/// Reverse cost pass: `row[j]` = alignment cost of `left` against
/// `right[j..]`.
fn score_rev<T>(left: &[T], right: &[T], eq: &impl Fn(&T, &T) -> bool) -> Vec<usize> {
    let n = right.len();
    let mut prev: Vec<usize> = (0..=n).map(|j| n - j).collect();
    let mut curr = vec![0usize; n + 1];
    for (i, left_element) in left.iter().enumerate().rev() {
        curr[n] = left.len() - i;
        for j in (0..n).rev() {
            let substitute = prev[j + 1] + usize::from(!eq(left_element, &right[j]));
            curr[j] = substitute.min(prev[j] + 1).min(curr[j + 1] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev
}
