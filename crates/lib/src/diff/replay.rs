//! Replay-order normalization and script replay.
//!
//! [`replay_order`] rewrites a detected script (absolute left/right
//! indices) into a replay-consistent one: every operation's indices are
//! valid against the sequence as mutated by all prior operations of the
//! same script. [`replay`] applies such a script to a live `Vec`.

use super::ListChange;

/// A token tracked through the index simulation.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Token {
    /// An element of the original left sequence, by left index.
    Left(usize),
    /// An element placed by a phase-two operation, by operation number.
    Placed(usize),
}

/// One slot of the final arrangement.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Slot {
    /// A left element that neither a delete nor a move touches.
    Kept(usize),
    /// The landing position of a phase-two operation.
    Op(usize),
}

/// Reorders a script for replay: deletions first (ascending left index,
/// each index adjusted for earlier deletions), then additions, moves, and
/// replacements ascending by final position.
///
/// `left_len` is the length of the original left sequence; move source
/// indices are computed against the simulated intermediate states, so the
/// emitted script replays correctly even when moves and insertions
/// interleave.
///
/// The input must be a script over one sequence pair as produced by
/// [`compare`](super::compare) (optionally after
/// [`detect_moves`](super::detect_moves)); indices from any other source
/// have no defined meaning here.
pub fn replay_order<T: Clone>(script: Vec<ListChange<T>>, left_len: usize) -> Vec<ListChange<T>> {
    let mut deletes: Vec<(T, usize)> = Vec::new();
    let mut phase_two: Vec<ListChange<T>> = Vec::new();
    for change in script {
        match change {
            ListChange::Deleted {
                element,
                left_index,
            } => deletes.push((element, left_index)),
            other => phase_two.push(other),
        }
    }
    deletes.sort_by_key(|(_, left_index)| *left_index);
    phase_two.sort_by_key(final_index);

    // Final arrangement: operation landings at their right indices,
    // untouched left elements filling the remaining slots in order.
    let deleted: Vec<usize> = deletes.iter().map(|(_, index)| *index).collect();
    let moved: Vec<usize> = phase_two
        .iter()
        .filter_map(|change| match change {
            ListChange::Moved { left_index, .. } => Some(*left_index),
            _ => None,
        })
        .collect();
    let kept: Vec<usize> = (0..left_len)
        .filter(|index| !deleted.contains(index) && !moved.contains(index))
        .collect();

    let mut layout: Vec<Slot> = kept.iter().map(|index| Slot::Kept(*index)).collect();
    for (op, change) in phase_two.iter().enumerate() {
        if matches!(change, ListChange::Replaced { .. }) {
            continue;
        }
        let at = final_index(change).min(layout.len());
        layout.insert(at, Slot::Op(op));
    }

    // Simulate the replay to derive each operation's live indices.
    let mut sim: Vec<Token> = (0..left_len).map(Token::Left).collect();
    let mut out = Vec::with_capacity(deletes.len() + phase_two.len());

    for (element, left_index) in deletes {
        let position = token_position(&sim, Token::Left(left_index));
        sim.remove(position);
        out.push(ListChange::Deleted {
            element,
            left_index: position,
        });
    }

    let mut placed = vec![false; phase_two.len()];
    for (op, change) in phase_two.into_iter().enumerate() {
        match change {
            ListChange::Replaced { left, index, right } => {
                // In-place: shifts nothing, needs no simulation.
                out.push(ListChange::Replaced { left, index, right });
            }
            ListChange::Added {
                element,
                right_index: _,
            } => {
                let position = insertion_position(&sim, &layout, &placed, op);
                sim.insert(position, Token::Placed(op));
                placed[op] = true;
                out.push(ListChange::Added {
                    element,
                    right_index: position,
                });
            }
            ListChange::Moved {
                left,
                left_index,
                right,
                right_index: _,
            } => {
                let from = token_position(&sim, Token::Left(left_index));
                sim.remove(from);
                let position = insertion_position(&sim, &layout, &placed, op);
                sim.insert(position, Token::Placed(op));
                placed[op] = true;
                out.push(ListChange::Moved {
                    left,
                    left_index: from,
                    right,
                    right_index: position,
                });
            }
            ListChange::Deleted { .. } => unreachable!("deletes were split off above"),
        }
    }
    out
}

fn final_index<T>(change: &ListChange<T>) -> usize {
    match change {
        ListChange::Added { right_index, .. } | ListChange::Moved { right_index, .. } => {
            *right_index
        }
        ListChange::Replaced { index, .. } => *index,
        ListChange::Deleted { left_index, .. } => *left_index,
    }
}

fn token_position(sim: &[Token], token: Token) -> usize {
    sim.iter()
        .position(|candidate| *candidate == token)
        .expect("token present in simulation")
}

/// Where operation `op` lands right now: directly after the nearest
/// predecessor in the final layout that is already in its final relative
/// position (an untouched element or an already placed operation).
/// Elements still awaiting their own move are skipped over.
fn insertion_position(sim: &[Token], layout: &[Slot], placed: &[bool], op: usize) -> usize {
    let slot = layout
        .iter()
        .position(|slot| *slot == Slot::Op(op))
        .expect("operation present in layout");
    let predecessor = layout[..slot].iter().rev().find_map(|slot| match slot {
        Slot::Kept(index) => Some(Token::Left(*index)),
        Slot::Op(earlier) if placed[*earlier] => Some(Token::Placed(*earlier)),
        Slot::Op(_) => None,
    });
    match predecessor {
        Some(token) => token_position(sim, token) + 1,
        // Final-first: land before every settled element.
        None => sim
            .iter()
            .position(|token| match token {
                Token::Left(index) => layout.contains(&Slot::Kept(*index)),
                Token::Placed(_) => true,
            })
            .unwrap_or(0),
    }
}

/// Applies a replay-ordered script to `base`, operation by operation.
pub fn replay<T: Clone>(base: &mut Vec<T>, script: &[ListChange<T>]) {
    for change in script {
        match change {
            ListChange::Deleted { left_index, .. } => {
                base.remove(*left_index);
            }
            ListChange::Added {
                element,
                right_index,
            } => base.insert(*right_index, element.clone()),
            ListChange::Replaced { index, right, .. } => base[*index] = right.clone(),
            ListChange::Moved {
                left_index,
                right_index,
                right,
                ..
            } => {
                base.remove(*left_index);
                base.insert(*right_index, right.clone());
            }
        }
    }
}
