//! Edit-script engine: base cases, moves, and replay consistency.

use grove::diff::{ListChange, changes, compare, replay};

fn check_replay(left: &[char], right: &[char]) {
    let script = changes(left, right);
    let mut replayed = left.to_vec();
    replay(&mut replayed, &script);
    assert_eq!(
        replayed, right,
        "replaying {script:?} over {left:?} should give {right:?}"
    );
}

#[test]
fn base_cases() {
    assert_eq!(compare::<char>(&[], &[]), vec![]);
    assert_eq!(
        compare(&['a'], &[]),
        vec![ListChange::Deleted {
            element: 'a',
            left_index: 0
        }]
    );
    assert_eq!(
        compare(&[], &['a']),
        vec![ListChange::Added {
            element: 'a',
            right_index: 0
        }]
    );
}

#[test]
fn identical_sequences_yield_empty_scripts() {
    for items in [vec![], vec!['a'], vec!['a', 'b', 'c', 'd', 'e', 'f']] {
        assert_eq!(compare(&items, &items), vec![]);
        assert_eq!(changes(&items, &items), vec![]);
    }
}

#[test]
fn rotation_replays_and_contains_a_move() {
    let script = changes(&['x', 'y', 'z'], &['z', 'x']);
    let moves = script
        .iter()
        .filter(|change| matches!(change, ListChange::Moved { .. }))
        .count();
    assert_eq!(moves, 1, "one element survives by moving: {script:?}");
    check_replay(&['x', 'y', 'z'], &['z', 'x']);
}

#[test]
fn a_unique_element_relocation_is_exactly_one_move() {
    // b occurs once on each side, at different positions; everything else
    // keeps its relative order, so the script is exactly one move.
    let script = changes(&['a', 'b', 'c', 'd'], &['a', 'c', 'd', 'b']);
    assert_eq!(script.len(), 1);
    match &script[0] {
        ListChange::Moved { left, right, .. } => {
            assert_eq!(*left, 'b');
            assert_eq!(*right, 'b');
        }
        other => panic!("expected a move, got {other:?}"),
    }
    let mut replayed = vec!['a', 'b', 'c', 'd'];
    replay(&mut replayed, &script);
    assert_eq!(replayed, vec!['a', 'c', 'd', 'b']);
}

#[test]
fn replay_covers_reversals_swaps_and_interleavings() {
    check_replay(&['a', 'b'], &['b', 'a']);
    check_replay(&['a', 'b', 'c'], &['c', 'b', 'a']);
    check_replay(&['a', 'b', 'c', 'd'], &['d', 'c', 'b', 'a']);
    check_replay(&['b', 'a'], &['a', 'x', 'b']);
    check_replay(&['a', 'b', 'c'], &['c', 'x', 'a', 'y', 'b']);
    check_replay(&['a', 'b', 'c', 'd', 'e'], &['e', 'c', 'a']);
    check_replay(&['q', 'r'], &['x', 'y', 'z']);
}

#[test]
fn replay_handles_repeated_elements() {
    check_replay(&['a', 'a', 'b'], &['b', 'a', 'a']);
    check_replay(&['a', 'b', 'a'], &['a', 'a', 'b']);
    check_replay(&['a', 'a', 'a'], &['a', 'a']);
    check_replay(&['a', 'b', 'a', 'b'], &['b', 'a', 'b', 'a']);
}

/// Exhaustive replay check over every pair of sequences up to length 3
/// from a 3-symbol universe (plus the empty sequence on both sides).
#[test]
fn replay_is_correct_for_all_short_sequences() {
    let universe = ['a', 'b', 'c'];
    let mut sequences: Vec<Vec<char>> = vec![vec![]];
    for len in 1..=3usize {
        let mut indices = vec![0usize; len];
        loop {
            sequences.push(indices.iter().map(|i| universe[*i]).collect());
            // Odometer increment over the index vector.
            let mut position = 0;
            loop {
                indices[position] += 1;
                if indices[position] < universe.len() {
                    break;
                }
                indices[position] = 0;
                position += 1;
                if position == len {
                    break;
                }
            }
            if position == len {
                break;
            }
        }
    }

    for left in &sequences {
        for right in &sequences {
            check_replay(left, right);
        }
    }
}

#[test]
fn custom_equality_flows_through_the_pipeline() {
    let script = grove::diff::changes_by(
        &["A", "b", "C"],
        &["c", "a"],
        |x, y| x.eq_ignore_ascii_case(y),
    );
    // Replay in terms of the right-hand elements.
    let mut replayed = vec!["A", "b", "C"];
    replay(&mut replayed, &script);
    let lowered: Vec<String> = replayed.iter().map(|s| s.to_lowercase()).collect();
    assert_eq!(lowered, vec!["c", "a"]);
}
