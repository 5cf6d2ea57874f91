//! Move detection over raw edit scripts.

use super::ListChange;

/// Coalesces delete/add pairs of equal elements into moves, with
/// `PartialEq` equality.
pub fn detect_moves<T: Clone + PartialEq>(script: Vec<ListChange<T>>) -> Vec<ListChange<T>> {
    detect_moves_by(script, |a, b| a == b)
}

/// Coalesces delete/add pairs of equal elements into moves.
///
/// Scans the script front to back; a `Deleted` is paired with the first
/// later `Added` whose element compares equal, and the pair becomes one
/// `Moved` in the `Deleted`'s place. Pairing is first-match-forward, not
/// globally optimal — downstream replay depends on this exact behavior,
/// so it stays as is.
pub fn detect_moves_by<T: Clone>(
    mut script: Vec<ListChange<T>>,
    eq: impl Fn(&T, &T) -> bool,
) -> Vec<ListChange<T>> {
    let mut position = 0;
    while position < script.len() {
        let ListChange::Deleted {
            element: deleted_element,
            left_index,
        } = script[position].clone()
        else {
            position += 1;
            continue;
        };

        let partner = script.iter().enumerate().skip(position + 1).find_map(
            |(candidate_position, candidate)| match candidate {
                ListChange::Added { element, .. } if eq(&deleted_element, element) => {
                    Some(candidate_position)
                }
                _ => None,
            },
        );

        if let Some(partner) = partner {
            let ListChange::Added {
                element: added_element,
                right_index,
            } = script.remove(partner)
            else {
                unreachable!("partner position holds an Added entry");
            };
            script[position] = ListChange::Moved {
                left: deleted_element,
                left_index,
                right: added_element,
                right_index,
            };
        }
        position += 1;
    }
    script
}
