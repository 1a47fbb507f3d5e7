use std::cmp::Reverse;
use std::collections::HashSet;

use tracing::{debug, warn};

use super::slot_utils::window_contains;
use super::types::{AssignOutcome, OfficerBoard, Placement, Registration, Signup, SortKey, TimeRange, SLOT_COUNT};

/// Greedy first-fit assignment of registrants to a category board.
///
/// Registrants already on any board (`already_assigned` holds their
/// registration or player ids) are skipped, as are those without a non-zero
/// resource for the board's category. The rest are taken in descending
/// `sort_key` order, ties keeping input order, and each gets the first empty
/// slot matching their rank-1 preference, else rank 2, else rank 3.
/// Existing placements are never moved. The input board is left untouched.
pub fn assign(
    registrants: &[Registration],
    board: &OfficerBoard,
    already_assigned: &HashSet<String>,
    sort_key: SortKey,
) -> AssignOutcome {
    let category = board.category;

    let mut candidates: Vec<(&Registration, &Signup)> = registrants
        .iter()
        .filter(|r| !already_assigned.contains(&r.id) && !already_assigned.contains(&r.player_id))
        .filter_map(|r| r.signup(category).map(|signup| (r, signup)))
        .filter(|(_, signup)| category.is_eligible(&signup.resources))
        .collect();
    let candidate_count = candidates.len();

    // sort_by_key is stable, equal keys keep roster order
    candidates.sort_by_key(|(_, signup)| Reverse(sort_key.value(signup)));

    let mut board = board.clone();
    let mut placements = Vec::new();
    let mut newly_assigned: HashSet<&str> = HashSet::new();

    for (registration, signup) in candidates {
        if newly_assigned.contains(registration.id.as_str())
            || newly_assigned.contains(registration.player_id.as_str())
        {
            continue;
        }

        let Some(slot) = first_open_slot(&board, &signup.preferences) else {
            debug!(
                "No open slot for {} ({}) on {}",
                registration.player_name, registration.player_id, category
            );
            continue;
        };

        if let Err(e) = board.set(slot, Some(registration.snapshot())) {
            warn!("Could not place {}: {}", registration.player_id, e);
            continue;
        }
        debug!("Placed {} in {} slot {} ({})", registration.player_name, category, slot, board.slot_time(slot));

        newly_assigned.insert(registration.id.as_str());
        newly_assigned.insert(registration.player_id.as_str());
        placements.push(Placement {
            slot,
            registration_id: registration.id.clone(),
        });
    }

    AssignOutcome {
        assigned_count: placements.len(),
        candidate_count,
        placements,
        board,
    }
}

/// First empty slot for the highest-ranked preference that has one
fn first_open_slot(board: &OfficerBoard, preferences: &[TimeRange]) -> Option<usize> {
    preferences
        .iter()
        .filter_map(TimeRange::window)
        .find_map(|window| {
            (0..SLOT_COUNT).find(|&i| board.is_free(i) && window_contains(window, board.slot_minutes(i)))
        })
}
