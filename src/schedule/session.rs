use std::collections::{BTreeMap, HashSet};

use thiserror::Error;
use tracing::info;

use super::assigner::assign;
use super::types::{AssignOutcome, Assignment, BoardError, Category, OfficerBoard, Registration, SortKey, UtcOffset};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("slot {0} is already taken")]
    SlotTaken(usize),

    #[error("slot {0} is empty")]
    SlotEmpty(usize),

    #[error("{0} already has an officer slot")]
    AlreadyAssigned(String),

    #[error(transparent)]
    Board(#[from] BoardError),
}

/// The three category boards of one event date, edited together so a player
/// never ends up on two of them
#[derive(Debug, Clone)]
pub struct OfficerSession {
    pub event_date: String,
    utc_offset: UtcOffset,
    boards: BTreeMap<Category, OfficerBoard>,
}

impl OfficerSession {
    pub fn new(event_date: &str, utc_offset: UtcOffset) -> Self {
        Self::load(event_date, utc_offset, BTreeMap::new())
    }

    /// Missing categories start as empty boards on `utc_offset`
    pub fn load(event_date: &str, utc_offset: UtcOffset, mut boards: BTreeMap<Category, OfficerBoard>) -> Self {
        for category in Category::ALL {
            boards
                .entry(category)
                .or_insert_with(|| OfficerBoard::new(category, utc_offset));
        }
        Self {
            event_date: event_date.to_string(),
            utc_offset,
            boards,
        }
    }

    pub fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    /// Moves every board's window to a new start time; placements keep their index
    pub fn set_utc_offset(&mut self, utc_offset: UtcOffset) {
        self.utc_offset = utc_offset;
        for board in self.boards.values_mut() {
            board.utc_offset = utc_offset;
        }
    }

    pub fn board(&self, category: Category) -> &OfficerBoard {
        // load() fills every category
        &self.boards[&category]
    }

    pub fn boards(&self) -> &BTreeMap<Category, OfficerBoard> {
        &self.boards
    }

    /// Registration and player ids placed on any of the three boards
    pub fn assigned_ids(&self) -> HashSet<String> {
        self.boards.values().flat_map(|b| b.assigned_keys()).collect()
    }

    /// Fails when one player sits on more than one board
    pub fn check_exclusive(&self) -> Result<(), SessionError> {
        let mut seen = HashSet::new();
        for board in self.boards.values() {
            for (_, assignment) in board.assigned() {
                if !seen.insert(assignment.player_id.as_str()) {
                    return Err(SessionError::AlreadyAssigned(assignment.player_name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Runs the assigner for one category and keeps its board
    pub fn auto_assign(&mut self, category: Category, registrants: &[Registration], sort_key: SortKey) -> AssignOutcome {
        let assigned = self.assigned_ids();
        let outcome = assign(registrants, self.board(category), &assigned, sort_key);
        self.boards.insert(category, outcome.board.clone());

        info!(
            "Auto-assigned {} of {} {} candidates for {} (by {})",
            outcome.assigned_count,
            outcome.candidate_count,
            category,
            self.event_date,
            sort_key.label()
        );
        outcome
    }

    pub fn place(&mut self, category: Category, index: usize, assignment: Assignment) -> Result<(), SessionError> {
        let assigned = self.assigned_ids();
        if assigned.contains(&assignment.registration_id) || assigned.contains(&assignment.player_id) {
            return Err(SessionError::AlreadyAssigned(assignment.player_name));
        }
        let board = self.board_mut(category);
        if board.get(index).is_some() {
            return Err(SessionError::SlotTaken(index));
        }
        board.set(index, Some(assignment))?;
        Ok(())
    }

    pub fn remove(&mut self, category: Category, index: usize) -> Result<Assignment, SessionError> {
        self.board_mut(category)
            .take(index)?
            .ok_or(SessionError::SlotEmpty(index))
    }

    /// Moves a placement to another slot, swapping with whoever is there
    pub fn move_assignment(&mut self, category: Category, from: usize, to: usize) -> Result<(), SessionError> {
        let board = self.board_mut(category);
        if board.get(from).is_none() {
            return Err(SessionError::SlotEmpty(from));
        }
        if from == to {
            return Ok(());
        }
        let moving = board.take(from)?;
        let displaced = match board.take(to) {
            Ok(displaced) => displaced,
            Err(e) => {
                board.set(from, moving)?;
                return Err(e.into());
            }
        };
        board.set(to, moving)?;
        board.set(from, displaced)?;
        Ok(())
    }

    pub fn clear(&mut self, category: Category) {
        self.board_mut(category).clear();
    }

    fn board_mut(&mut self, category: Category) -> &mut OfficerBoard {
        let utc_offset = self.utc_offset;
        self.boards
            .entry(category)
            .or_insert_with(|| OfficerBoard::new(category, utc_offset))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::schedule::types::{AccelTime, Resources, Signup, TimeRange};

    fn registrant(id: &str, categories: &[Category], preference: (&str, &str)) -> Registration {
        let signups: BTreeMap<Category, Signup> = categories
            .iter()
            .map(|&c| {
                (
                    c,
                    Signup {
                        resources: Resources {
                            general_accel: AccelTime::from_minutes(120),
                            ..Default::default()
                        },
                        upgrade_t11: false,
                        preferences: vec![TimeRange::new(preference.0, preference.1)],
                    },
                )
            })
            .collect();
        Registration {
            id: id.to_string(),
            player_id: format!("id-{}", id),
            player_name: id.to_uppercase(),
            alliance: "TWN".to_string(),
            avatar_image: None,
            stove_lv: 25,
            event_date: None,
            signups,
            submitted_at: 0,
        }
    }

    #[test]
    fn player_lands_on_only_one_category() {
        let roster = vec![
            registrant("a", &[Category::Research, Category::Training, Category::Building], ("10:00", "11:00")),
            registrant("b", &[Category::Training], ("10:00", "11:00")),
        ];
        let mut session = OfficerSession::new("2025-06-10", UtcOffset::default());

        let research = session.auto_assign(Category::Research, &roster, SortKey::Accel);
        let training = session.auto_assign(Category::Training, &roster, SortKey::Accel);
        let building = session.auto_assign(Category::Building, &roster, SortKey::Accel);

        assert_eq!(research.assigned_count, 1);
        assert_eq!(training.assigned_count, 1);
        assert_eq!(building.assigned_count, 0);
        assert_eq!(session.board(Category::Training).get(20).map(|a| a.registration_id.as_str()), Some("b"));

        let total: usize = session.boards().values().map(|b| b.assigned_count()).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn manual_place_respects_capacity_and_exclusivity() {
        let a = registrant("a", &[Category::Research], ("10:00", "11:00"));
        let b = registrant("b", &[Category::Research], ("10:00", "11:00"));
        let mut session = OfficerSession::new("2025-06-10", UtcOffset::default());

        session.place(Category::Research, 5, a.snapshot()).unwrap();
        assert_eq!(
            session.place(Category::Research, 5, b.snapshot()),
            Err(SessionError::SlotTaken(5))
        );
        assert_eq!(
            session.place(Category::Building, 7, a.snapshot()),
            Err(SessionError::AlreadyAssigned("A".to_string()))
        );
        assert_eq!(
            session.place(Category::Building, 48, b.snapshot()),
            Err(SessionError::Board(BoardError::OutOfRange(48)))
        );
    }

    #[test]
    fn move_swaps_occupants() {
        let a = registrant("a", &[Category::Research], ("10:00", "11:00"));
        let b = registrant("b", &[Category::Research], ("10:00", "11:00"));
        let mut session = OfficerSession::new("2025-06-10", UtcOffset::default());
        session.place(Category::Research, 1, a.snapshot()).unwrap();
        session.place(Category::Research, 2, b.snapshot()).unwrap();

        session.move_assignment(Category::Research, 1, 2).unwrap();
        let board = session.board(Category::Research);
        assert_eq!(board.get(1).map(|x| x.registration_id.as_str()), Some("b"));
        assert_eq!(board.get(2).map(|x| x.registration_id.as_str()), Some("a"));

        session.move_assignment(Category::Research, 2, 10).unwrap();
        assert!(session.board(Category::Research).is_free(2));
        assert_eq!(session.move_assignment(Category::Research, 3, 4), Err(SessionError::SlotEmpty(3)));
    }

    #[test]
    fn move_out_of_range_restores_placement() {
        let a = registrant("a", &[Category::Research], ("10:00", "11:00"));
        let mut session = OfficerSession::new("2025-06-10", UtcOffset::default());
        session.place(Category::Research, 1, a.snapshot()).unwrap();

        assert!(session.move_assignment(Category::Research, 1, 99).is_err());
        assert!(session.board(Category::Research).get(1).is_some());
    }

    #[test]
    fn remove_and_clear_free_slots() {
        let a = registrant("a", &[Category::Research], ("10:00", "11:00"));
        let b = registrant("b", &[Category::Research], ("10:00", "11:00"));
        let mut session = OfficerSession::new("2025-06-10", UtcOffset::default());
        session.place(Category::Research, 1, a.snapshot()).unwrap();
        session.place(Category::Research, 2, b.snapshot()).unwrap();

        let removed = session.remove(Category::Research, 1).unwrap();
        assert_eq!(removed.registration_id, "a");
        assert_eq!(session.remove(Category::Research, 1), Err(SessionError::SlotEmpty(1)));

        session.clear(Category::Research);
        assert!(session.assigned_ids().is_empty());
    }

    #[test]
    fn exclusivity_check_spots_player_on_two_boards() {
        let a = registrant("a", &[Category::Research], ("10:00", "11:00"));
        let mut research = OfficerBoard::new(Category::Research, UtcOffset::default());
        research.set(0, Some(a.snapshot())).unwrap();
        let mut building = OfficerBoard::new(Category::Building, UtcOffset::default());
        building.set(9, Some(a.snapshot())).unwrap();

        let boards: BTreeMap<Category, OfficerBoard> =
            [(Category::Research, research), (Category::Building, building.clone())].into_iter().collect();
        let session = OfficerSession::load("2025-06-10", UtcOffset::default(), boards);
        assert_eq!(session.check_exclusive(), Err(SessionError::AlreadyAssigned("A".to_string())));

        let only_building: BTreeMap<Category, OfficerBoard> = [(Category::Building, building)].into_iter().collect();
        let session = OfficerSession::load("2025-06-10", UtcOffset::default(), only_building);
        assert_eq!(session.check_exclusive(), Ok(()));
    }

    #[test]
    fn offset_change_moves_every_board() {
        let mut session = OfficerSession::new("2025-06-10", UtcOffset::default());
        session.set_utc_offset("06:00".parse().unwrap());
        for board in session.boards().values() {
            assert_eq!(board.slot_time(0), "06:00");
        }
    }
}
