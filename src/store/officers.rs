use std::collections::BTreeMap;

use tracing::info;

use super::{JsonFile, StoreError};
use crate::schedule::{Category, OfficerBoard, OfficerSession, UtcOffset};

type Boards = BTreeMap<Category, OfficerBoard>;

/// Officer boards keyed by event date and category.
/// Saving a date overwrites its boards wholesale.
pub struct OfficerStore {
    file: JsonFile,
    dates: BTreeMap<String, Boards>,
}

impl OfficerStore {
    pub fn open(file: JsonFile) -> Result<Self, StoreError> {
        let dates: BTreeMap<String, Boards> = file.load()?;
        info!("Loaded officer boards for {} event dates", dates.len());
        Ok(Self { file, dates })
    }

    pub fn get(&self, event_date: &str) -> Boards {
        self.dates.get(event_date).cloned().unwrap_or_default()
    }

    /// Loads a date into an editable session. The window offset comes from
    /// the research board when one is stored.
    pub fn session(&self, event_date: &str, default_offset: UtcOffset) -> OfficerSession {
        let boards = self.get(event_date);
        let utc_offset = boards
            .get(&Category::Research)
            .or_else(|| boards.values().next())
            .map(|b| b.utc_offset)
            .unwrap_or(default_offset);
        OfficerSession::load(event_date, utc_offset, boards)
    }

    pub fn save(&mut self, event_date: &str, boards: Boards) -> Result<(), StoreError> {
        self.dates.insert(event_date.to_string(), boards);
        self.file.save(&self.dates)
    }

    /// Replaces a single category board, leaving the date's other boards alone
    pub fn save_board(&mut self, event_date: &str, board: OfficerBoard) -> Result<(), StoreError> {
        self.dates
            .entry(event_date.to_string())
            .or_default()
            .insert(board.category, board);
        self.file.save(&self.dates)
    }

    pub fn save_session(&mut self, session: &OfficerSession) -> Result<(), StoreError> {
        self.save(&session.event_date, session.boards().clone())
    }

    /// Event dates with stored boards, newest first
    pub fn event_dates(&self) -> Vec<String> {
        self.dates.keys().rev().cloned().collect()
    }

    pub fn delete(&mut self, event_date: &str) -> Result<(), StoreError> {
        if self.dates.remove(event_date).is_none() {
            return Err(StoreError::NotFound(format!("Officer boards for {}", event_date)));
        }
        self.file.save(&self.dates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Assignment;

    fn assignment(id: &str) -> Assignment {
        Assignment {
            registration_id: id.to_string(),
            player_id: format!("p-{}", id),
            player_name: id.to_string(),
            alliance: "TWN".to_string(),
            avatar_image: Some("https://example.com/a.png".to_string()),
            stove_lv: 30,
        }
    }

    #[test]
    fn saved_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = OfficerStore::open(JsonFile::at(dir.path(), "officers.json")).unwrap();

        let mut session = store.session("2025-06-10", "01:00".parse().unwrap());
        session.place(Category::Training, 3, assignment("a")).unwrap();
        store.save_session(&session).unwrap();

        let reopened = OfficerStore::open(JsonFile::at(dir.path(), "officers.json")).unwrap();
        let loaded = reopened.session("2025-06-10", UtcOffset::default());
        assert_eq!(loaded.utc_offset().to_string(), "01:00");
        assert_eq!(
            loaded.board(Category::Training).get(3).map(|a| a.player_id.as_str()),
            Some("p-a")
        );
        assert_eq!(loaded.board(Category::Research).assigned_count(), 0);
    }

    #[test]
    fn save_overwrites_whole_date() {
        let mut store = OfficerStore::open(JsonFile::in_memory()).unwrap();
        let mut session = store.session("2025-06-10", UtcOffset::default());
        session.place(Category::Research, 0, assignment("a")).unwrap();
        store.save_session(&session).unwrap();

        let empty = OfficerSession::new("2025-06-10", UtcOffset::default());
        store.save_session(&empty).unwrap();
        assert_eq!(store.get("2025-06-10")[&Category::Research].assigned_count(), 0);
    }

    #[test]
    fn save_board_keeps_other_categories() {
        let mut store = OfficerStore::open(JsonFile::in_memory()).unwrap();
        let mut session = store.session("2025-06-10", UtcOffset::default());
        session.place(Category::Research, 0, assignment("a")).unwrap();
        store.save_session(&session).unwrap();

        let mut building = OfficerBoard::new(Category::Building, UtcOffset::default());
        building.set(4, Some(assignment("b"))).unwrap();
        store.save_board("2025-06-10", building).unwrap();

        let boards = store.get("2025-06-10");
        assert_eq!(boards[&Category::Research].assigned_count(), 1);
        assert_eq!(boards[&Category::Building].get(4).map(|a| a.player_id.as_str()), Some("p-b"));
    }

    #[test]
    fn dates_listed_newest_first_and_deletable() {
        let mut store = OfficerStore::open(JsonFile::in_memory()).unwrap();
        for date in ["2025-06-03", "2025-06-17", "2025-06-10"] {
            let session = OfficerSession::new(date, UtcOffset::default());
            store.save_session(&session).unwrap();
        }
        assert_eq!(store.event_dates(), vec!["2025-06-17", "2025-06-10", "2025-06-03"]);

        store.delete("2025-06-10").unwrap();
        assert_eq!(store.event_dates().len(), 2);
        assert!(matches!(store.delete("2025-06-10"), Err(StoreError::NotFound(_))));
    }
}
