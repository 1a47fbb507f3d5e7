use std::collections::BTreeMap;

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{JsonFile, StoreError};
use crate::schedule::{Category, Registration, Signup};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionFilter {
    pub event_date: Option<String>,
    pub category: Option<Category>,
}

impl SubmissionFilter {
    fn matches(&self, registration: &Registration) -> bool {
        let date_ok = match &self.event_date {
            Some(date) => registration.event_date.as_deref() == Some(date.as_str()),
            None => true,
        };
        let category_ok = match self.category {
            Some(category) => registration.signups.contains_key(&category),
            None => true,
        };
        date_ok && category_ok
    }
}

/// Fields an admin may change on a registration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPatch {
    pub alliance: Option<String>,
    pub player_name: Option<String>,
    pub signups: Option<BTreeMap<Category, Signup>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub replaced: usize,
}

pub fn new_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

/// Member registrations, kept in submission order
pub struct SubmissionStore {
    file: JsonFile,
    registrations: Vec<Registration>,
}

impl SubmissionStore {
    pub fn open(file: JsonFile) -> Result<Self, StoreError> {
        let registrations: Vec<Registration> = file.load()?;
        info!("Loaded {} registrations", registrations.len());
        Ok(Self { file, registrations })
    }

    /// Matching registrations, newest first
    pub fn list(&self, filter: &SubmissionFilter) -> Vec<Registration> {
        let mut found: Vec<Registration> = self
            .registrations
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        found
    }

    /// Registrations of one event date and category in submission order,
    /// the roster handed to the assigner
    pub fn roster(&self, event_date: &str, category: Category) -> Vec<Registration> {
        let filter = SubmissionFilter {
            event_date: Some(event_date.to_string()),
            category: Some(category),
        };
        self.registrations
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.id == id)
    }

    /// Adds a registration. A player may only hold one sign-up per category
    /// and event date.
    pub fn create(&mut self, mut registration: Registration) -> Result<Registration, StoreError> {
        self.check_conflict(&registration, None)?;
        if registration.id.is_empty() {
            registration.id = new_id();
        }

        self.registrations.push(registration.clone());
        self.file.save(&self.registrations)?;
        info!(
            "New registration {} for {} ({})",
            registration.id, registration.player_name, registration.player_id
        );
        Ok(registration)
    }

    pub fn update(&mut self, id: &str, patch: RegistrationPatch) -> Result<Registration, StoreError> {
        let mut updated = self
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Registration {}", id)))?;

        if let Some(alliance) = patch.alliance.filter(|a| !a.trim().is_empty()) {
            updated.alliance = alliance;
        }
        if let Some(name) = patch.player_name.filter(|n| !n.trim().is_empty()) {
            updated.player_name = name;
        }
        if let Some(signups) = patch.signups {
            updated.signups = signups;
            self.check_conflict(&updated, Some(id))?;
        }

        if let Some(slot) = self.registrations.iter_mut().find(|r| r.id == id) {
            *slot = updated.clone();
        }
        self.file.save(&self.registrations)?;
        Ok(updated)
    }

    pub fn delete(&mut self, id: &str) -> Result<Registration, StoreError> {
        let index = self
            .registrations
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("Registration {}", id)))?;
        let removed = self.registrations.remove(index);
        self.file.save(&self.registrations)?;
        Ok(removed)
    }

    /// Merges imported rows: the imported registration becomes the player's
    /// only one for that event date. It takes the place and id of the first
    /// existing one; any others for the same player and date are dropped.
    pub fn import(&mut self, imported: Vec<Registration>) -> Result<ImportSummary, StoreError> {
        let mut summary = ImportSummary::default();
        for mut registration in imported {
            let player_id = registration.player_id.clone();
            let event_date = registration.event_date.clone();
            let same_player = |r: &Registration| r.player_id == player_id && r.event_date == event_date;

            match self.registrations.iter().position(|r| same_player(r)) {
                Some(index) => {
                    let keep_id = self.registrations[index].id.clone();
                    let before = self.registrations.len();
                    // later duplicates only, so `index` stays valid
                    self.registrations.retain(|r| !same_player(r) || r.id == keep_id);
                    if self.registrations.len() < before {
                        debug!(
                            "Collapsed {} extra registrations of player {}",
                            before - self.registrations.len(),
                            player_id
                        );
                    }
                    registration.id = keep_id;
                    self.registrations[index] = registration;
                    summary.replaced += 1;
                }
                None => {
                    if registration.id.is_empty() {
                        registration.id = new_id();
                    }
                    self.registrations.push(registration);
                    summary.created += 1;
                }
            }
        }
        self.file.save(&self.registrations)?;
        info!("Imported roster: {} new, {} replaced", summary.created, summary.replaced);
        Ok(summary)
    }

    fn check_conflict(&self, registration: &Registration, skip_id: Option<&str>) -> Result<(), StoreError> {
        let clash = self
            .registrations
            .iter()
            .filter(|r| Some(r.id.as_str()) != skip_id)
            .filter(|r| r.player_id == registration.player_id && r.event_date == registration.event_date)
            .flat_map(|r| r.signups.keys())
            .find(|c| registration.signups.contains_key(*c));

        match clash {
            Some(category) => Err(StoreError::Conflict(format!(
                "Player {} already registered for {}, edit the existing registration instead",
                registration.player_id, category
            ))),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TimeRange;

    fn registration(player_id: &str, categories: &[Category], submitted_at: i64) -> Registration {
        Registration {
            id: String::new(),
            player_id: player_id.to_string(),
            player_name: format!("Name {}", player_id),
            alliance: "TWN".to_string(),
            avatar_image: None,
            stove_lv: 20,
            event_date: Some("2025-06-10".to_string()),
            signups: categories
                .iter()
                .map(|&c| {
                    (
                        c,
                        Signup {
                            preferences: vec![TimeRange::new("10:00", "11:00")],
                            ..Default::default()
                        },
                    )
                })
                .collect(),
            submitted_at,
        }
    }

    #[test]
    fn create_assigns_id_and_rejects_same_category_twice() {
        let mut store = SubmissionStore::open(JsonFile::in_memory()).unwrap();
        let created = store.create(registration("100", &[Category::Research], 1)).unwrap();
        assert_eq!(created.id.len(), 20);

        let err = store
            .create(registration("100", &[Category::Training, Category::Research], 2))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        store.create(registration("100", &[Category::Training], 3)).unwrap();
        let mut other_date = registration("100", &[Category::Research], 4);
        other_date.event_date = Some("2025-06-17".to_string());
        store.create(other_date).unwrap();
    }

    #[test]
    fn list_filters_and_orders_newest_first() {
        let mut store = SubmissionStore::open(JsonFile::in_memory()).unwrap();
        store.create(registration("1", &[Category::Research], 10)).unwrap();
        store.create(registration("2", &[Category::Building], 30)).unwrap();
        store.create(registration("3", &[Category::Research], 20)).unwrap();

        let all = store.list(&SubmissionFilter::default());
        let order: Vec<&str> = all.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(order, vec!["2", "3", "1"]);

        let research = store.list(&SubmissionFilter {
            event_date: Some("2025-06-10".to_string()),
            category: Some(Category::Research),
        });
        assert_eq!(research.len(), 2);

        let roster = store.roster("2025-06-10", Category::Research);
        let order: Vec<&str> = roster.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(order, vec!["1", "3"]);
    }

    #[test]
    fn update_changes_fields_and_checks_conflicts() {
        let mut store = SubmissionStore::open(JsonFile::in_memory()).unwrap();
        let first = store.create(registration("1", &[Category::Research], 1)).unwrap();
        store.create(registration("1", &[Category::Training], 2)).unwrap();

        let updated = store
            .update(
                &first.id,
                RegistrationPatch {
                    alliance: Some("NEW".to_string()),
                    player_name: Some("  ".to_string()),
                    signups: None,
                },
            )
            .unwrap();
        assert_eq!(updated.alliance, "NEW");
        assert_eq!(updated.player_name, "Name 1");

        let clash = store.update(
            &first.id,
            RegistrationPatch {
                signups: Some(registration("1", &[Category::Training], 0).signups),
                ..Default::default()
            },
        );
        assert!(matches!(clash, Err(StoreError::Conflict(_))));
        assert!(matches!(
            store.update("missing", RegistrationPatch::default()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_removes_registration() {
        let mut store = SubmissionStore::open(JsonFile::in_memory()).unwrap();
        let created = store.create(registration("1", &[Category::Research], 1)).unwrap();
        store.delete(&created.id).unwrap();
        assert!(store.get(&created.id).is_none());
        assert!(store.delete(&created.id).is_err());
    }

    #[test]
    fn import_replaces_same_player_and_date() {
        let mut store = SubmissionStore::open(JsonFile::in_memory()).unwrap();
        let existing = store.create(registration("1", &[Category::Research], 1)).unwrap();

        let summary = store
            .import(vec![
                registration("1", &[Category::Building], 5),
                registration("2", &[Category::Research], 6),
            ])
            .unwrap();
        assert_eq!(summary, ImportSummary { created: 1, replaced: 1 });

        let replaced = store.get(&existing.id).unwrap();
        assert!(replaced.signups.contains_key(&Category::Building));
        assert!(!replaced.signups.contains_key(&Category::Research));
    }

    #[test]
    fn import_collapses_every_registration_of_the_player() {
        let mut store = SubmissionStore::open(JsonFile::in_memory()).unwrap();
        let research = store.create(registration("1", &[Category::Research], 1)).unwrap();
        store.create(registration("1", &[Category::Training], 2)).unwrap();
        store.create(registration("2", &[Category::Training], 3)).unwrap();

        let summary = store.import(vec![registration("1", &[Category::Training], 4)]).unwrap();
        assert_eq!(summary, ImportSummary { created: 0, replaced: 1 });

        let training = store.roster("2025-06-10", Category::Training);
        let players: Vec<&str> = training.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(players, vec!["1", "2"]);
        assert_eq!(training[0].id, research.id);
        assert!(store.roster("2025-06-10", Category::Research).is_empty());
        assert_eq!(store.list(&SubmissionFilter::default()).len(), 2);
    }

    #[test]
    fn registrations_persist_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SubmissionStore::open(JsonFile::at(dir.path(), "registrations.json")).unwrap();
        let created = store.create(registration("1", &[Category::Research], 1)).unwrap();

        let reopened = SubmissionStore::open(JsonFile::at(dir.path(), "registrations.json")).unwrap();
        assert_eq!(reopened.get(&created.id), Some(&created));
    }
}
