use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{JsonFile, StoreError};
use crate::schedule::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Open,
    Closed,
    Disabled,
}

/// Which category runs on which weekday; `None` for days without an event
pub type DayConfig = BTreeMap<String, Option<Category>>;

pub fn default_day_config() -> DayConfig {
    [
        ("monday", Some(Category::Building)),
        ("tuesday", Some(Category::Research)),
        ("wednesday", Some(Category::Training)),
        ("thursday", Some(Category::Training)),
        ("friday", Some(Category::Building)),
        ("saturday", Some(Category::Research)),
        ("sunday", Some(Category::Research)),
    ]
    .into_iter()
    .map(|(day, category)| (day.to_string(), category))
    .collect()
}

/// One preparation session, keyed by its date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub event_date: String,
    #[serde(default)]
    pub title: Option<String>,
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    pub status: EventStatus,
    #[serde(default = "default_day_config")]
    pub day_config: DayConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn accepts_registrations(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Open && self.registration_start <= now && now <= self.registration_end
    }

    /// Open events whose window has passed read as closed
    fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == EventStatus::Open && self.registration_end < now {
            self.status = EventStatus::Closed;
            self.updated_at = now;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub event_date: String,
    pub title: Option<String>,
    pub registration_start: DateTime<Utc>,
    pub registration_end: DateTime<Utc>,
    pub description: Option<String>,
    pub day_config: Option<DayConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    pub title: Option<String>,
    pub status: Option<EventStatus>,
    pub registration_start: Option<DateTime<Utc>>,
    pub registration_end: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub day_config: Option<DayConfig>,
}

pub fn validate_event_date(event_date: &str) -> Result<(), StoreError> {
    NaiveDate::parse_from_str(event_date, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| StoreError::Invalid(format!("Invalid event date: {}", event_date)))
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), StoreError> {
    if end <= start {
        return Err(StoreError::Invalid(
            "Registration end must be after registration start".to_string(),
        ));
    }
    Ok(())
}

fn validate_day_config(config: &DayConfig) -> Result<(), StoreError> {
    for day in config.keys() {
        day.parse::<Weekday>()
            .map_err(|_| StoreError::Invalid(format!("Unknown weekday in day config: {}", day)))?;
    }
    Ok(())
}

pub struct EventStore {
    file: JsonFile,
    events: Vec<Event>,
}

impl EventStore {
    pub fn open(file: JsonFile) -> Result<Self, StoreError> {
        let events: Vec<Event> = file.load()?;
        info!("Loaded {} events", events.len());
        Ok(Self { file, events })
    }

    pub fn create(&mut self, new: NewEvent, now: DateTime<Utc>) -> Result<Event, StoreError> {
        validate_event_date(&new.event_date)?;
        validate_window(new.registration_start, new.registration_end)?;
        let day_config = new.day_config.unwrap_or_else(default_day_config);
        validate_day_config(&day_config)?;

        if self.events.iter().any(|e| e.event_date == new.event_date) {
            return Err(StoreError::Conflict(format!("Event {} already exists", new.event_date)));
        }

        let event = Event {
            event_date: new.event_date,
            title: new.title,
            registration_start: new.registration_start,
            registration_end: new.registration_end,
            description: new.description,
            status: EventStatus::Open,
            day_config,
            created_at: now,
            updated_at: now,
        };
        self.events.push(event.clone());
        self.file.save(&self.events)?;
        info!("Created event {}", event.event_date);
        Ok(event)
    }

    /// Every event, newest date first
    pub fn list_all(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        self.expire_all(now)?;
        let mut events = self.events.clone();
        events.sort_by(|a, b| b.event_date.cmp(&a.event_date));
        Ok(events)
    }

    /// Open and closed events, oldest date first
    pub fn list_public(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        self.expire_all(now)?;
        Ok(self.sorted_ascending(|e| e.status != EventStatus::Disabled))
    }

    /// Events taking registrations right now, oldest date first
    pub fn list_open(&mut self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError> {
        self.expire_all(now)?;
        Ok(self.sorted_ascending(|e| e.accepts_registrations(now)))
    }

    pub fn get(&mut self, event_date: &str, now: DateTime<Utc>) -> Result<Option<Event>, StoreError> {
        self.expire_all(now)?;
        Ok(self.events.iter().find(|e| e.event_date == event_date).cloned())
    }

    pub fn update(&mut self, event_date: &str, patch: EventPatch, now: DateTime<Utc>) -> Result<Event, StoreError> {
        let event = self
            .events
            .iter_mut()
            .find(|e| e.event_date == event_date)
            .ok_or_else(|| StoreError::NotFound(format!("Event {}", event_date)))?;

        let start = patch.registration_start.unwrap_or(event.registration_start);
        let end = patch.registration_end.unwrap_or(event.registration_end);
        validate_window(start, end)?;
        if let Some(config) = &patch.day_config {
            validate_day_config(config)?;
        }

        event.registration_start = start;
        event.registration_end = end;
        if let Some(title) = patch.title {
            event.title = Some(title);
        }
        if let Some(description) = patch.description {
            event.description = Some(description);
        }
        if let Some(status) = patch.status {
            event.status = status;
        }
        if let Some(config) = patch.day_config {
            event.day_config = config;
        }
        event.updated_at = now;

        let updated = event.clone();
        self.file.save(&self.events)?;
        Ok(updated)
    }

    pub fn delete(&mut self, event_date: &str) -> Result<(), StoreError> {
        let before = self.events.len();
        self.events.retain(|e| e.event_date != event_date);
        if self.events.len() == before {
            return Err(StoreError::NotFound(format!("Event {}", event_date)));
        }
        self.file.save(&self.events)?;
        info!("Deleted event {}", event_date);
        Ok(())
    }

    fn expire_all(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut changed = false;
        for event in &mut self.events {
            if event.expire(now) {
                info!("Registration for {} has ended, closing", event.event_date);
                changed = true;
            }
        }
        if changed {
            self.file.save(&self.events)?;
        }
        Ok(())
    }

    fn sorted_ascending<F: Fn(&Event) -> bool>(&self, keep: F) -> Vec<Event> {
        let mut events: Vec<Event> = self.events.iter().filter(|e| keep(e)).cloned().collect();
        events.sort_by(|a, b| a.event_date.cmp(&b.event_date));
        events
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn new_event(date: &str, days_open: i64) -> NewEvent {
        NewEvent {
            event_date: date.to_string(),
            title: Some(format!("SvS {}", date)),
            registration_start: now() - Duration::days(1),
            registration_end: now() + Duration::days(days_open),
            description: None,
            day_config: None,
        }
    }

    #[test]
    fn create_validates_and_rejects_duplicates() {
        let mut store = EventStore::open(JsonFile::in_memory()).unwrap();
        let event = store.create(new_event("2025-06-10", 3), now()).unwrap();
        assert_eq!(event.status, EventStatus::Open);
        assert_eq!(event.day_config["tuesday"], Some(Category::Research));

        assert!(matches!(
            store.create(new_event("2025-06-10", 3), now()),
            Err(StoreError::Conflict(_))
        ));
        assert!(matches!(
            store.create(new_event("10/06/2025", 3), now()),
            Err(StoreError::Invalid(_))
        ));

        let mut backwards = new_event("2025-06-11", 3);
        backwards.registration_end = backwards.registration_start;
        assert!(store.create(backwards, now()).is_err());

        let mut bad_days = new_event("2025-06-12", 3);
        bad_days.day_config = Some([("someday".to_string(), None)].into_iter().collect());
        assert!(store.create(bad_days, now()).is_err());
    }

    #[test]
    fn expired_events_close_on_read() {
        let mut store = EventStore::open(JsonFile::in_memory()).unwrap();
        store.create(new_event("2025-06-10", 1), now()).unwrap();

        let later = now() + Duration::days(2);
        let event = store.get("2025-06-10", later).unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Closed);
        assert!(!event.accepts_registrations(later));
        assert!(store.list_open(later).unwrap().is_empty());
        assert_eq!(store.list_public(later).unwrap().len(), 1);
    }

    #[test]
    fn disabled_events_are_hidden_from_public() {
        let mut store = EventStore::open(JsonFile::in_memory()).unwrap();
        store.create(new_event("2025-06-17", 5), now()).unwrap();
        store.create(new_event("2025-06-10", 5), now()).unwrap();
        store
            .update(
                "2025-06-17",
                EventPatch {
                    status: Some(EventStatus::Disabled),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();

        let public: Vec<String> = store.list_public(now()).unwrap().into_iter().map(|e| e.event_date).collect();
        assert_eq!(public, vec!["2025-06-10"]);

        let all: Vec<String> = store.list_all(now()).unwrap().into_iter().map(|e| e.event_date).collect();
        assert_eq!(all, vec!["2025-06-17", "2025-06-10"]);
    }

    #[test]
    fn update_and_delete() {
        let mut store = EventStore::open(JsonFile::in_memory()).unwrap();
        store.create(new_event("2025-06-10", 5), now()).unwrap();

        let updated = store
            .update(
                "2025-06-10",
                EventPatch {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
                now(),
            )
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("Renamed"));

        let bad_window = EventPatch {
            registration_end: Some(now() - Duration::days(30)),
            ..Default::default()
        };
        assert!(store.update("2025-06-10", bad_window, now()).is_err());

        store.delete("2025-06-10").unwrap();
        assert!(matches!(store.delete("2025-06-10"), Err(StoreError::NotFound(_))));
    }
}
