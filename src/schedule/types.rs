use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::slot_utils::{minutes_to_time_string, parse_time_to_minutes, preference_window};

/// Number of half-hour slots on one daily officer board
pub const SLOT_COUNT: usize = 48;

/// Length of a single slot in minutes
pub const SLOT_MINUTES: u32 = 30;

/// The three mutually exclusive officer buff categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Research,
    Training,
    Building,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Research, Category::Training, Category::Building];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Research => "research",
            Category::Training => "training",
            Category::Building => "building",
        }
    }

    pub fn day_name(&self) -> &'static str {
        match self {
            Category::Research => "Research Day",
            Category::Training => "Troops Training Day",
            Category::Building => "Construction Day",
        }
    }

    /// Whether a sign-up brings anything worth an officer slot for this category
    pub fn is_eligible(&self, resources: &Resources) -> bool {
        let category_accel = resources.category_accel.total_minutes() > 0;
        let general_accel = resources.general_accel.total_minutes() > 0;
        match self {
            Category::Research => category_accel || general_accel || resources.fire_sparkle > 0,
            Category::Training => category_accel || general_accel,
            Category::Building => {
                general_accel || resources.fire_gem > 0 || resources.refined_fire_gem > 0
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "research" => Ok(Category::Research),
            "training" | "troops" => Ok(Category::Training),
            "building" | "construction" => Ok(Category::Building),
            other => Err(format!("Unknown category: {}", other)),
        }
    }
}

/// Speedup amount as entered in game (days / hours / minutes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccelTime {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
}

impl AccelTime {
    pub fn from_minutes(total: u32) -> Self {
        Self {
            days: total / 1440,
            hours: (total % 1440) / 60,
            minutes: total % 60,
        }
    }

    /// Widened to u64 so no submitted amount can overflow
    pub fn total_minutes(&self) -> u64 {
        u64::from(self.days) * 1440 + u64::from(self.hours) * 60 + u64::from(self.minutes)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Resources {
    /// Speedups specific to the category (research, training or building)
    pub category_accel: AccelTime,
    pub general_accel: AccelTime,
    pub fire_sparkle: u32,
    pub fire_gem: u32,
    pub refined_fire_gem: u32,
}

/// A desired time range in UTC clock time, "HH:MM"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

impl TimeRange {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
        }
    }

    /// `[start, end)` in minutes, `None` if either end is malformed
    pub fn window(&self) -> Option<(u32, u32)> {
        preference_window(&self.start, &self.end)
    }
}

/// One registration for one category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signup {
    #[serde(default)]
    pub resources: Resources,
    #[serde(default, rename = "upgradeT11")]
    pub upgrade_t11: bool,
    /// Ranked preferences, rank 1 first
    #[serde(default)]
    pub preferences: Vec<TimeRange>,
}

/// A member's registration for an event date, across categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub player_id: String,
    pub player_name: String,
    pub alliance: String,
    #[serde(default)]
    pub avatar_image: Option<String>,
    #[serde(default)]
    pub stove_lv: u32,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub signups: BTreeMap<Category, Signup>,
    #[serde(default)]
    pub submitted_at: i64,
}

impl Registration {
    pub fn signup(&self, category: Category) -> Option<&Signup> {
        self.signups.get(&category)
    }

    /// Denormalized copy stored in an officer slot
    pub fn snapshot(&self) -> Assignment {
        Assignment {
            registration_id: self.id.clone(),
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            alliance: self.alliance.clone(),
            avatar_image: self.avatar_image.clone(),
            stove_lv: self.stove_lv,
        }
    }
}

/// Snapshot of a registrant taken when they were placed in a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub registration_id: String,
    pub player_id: String,
    pub player_name: String,
    pub alliance: String,
    #[serde(default)]
    pub avatar_image: Option<String>,
    #[serde(default)]
    pub stove_lv: u32,
}

/// Start of the 48-slot window, minutes after UTC midnight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UtcOffset(u32);

impl UtcOffset {
    pub fn minutes(&self) -> u32 {
        self.0
    }
}

impl FromStr for UtcOffset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_time_to_minutes(s)
            .map(UtcOffset)
            .ok_or_else(|| format!("Invalid UTC offset: {}", s))
    }
}

impl TryFrom<String> for UtcOffset {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UtcOffset> for String {
    fn from(offset: UtcOffset) -> Self {
        offset.to_string()
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&minutes_to_time_string(self.0))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BoardError {
    #[error("board has {0} slots, at most 48 allowed")]
    TooManySlots(usize),

    #[error("registration {0} is placed in more than one slot")]
    DuplicatePlayer(String),

    #[error("slot index {0} is out of range")]
    OutOfRange(usize),
}

/// Officer board for one category of one event date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoard", rename_all = "camelCase")]
pub struct OfficerBoard {
    pub category: Category,
    pub utc_offset: UtcOffset,
    slots: Vec<Option<Assignment>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBoard {
    category: Category,
    #[serde(default)]
    utc_offset: UtcOffset,
    #[serde(default)]
    slots: Vec<Option<Assignment>>,
}

impl TryFrom<RawBoard> for OfficerBoard {
    type Error = BoardError;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> {
        OfficerBoard::from_slots(raw.category, raw.utc_offset, raw.slots)
    }
}

impl OfficerBoard {
    pub fn new(category: Category, utc_offset: UtcOffset) -> Self {
        Self {
            category,
            utc_offset,
            slots: vec![None; SLOT_COUNT],
        }
    }

    /// Builds a board from a possibly short slot list, padding with empty slots
    pub fn from_slots(
        category: Category,
        utc_offset: UtcOffset,
        mut slots: Vec<Option<Assignment>>,
    ) -> Result<Self, BoardError> {
        if slots.len() > SLOT_COUNT {
            return Err(BoardError::TooManySlots(slots.len()));
        }
        slots.resize(SLOT_COUNT, None);

        let mut seen = HashSet::new();
        for assignment in slots.iter().flatten() {
            if !seen.insert(assignment.registration_id.as_str()) {
                return Err(BoardError::DuplicatePlayer(assignment.registration_id.clone()));
            }
        }

        Ok(Self {
            category,
            utc_offset,
            slots,
        })
    }

    pub fn slots(&self) -> &[Option<Assignment>] {
        &self.slots
    }

    pub fn get(&self, index: usize) -> Option<&Assignment> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }

    pub fn is_free(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(None))
    }

    pub(crate) fn set(&mut self, index: usize, assignment: Option<Assignment>) -> Result<(), BoardError> {
        let slot = self.slots.get_mut(index).ok_or(BoardError::OutOfRange(index))?;
        *slot = assignment;
        Ok(())
    }

    pub(crate) fn take(&mut self, index: usize) -> Result<Option<Assignment>, BoardError> {
        let slot = self.slots.get_mut(index).ok_or(BoardError::OutOfRange(index))?;
        Ok(slot.take())
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    /// Occupied slots with their index
    pub fn assigned(&self) -> impl Iterator<Item = (usize, &Assignment)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|a| (i, a)))
    }

    pub fn assigned_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Registration ids and player ids of everyone on the board
    pub fn assigned_keys(&self) -> HashSet<String> {
        self.slots
            .iter()
            .flatten()
            .flat_map(|a| [a.registration_id.clone(), a.player_id.clone()])
            .collect()
    }

    /// Minutes from the start of UTC day 0 to the start of slot `index`
    pub fn slot_minutes(&self, index: usize) -> u32 {
        self.utc_offset.minutes() + index as u32 * SLOT_MINUTES
    }

    /// Clock time label of slot `index`
    pub fn slot_time(&self, index: usize) -> String {
        minutes_to_time_string(self.slot_minutes(index))
    }
}

/// The resource a caller ranks registrants by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    Accel,
    FireSparkle,
    FireGem,
    RefinedFireGem,
}

impl SortKey {
    pub fn value(&self, signup: &Signup) -> u64 {
        let r = &signup.resources;
        match self {
            SortKey::Accel => r.category_accel.total_minutes() + r.general_accel.total_minutes(),
            SortKey::FireSparkle => u64::from(r.fire_sparkle),
            SortKey::FireGem => u64::from(r.fire_gem),
            SortKey::RefinedFireGem => u64::from(r.refined_fire_gem),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Accel => "speedups",
            SortKey::FireSparkle => "fire sparkle",
            SortKey::FireGem => "fire gem",
            SortKey::RefinedFireGem => "refined fire gem",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "accel" => Ok(SortKey::Accel),
            "firesparkle" => Ok(SortKey::FireSparkle),
            "firegem" => Ok(SortKey::FireGem),
            "refinedfiregem" => Ok(SortKey::RefinedFireGem),
            other => Err(format!("Unknown sort key: {}", other)),
        }
    }
}

/// Where one registrant landed during an assignment pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub slot: usize,
    pub registration_id: String,
}

/// Result of one assignment pass
#[derive(Debug, Clone)]
pub struct AssignOutcome {
    pub assigned_count: usize,
    /// Registrants that passed the filter, assigned or not
    pub candidate_count: usize,
    pub placements: Vec<Placement>,
    pub board: OfficerBoard,
}
