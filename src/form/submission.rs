use std::collections::BTreeMap;

use serde::Deserialize;

use crate::schedule::slot_utils::parse_time_to_minutes;
use crate::schedule::{Category, Registration, Signup};
use crate::store::events::validate_event_date;

/// Most preferences a sign-up may rank
pub const MAX_PREFERENCES: usize = 3;

/// Registration form as posted by the front end
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub player_id: String,
    pub player_name: String,
    pub alliance: String,
    #[serde(default)]
    pub avatar_image: Option<String>,
    #[serde(default)]
    pub stove_lv: u32,
    /// Falls back to the latest open event when absent
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub signups: BTreeMap<Category, Signup>,
}

impl SubmissionRequest {
    pub fn into_registration(self, event_date: Option<String>, submitted_at: i64) -> Registration {
        Registration {
            id: String::new(),
            player_id: self.player_id.trim().to_string(),
            player_name: self.player_name.trim().to_string(),
            alliance: self.alliance.trim().to_string(),
            avatar_image: self.avatar_image,
            stove_lv: self.stove_lv,
            event_date,
            signups: self.signups,
            submitted_at,
        }
    }
}

/// Validates a form submission
pub fn validate_submission(req: &SubmissionRequest) -> Result<(), String> {
    if req.player_name.trim().is_empty() {
        return Err("Player name is required".to_string());
    }

    // Validate player ID (must be a number)
    if req.player_id.trim().is_empty() {
        return Err("Player ID is required".to_string());
    }
    if !req.player_id.trim().chars().all(|c| c.is_ascii_digit()) {
        return Err("Player ID must contain only digits".to_string());
    }

    if req.alliance.trim().is_empty() {
        return Err("Alliance is required".to_string());
    }

    if let Some(date) = &req.event_date {
        validate_event_date(date).map_err(|e| e.to_string())?;
    }

    // At least one category must be selected
    if req.signups.is_empty() {
        return Err("At least one category (Research, Training or Building) must be selected".to_string());
    }

    for (category, signup) in &req.signups {
        if signup.preferences.is_empty() {
            return Err(format!("{} requires at least one preferred time", category.day_name()));
        }
        if signup.preferences.len() > MAX_PREFERENCES {
            return Err(format!(
                "{} allows at most {} preferred times",
                category.day_name(),
                MAX_PREFERENCES
            ));
        }
        for range in &signup.preferences {
            if parse_time_to_minutes(&range.start).is_none() || parse_time_to_minutes(&range.end).is_none() {
                return Err(format!(
                    "Invalid {} time range: {}-{}",
                    category, range.start, range.end
                ));
            }
        }
    }

    Ok(())
}
