use super::types::{SLOT_COUNT, SLOT_MINUTES};

pub const DAY_MINUTES: u32 = 24 * 60;

/// Parses a time string (HH:MM) to minutes since midnight
pub fn parse_time_to_minutes(time_str: &str) -> Option<u32> {
    let parts: Vec<&str> = time_str.trim().split(':').collect();
    if parts.len() != 2 {
        return None;
    }
    let hours: u32 = parts[0].trim().parse().ok()?;
    let minutes: u32 = parts[1].trim().parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Formats minutes since midnight to time string (HH:MM)
pub fn minutes_to_time_string(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{:02}:{:02}", hours % 24, mins)
}

/// Turns a preference into a `[start, end)` minute interval.
/// An end at or before the start wraps past midnight.
pub fn preference_window(start: &str, end: &str) -> Option<(u32, u32)> {
    let start = parse_time_to_minutes(start)?;
    let mut end = parse_time_to_minutes(end)?;
    if end <= start {
        end += DAY_MINUTES;
    }
    Some((start, end))
}

/// Whether a slot starting `slot_minutes` after UTC midnight of day 0 lies in `window`.
///
/// Slot times run linearly from the board's offset, so a slot past midnight is
/// checked against the window shifted one day forward as well. The part of a
/// wrapping window that would fall after the board's last slot has no slot.
pub fn window_contains(window: (u32, u32), slot_minutes: u32) -> bool {
    let (start, end) = window;
    (start..end).contains(&slot_minutes)
        || (start + DAY_MINUTES..end + DAY_MINUTES).contains(&slot_minutes)
}

/// Clock labels for every slot of a board starting at `offset_minutes`
pub fn board_time_labels(offset_minutes: u32) -> Vec<(usize, String)> {
    (0..SLOT_COUNT)
        .map(|i| {
            let minutes = offset_minutes + i as u32 * SLOT_MINUTES;
            (i, minutes_to_time_string(minutes % DAY_MINUTES))
        })
        .collect()
}
