use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use chrono::Utc;
use csv::{ReaderBuilder, StringRecord, Trim};
use thiserror::Error;
use tracing::{debug, warn};

use crate::schedule::{AccelTime, Category, Registration, Resources, Signup, TimeRange};
use crate::store::submissions::new_id;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Roster is missing the '{0}' column")]
    MissingColumn(&'static str),
}

/// Column positions found in the roster header
struct Columns {
    player_id: usize,
    name: usize,
    category: usize,
    alliance: Option<usize>,
    event_date: Option<usize>,
    level: Option<usize>,
    category_accel: Option<usize>,
    general_accel: Option<usize>,
    fire_sparkle: Option<usize>,
    fire_gem: Option<usize>,
    refined_fire_gem: Option<usize>,
    times: Vec<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, ParseError> {
        let lower: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
        let find = |pred: fn(&str) -> bool| lower.iter().position(|h| pred(h.as_str()));

        let player_id = find(|h| h.contains("player id") || h == "id").ok_or(ParseError::MissingColumn("player id"))?;
        let name = find(|h| h.contains("name")).ok_or(ParseError::MissingColumn("name"))?;
        let category = find(|h| h == "category").ok_or(ParseError::MissingColumn("category"))?;

        let mut times: Vec<(usize, usize)> = lower
            .iter()
            .enumerate()
            .filter_map(|(i, h)| {
                let rank = h.strip_prefix("time ").or_else(|| h.strip_prefix("preference "))?;
                rank.trim().parse::<usize>().ok().map(|r| (r, i))
            })
            .collect();
        times.sort();

        Ok(Self {
            player_id,
            name,
            category,
            alliance: find(|h| h.contains("alliance")),
            event_date: find(|h| h.contains("event date")),
            level: find(|h| h.contains("level")),
            category_accel: find(|h| h.contains("category speedup")),
            general_accel: find(|h| h.contains("general speedup")),
            fire_sparkle: find(|h| h.contains("sparkle")),
            fire_gem: find(|h| h.contains("gem") && !h.contains("refined")),
            refined_fire_gem: find(|h| h.contains("refined")),
            times: times.into_iter().map(|(_, i)| i).take(3).collect(),
        })
    }
}

fn field<'a>(record: &'a StringRecord, column: Option<usize>) -> &'a str {
    column.and_then(|c| record.get(c)).unwrap_or("").trim()
}

/// Parses a number, returning 0 if empty or invalid
fn parse_number(value: &str) -> u32 {
    value.trim().replace(',', "").parse().unwrap_or(0)
}

/// Speedups as plain minutes ("1500") or in game notation ("1d 2h 30m")
fn parse_accel(value: &str) -> AccelTime {
    let value = value.trim();
    if let Ok(minutes) = value.parse::<u32>() {
        return AccelTime::from_minutes(minutes);
    }

    let mut accel = AccelTime::default();
    for part in value.split_whitespace() {
        let Some(unit) = part.chars().last() else {
            continue;
        };
        let amount = parse_number(&part[..part.len() - unit.len_utf8()]);
        match unit.to_ascii_lowercase() {
            'd' => accel.days = accel.days.saturating_add(amount),
            'h' => accel.hours = accel.hours.saturating_add(amount),
            'm' => accel.minutes = accel.minutes.saturating_add(amount),
            _ => debug!("Ignoring speedup token '{}'", part),
        }
    }
    accel
}

/// "09:00-10:00" or "09:00~10:00". Unreadable ranges are kept as written
/// and will never match a slot.
fn parse_time_range(value: &str) -> Option<TimeRange> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.split_once(['-', '~']) {
        Some((start, end)) => Some(TimeRange::new(start.trim(), end.trim())),
        None => Some(TimeRange::new(value, "")),
    }
}

/// Loads a roster from a CSV file
pub fn load_registrations<P: AsRef<Path>>(csv_path: P) -> Result<Vec<Registration>, ParseError> {
    let reader = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_path(csv_path)?;
    collect_registrations(reader)
}

/// Reads a roster, one row per player and category.
///
/// Rows of the same player and event date merge into one registration; a
/// later row for a category already seen replaces it (resubmission).
/// Registrations come back in order of first appearance.
pub fn read_registrations<R: Read>(input: R) -> Result<Vec<Registration>, ParseError> {
    let reader = ReaderBuilder::new().flexible(true).trim(Trim::All).from_reader(input);
    collect_registrations(reader)
}

fn collect_registrations<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<Registration>, ParseError> {
    let columns = Columns::from_headers(reader.headers()?)?;
    let submitted_at = Utc::now().timestamp_millis();

    let mut registrations: Vec<Registration> = Vec::new();
    let mut index: HashMap<(String, Option<String>), usize> = HashMap::new();

    for (row, result) in reader.records().enumerate() {
        let record = result?;

        let player_id = field(&record, Some(columns.player_id)).to_string();
        let name = field(&record, Some(columns.name)).to_string();
        // Skip if essential fields are missing
        if player_id.is_empty() || name.is_empty() {
            debug!("Skipping roster row {} without player id or name", row + 1);
            continue;
        }
        let category: Category = match field(&record, Some(columns.category)).parse() {
            Ok(category) => category,
            Err(e) => {
                warn!("Skipping roster row {}: {}", row + 1, e);
                continue;
            }
        };

        let event_date = Some(field(&record, columns.event_date).to_string()).filter(|d| !d.is_empty());
        let signup = Signup {
            resources: Resources {
                category_accel: parse_accel(field(&record, columns.category_accel)),
                general_accel: parse_accel(field(&record, columns.general_accel)),
                fire_sparkle: parse_number(field(&record, columns.fire_sparkle)),
                fire_gem: parse_number(field(&record, columns.fire_gem)),
                refined_fire_gem: parse_number(field(&record, columns.refined_fire_gem)),
            },
            upgrade_t11: false,
            preferences: columns
                .times
                .iter()
                .filter_map(|&c| parse_time_range(field(&record, Some(c))))
                .collect(),
        };

        let key = (player_id.clone(), event_date.clone());
        match index.get(&key) {
            Some(&i) => {
                let existing = &mut registrations[i];
                existing.player_name = name;
                if let Some(alliance) = columns.alliance {
                    existing.alliance = field(&record, Some(alliance)).to_string();
                }
                existing.signups.insert(category, signup);
            }
            None => {
                let mut signups = BTreeMap::new();
                signups.insert(category, signup);
                index.insert(key, registrations.len());
                registrations.push(Registration {
                    id: new_id(),
                    player_id,
                    player_name: name,
                    alliance: field(&record, columns.alliance).to_string(),
                    avatar_image: None,
                    stove_lv: parse_number(field(&record, columns.level)),
                    event_date,
                    signups,
                    submitted_at,
                });
            }
        }
    }

    Ok(registrations)
}
