use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::schedule::slot_utils::{board_time_labels, window_contains, DAY_MINUTES};
use crate::schedule::types::SLOT_MINUTES;
use crate::schedule::{Category, Registration};

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllianceStats {
    pub research_requests: u32,
    pub training_requests: u32,
    pub building_requests: u32,
    /// Speedup minutes across all categories
    pub accel_minutes: u64,
    pub fire_sparkle: u64,
    pub fire_gem: u64,
    pub refined_fire_gem: u64,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SlotDemand {
    pub time: String,
    pub requests: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_registrations: usize,
    pub alliance_counts: HashMap<String, AllianceStats>,
    /// Per category, how many sign-ups would take each half hour of the day
    pub time_slot_popularity: BTreeMap<Category, Vec<SlotDemand>>,
}

pub fn collect_stats(registrations: &[Registration]) -> StatsResponse {
    let mut alliance_counts: HashMap<String, AllianceStats> = HashMap::new();
    let labels = board_time_labels(0);
    let mut time_slot_popularity: BTreeMap<Category, Vec<SlotDemand>> = Category::ALL
        .iter()
        .map(|&category| {
            let slots = labels
                .iter()
                .map(|(_, time)| SlotDemand {
                    time: time.clone(),
                    requests: 0,
                })
                .collect();
            (category, slots)
        })
        .collect();

    for registration in registrations {
        // Count by alliance
        let stats = alliance_counts.entry(registration.alliance.clone()).or_default();

        for (category, signup) in &registration.signups {
            match category {
                Category::Research => stats.research_requests += 1,
                Category::Training => stats.training_requests += 1,
                Category::Building => stats.building_requests += 1,
            }
            let r = &signup.resources;
            let accel = r.category_accel.total_minutes() + r.general_accel.total_minutes();
            stats.accel_minutes = stats.accel_minutes.saturating_add(accel);
            stats.fire_sparkle += u64::from(r.fire_sparkle);
            stats.fire_gem += u64::from(r.fire_gem);
            stats.refined_fire_gem += u64::from(r.refined_fire_gem);

            // Count time slot popularity, each half hour once per sign-up.
            // Clock times wrap, so the early hours also match the window a day later.
            let windows: Vec<(u32, u32)> = signup.preferences.iter().filter_map(|p| p.window()).collect();
            if let Some(slots) = time_slot_popularity.get_mut(category) {
                for (index, demand) in slots.iter_mut().enumerate() {
                    let minutes = index as u32 * SLOT_MINUTES;
                    let covered = windows
                        .iter()
                        .any(|&w| window_contains(w, minutes) || window_contains(w, minutes + DAY_MINUTES));
                    if covered {
                        demand.requests += 1;
                    }
                }
            }
        }
    }

    StatsResponse {
        total_registrations: registrations.len(),
        alliance_counts,
        time_slot_popularity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::{AccelTime, Resources, Signup, TimeRange};

    fn registration(alliance: &str, signups: Vec<(Category, Signup)>) -> Registration {
        Registration {
            id: alliance.to_lowercase(),
            player_id: "1".to_string(),
            player_name: "Someone".to_string(),
            alliance: alliance.to_string(),
            avatar_image: None,
            stove_lv: 0,
            event_date: None,
            signups: signups.into_iter().collect(),
            submitted_at: 0,
        }
    }

    fn signup(accel: u32, gem: u32, times: &[(&str, &str)]) -> Signup {
        Signup {
            resources: Resources {
                general_accel: AccelTime::from_minutes(accel),
                fire_gem: gem,
                ..Default::default()
            },
            upgrade_t11: false,
            preferences: times.iter().map(|(s, e)| TimeRange::new(s, e)).collect(),
        }
    }

    #[test]
    fn alliance_totals() {
        let stats = collect_stats(&[
            registration(
                "TWN",
                vec![
                    (Category::Research, signup(60, 0, &[])),
                    (Category::Building, signup(30, 4, &[])),
                ],
            ),
            registration("ABC", vec![(Category::Training, signup(10, 0, &[]))]),
        ]);

        assert_eq!(stats.total_registrations, 2);
        let twn = &stats.alliance_counts["TWN"];
        assert_eq!(twn.research_requests, 1);
        assert_eq!(twn.building_requests, 1);
        assert_eq!(twn.training_requests, 0);
        assert_eq!(twn.accel_minutes, 90);
        assert_eq!(twn.fire_gem, 4);
        assert_eq!(stats.alliance_counts["ABC"].training_requests, 1);
    }

    #[test]
    fn wrapping_preference_counts_early_hours() {
        let stats = collect_stats(&[registration(
            "TWN",
            vec![(Category::Training, signup(60, 0, &[("23:00", "01:00")]))],
        )]);

        let training = &stats.time_slot_popularity[&Category::Training];
        let counted: Vec<usize> = training
            .iter()
            .enumerate()
            .filter(|(_, d)| d.requests > 0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(counted, vec![0, 1, 46, 47]);
        assert_eq!(training[0].time, "00:00");
    }

    #[test]
    fn huge_speedups_are_totalled_without_overflow() {
        let mut huge = signup(0, 0, &[]);
        huge.resources.general_accel = AccelTime {
            days: 4_000_000,
            ..Default::default()
        };
        let stats = collect_stats(&[registration("TWN", vec![(Category::Research, huge)])]);
        assert_eq!(stats.alliance_counts["TWN"].accel_minutes, 4_000_000 * 1440);
    }

    #[test]
    fn overlapping_preferences_count_once() {
        let stats = collect_stats(&[registration(
            "TWN",
            vec![(
                Category::Research,
                signup(60, 0, &[("09:00", "10:00"), ("09:30", "11:00"), ("23:30", "00:30"), ("bad", "")]),
            )],
        )]);

        let research = &stats.time_slot_popularity[&Category::Research];
        assert_eq!(research.len(), 48);
        assert_eq!(research[18], SlotDemand { time: "09:00".to_string(), requests: 1 });
        assert_eq!(research[19].requests, 1);
        assert_eq!(research[21].requests, 1);
        assert_eq!(research[22].requests, 0);
        assert_eq!(research[47].requests, 1);
        assert_eq!(research[0].requests, 1);
        assert_eq!(research[1].requests, 0);
        assert!(stats.time_slot_popularity[&Category::Training].iter().all(|d| d.requests == 0));
    }
}
