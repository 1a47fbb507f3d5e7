use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::schedule::{AssignOutcome, OfficerBoard, Registration};

/// Formats a player name with alliance tag
pub fn format_player_name(alliance: &str, name: &str) -> String {
    if alliance.is_empty() {
        name.to_string()
    } else {
        format!("[{}] {}", alliance, name)
    }
}

/// Renders a board in the format: HH:MM [tag] name
pub fn render_board(board: &OfficerBoard) -> String {
    let mut out = format!("** {} **\n", board.category.day_name());
    for (index, slot) in board.slots().iter().enumerate() {
        let time = board.slot_time(index);
        match slot {
            Some(appt) => out.push_str(&format!("{} {}\n", time, format_player_name(&appt.alliance, &appt.player_name))),
            None => out.push_str(&format!("{} [EMPTY]\n", time)),
        }
    }
    out
}

/// Writes a board to a text file
pub fn write_board_to_file(board: &OfficerBoard, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(render_board(board).as_bytes())
}

/// Prints the result of an assignment pass
pub fn print_outcome(outcome: &AssignOutcome, roster: &[Registration]) {
    let board = &outcome.board;
    println!("\n=== {} Schedule (UTC start {}) ===", board.category.day_name(), board.utc_offset);
    println!(
        "Assigned this run: {} of {} candidates, {} slots filled",
        outcome.assigned_count,
        outcome.candidate_count,
        board.assigned_count()
    );

    let unplaced: Vec<&Registration> = roster
        .iter()
        .filter(|r| r.signup(board.category).is_some())
        .filter(|r| board.assigned().all(|(_, a)| a.registration_id != r.id))
        .collect();
    if !unplaced.is_empty() {
        println!("Not on this board ({}):", unplaced.len());
        for entry in unplaced {
            println!("  - {} (ID: {})", format_player_name(&entry.alliance, &entry.player_name), entry.player_id);
        }
    }

    println!("\nSchedule by time slot:");
    for (index, slot) in board.slots().iter().enumerate() {
        let time = board.slot_time(index);
        match slot {
            Some(appt) => println!(
                "  Slot {} ({}) -> {} (ID: {})",
                index,
                time,
                format_player_name(&appt.alliance, &appt.player_name),
                appt.player_id
            ),
            None => println!("  Slot {} ({}) -> [EMPTY]", index, time),
        }
    }
}
