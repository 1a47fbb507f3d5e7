use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;

use crate::schedule::OfficerBoard;

/// Writes all 48 slots of a board as `slot,time,player_id,name,alliance`.
/// `slot` is the 0-based index used by the API. Empty slots keep their row
/// with blank player fields.
pub fn write_board_csv<W: Write>(board: &OfficerBoard, writer: W) -> Result<(), csv::Error> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(["slot", "time", "player_id", "name", "alliance"])?;

    for (index, slot) in board.slots().iter().enumerate() {
        let number = index.to_string();
        let time = board.slot_time(index);
        match slot {
            Some(appt) => wtr.write_record([
                number.as_str(),
                time.as_str(),
                appt.player_id.as_str(),
                appt.player_name.as_str(),
                appt.alliance.as_str(),
            ])?,
            None => wtr.write_record([number.as_str(), time.as_str(), "", "", ""])?,
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Exports a board to a CSV file
pub fn export_board_to_csv(board: &OfficerBoard, csv_path: &Path) -> Result<(), csv::Error> {
    let file = std::fs::File::create(csv_path)?;
    write_board_csv(board, file)
}
