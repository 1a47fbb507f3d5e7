pub mod submission;
pub mod export;

pub use submission::{validate_submission, SubmissionRequest};
pub use export::{export_board_to_csv, write_board_csv};
