pub mod types;
pub mod slot_utils;
pub mod assigner;
pub mod session;

pub use types::{
    AccelTime, AssignOutcome, Assignment, Category, OfficerBoard, Registration, Resources, Signup, SortKey,
    TimeRange, UtcOffset,
};
pub use session::{OfficerSession, SessionError};
