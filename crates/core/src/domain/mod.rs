pub mod conversation;
pub mod fields;
pub mod outcome;
pub mod task;
