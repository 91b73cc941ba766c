pub mod messages;
pub mod presence;
