pub mod actor;
pub mod credential;
pub mod spend;
pub mod tenant;
