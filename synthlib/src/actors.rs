pub mod broadcaster;
pub mod coordinator;
pub mod worker;
