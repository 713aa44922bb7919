pub mod batches;
pub mod commits;
pub mod events;
pub mod health;
pub mod projects;
pub mod selection;
pub mod views;
