pub mod announcement;
pub mod broadcast;
pub mod delivery;
pub mod health;
pub mod recurrence;
pub mod reminder;
pub mod scheduler;
