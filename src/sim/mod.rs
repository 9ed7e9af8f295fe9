pub mod error;
pub mod event;
pub mod level;
pub mod pack;
pub mod schedule;
pub mod session;
pub mod step;
