pub mod agenda_api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod recurrence;
pub mod storage;
pub mod window;
