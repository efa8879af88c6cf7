#![forbid(unsafe_code)]

//! Domain model for keeping a test attempt's draft in sync with the grading service.

pub mod model;
pub mod time;

pub use time::Clock;
