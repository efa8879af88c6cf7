#![forbid(unsafe_code)]

//! Local persisted state for attempt sessions.

pub mod repository;
pub mod sqlite;
