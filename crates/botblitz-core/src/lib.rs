pub mod config;
pub mod error;
pub mod lineup;
pub mod model;
pub mod playoffs;
pub mod position;
pub mod report;
pub mod schedule;
pub mod standings;
pub mod store;
pub mod waiver;
