//! Query runners handed to the coordinator

mod command;
mod time_range;

pub use command::CommandQuery;
pub use time_range::{TimeRange, TimeUnit, compose_query};
