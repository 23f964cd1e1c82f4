mod duration;
mod time_marker;

pub use duration::parse_poll_interval;
pub use time_marker::parse_time_marker;
