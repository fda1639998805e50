mod stamp;

pub use stamp::{format_date, format_time, parse_header_timestamp, parse_started_at};
