//! Tracing subscriber setup shared by the binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_with_level, parse_level};
