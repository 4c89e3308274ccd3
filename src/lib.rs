//! Helpers behind the metrics dashboard: instant queries against a Prometheus
//! compatible backend, label formatting, polling and clock utilities.

pub mod clock;
pub mod labels;
pub mod prom;
pub mod schedule;

pub use clock::Timer;
pub use labels::format_labels;
pub use prom::{PromClient, QueryError, Sample};
pub use schedule::{FailurePolicy, PollHandle, PollRegistry};
