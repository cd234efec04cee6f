//! Interval processing, peak-event grouping, day indexing, and sizing.

pub mod days;
pub mod events;
pub mod intervals;
pub mod sizing;
