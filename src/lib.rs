//! Peak-shaving battery sizing from metered consumption data.
//!
//! Takes a 15-minute consumption series, finds where it exceeds the
//! contracted grid power, derives a storage requirement, prices it against
//! a battery catalog, and simulates candidate batteries against the series.

pub mod analysis;
pub mod catalog;
pub mod io;
pub mod normalize;
pub mod pipeline;
pub mod quality;
pub mod settings;
/// Scenario option generation and the battery simulation engine.
pub mod sim;
pub mod timeparse;
