//! Compatibility layer over the `tracing` crate.
//!
//! Internal code imports log macros from here rather than from `tracing`
//! directly, keeping one seam should the logging backend ever need to be
//! swapped or feature-gated.

pub use tracing::{debug, error, info, trace, warn};
