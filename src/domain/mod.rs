//! Domain layer - Core types and port definitions
//!
//! This module defines the cluster gateway port that adapters implement,
//! and the transient records the matchers emit, following hexagonal
//! architecture principles.

pub mod ports;
pub mod volume;

pub use ports::*;
pub use volume::*;
