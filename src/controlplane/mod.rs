//! Control Plane Module
//!
//! The volume engine facade and the REST API that exposes it.

pub mod engine;
pub mod api;

pub use engine::*;
pub use api::*;
