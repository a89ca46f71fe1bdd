//! API Module
//!
//! REST surface over the volume engine.

pub mod server;
pub mod rest;

pub use server::*;
pub use rest::*;
