//! # System Interaction Layer
//!
//! The boundary between the processor core and the outside world.
//!
//! - **`engine`**: the `GeoEngine` trait commands call to read, write and merge spatial
//!   layers, plus the default GeoJSON implementation.

pub mod engine;
