//! Domain layer with core media entities and port definitions.

/// Domain entity definitions.
pub mod entities;
/// Domain error types.
pub mod errors;
/// Port traits implemented by infrastructure adapters.
pub mod ports;
