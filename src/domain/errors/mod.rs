//! Domain error types.

mod media_error;

pub use media_error::{MediaError, MediaResult};
