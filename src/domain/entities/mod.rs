//! Domain entity definitions.

mod cell;
mod media_id;

pub use cell::{CellId, CellPlayback, PlaybackContext};
pub use media_id::MediaId;
