//! Port traits implemented by infrastructure adapters.

mod asset_decoder_port;
mod media_fetch_port;
mod playback_engine_port;

pub use asset_decoder_port::{AssetDecoderPort, DecodedMedia};
pub use media_fetch_port::MediaFetchPort;
pub use playback_engine_port::{EngineFactoryPort, EnginePort};
