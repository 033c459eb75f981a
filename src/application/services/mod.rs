//! Application services.

pub mod loop_controller;
pub mod playback_service;

pub use loop_controller::LoopSession;
pub use playback_service::PlaybackService;
