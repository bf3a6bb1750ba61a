pub mod config;

// Pose analysis
pub mod angle;
pub mod exercise;
pub mod hold_timer;
pub mod rep_counter;

// Frame annotation and transport
pub mod frame_encoder;
pub mod overlay;
pub mod sink;

// Session lifecycle
pub mod registry;
pub mod session;
