//! Screenshot Input Layer
//!
//! Screenshots arrive as files or byte buffers from the VM control channel.
//! This layer only decodes them; fetching them is the caller's job.

pub mod frame;

pub use frame::ScreenFrame;
