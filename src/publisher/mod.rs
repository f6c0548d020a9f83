//! Publisher module
//!
//! In-process fan-out of published values to registered listeners, and
//! length-prefixed MessagePack frames for handing views to other processes.

pub mod frame;
mod registry;

pub use frame::{decode_frame, encode_frame, FrameWriter};
pub use registry::{Registry, SubscriptionId};
