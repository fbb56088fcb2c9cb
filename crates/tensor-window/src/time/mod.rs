//! Render-loop pacing.
//!
//! One `FramePacer` per render loop; call `pace()` once per presented frame.

mod frame_pacer;

pub use frame_pacer::{FramePacer, FrameTick};
