//! # pixelport-runtime
//!
//! Drives a compute module frame by frame. The host's frame-presentation facility
//! is a [`FrameSource`]; the [`FrameScheduler`] ticks the module, re-reads its
//! pixel grid and presents it once per frame signal, keeping at most one frame
//! request outstanding. A [`Session`] wires module, backend, scheduler and input
//! together from a [`pixelport_core::PortConfig`], optionally presenting into a
//! desktop window whose pointer input reaches the module between frames.

pub mod frame_source;
pub mod scheduler;
pub mod session;
pub mod window;

#[cfg(test)]
mod test_support;

pub use frame_source::{
    AnimationHandle, FrameSignal, FrameSource, IntervalFrameSource, SteppedFrameSource,
};
pub use scheduler::{FrameOutcome, FrameScheduler, FrameStats, SchedulerState, StopHandle};
pub use session::{Session, SessionReport};
pub use window::{DesktopWindow, PointerTracker, WindowFrameSource};
