//! # pixelport-core
//!
//! Core types and primitives for the Pixelport module host.
//! This crate contains foundational types shared across all Pixelport crates:
//! frame buffers, pointer events, session configuration, content hashing, and error types.

pub mod config;
pub mod error;
pub mod frame;
pub mod hash;
pub mod input;

pub use config::*;

pub use error::{PortError, PortResult};
pub use frame::{FrameBuffer, BYTES_PER_PIXEL};
pub use input::{PointerEvent, PointerKind};
