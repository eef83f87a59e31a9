//! # pixelport-module
//!
//! Host-side bridge to a sandboxed compute module.
//! Loads the module with wasmtime, exposes short-lived views into its linear
//! memory, resolves the pixel grid geometry once at startup, and routes pointer
//! input into the module's entry points.

pub mod grid;
pub mod input;
pub mod memory;
pub mod module;
pub mod wasm;

#[cfg(test)]
mod test_support;

pub use grid::GridDescriptor;
pub use input::InputRouter;
pub use memory::MemoryView;
pub use module::{shared, ComputeModule, SharedModule};
pub use wasm::WasmModule;
