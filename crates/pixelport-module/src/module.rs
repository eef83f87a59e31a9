use std::cell::RefCell;
use std::rc::Rc;

use pixelport_core::{PointerEvent, PortResult};

use crate::memory::MemoryView;

/// The entry points a compute module exposes to the host.
///
/// Every `&mut self` method is a call into the module and may grow its memory,
/// which is why [`ComputeModule::memory`] hands out a borrow instead of a copy.
pub trait ComputeModule {
    /// Run the module's one-time initialization.
    fn init(&mut self) -> PortResult<()>;

    /// Advance the simulation. `timestamp_ms` comes from the frame source.
    fn tick(&mut self, timestamp_ms: f64) -> PortResult<()>;

    /// Forward a pointer event to `onmousemove`, `onmousedown` or `onmouseup`.
    fn pointer(&mut self, event: PointerEvent) -> PortResult<()>;

    /// Resolve a value export to the address it names inside linear memory.
    fn value_export(&mut self, name: &str) -> PortResult<u32>;

    /// Borrow the module's linear memory as it is right now.
    fn memory(&self) -> MemoryView<'_>;
}

/// A module shared between the frame scheduler and the input router.
///
/// Single-threaded: both sides run on the host's one cooperative loop.
pub type SharedModule<M> = Rc<RefCell<M>>;

pub fn shared<M: ComputeModule>(module: M) -> SharedModule<M> {
    Rc::new(RefCell::new(module))
}
