use pixelport_core::{PointerEvent, PointerKind, PortError, PortResult};

use crate::module::{ComputeModule, SharedModule};

/// Forwards host pointer events straight into the module.
///
/// Independent of the frame scheduler: each handler makes exactly one module call
/// before returning, with no queueing and no coalescing.
pub struct InputRouter<M> {
    module: SharedModule<M>,
}

impl<M: ComputeModule> InputRouter<M> {
    pub fn new(module: SharedModule<M>) -> Self {
        Self { module }
    }

    pub fn on_move(&self, x: f64, y: f64) -> PortResult<()> {
        self.dispatch(PointerEvent::from_surface(PointerKind::Move, x, y))
    }

    pub fn on_press(&self, x: f64, y: f64) -> PortResult<()> {
        self.dispatch(PointerEvent::from_surface(PointerKind::Down, x, y))
    }

    pub fn on_release(&self, x: f64, y: f64) -> PortResult<()> {
        self.dispatch(PointerEvent::from_surface(PointerKind::Up, x, y))
    }

    pub fn dispatch(&self, event: PointerEvent) -> PortResult<()> {
        let mut module = self.module.try_borrow_mut().map_err(|_| {
            PortError::InvalidState(format!("{event} dispatched while the module is running"))
        })?;
        tracing::trace!("Dispatching {}", event);
        module.pointer(event)
    }
}

impl<M> Clone for InputRouter<M> {
    fn clone(&self) -> Self {
        Self {
            module: self.module.clone(),
        }
    }
}
