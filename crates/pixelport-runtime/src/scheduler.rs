use std::cell::Cell;
use std::rc::Rc;

use pixelport_core::{ExportNames, PortError, PortResult};
use pixelport_module::{ComputeModule, GridDescriptor, SharedModule};
use pixelport_render::RenderBackend;

use crate::frame_source::{AnimationHandle, FrameSignal, FrameSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Ready,
    Running,
    Stopped,
}

/// What a frame signal led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The module ticked and its grid was presented.
    Presented,
    /// The module ticked but its grid fell outside memory; nothing was presented.
    Skipped,
    /// The signal did not match the pending request and was dropped.
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub ticks: u64,
    pub presented: u64,
    pub skipped: u64,
    pub ignored: u64,
}

/// Cooperative cancellation shared with anything that may want to end the session.
///
/// Stopping never interrupts a frame; it only withholds the next request.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Rc<Cell<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.get()
    }
}

/// Runs tick, re-resolve and present once per frame signal.
pub struct FrameScheduler<M> {
    state: SchedulerState,
    pending: Option<AnimationHandle>,
    module: SharedModule<M>,
    grid: Option<GridDescriptor>,
    backend: Option<Box<dyn RenderBackend>>,
    stop: StopHandle,
    stats: FrameStats,
}

impl<M: ComputeModule> FrameScheduler<M> {
    pub fn new(module: SharedModule<M>) -> Self {
        Self {
            state: SchedulerState::Uninitialized,
            pending: None,
            module,
            grid: None,
            backend: None,
            stop: StopHandle::default(),
            stats: FrameStats::default(),
        }
    }

    /// Resolve the grid, build the backend for it, then run the module's `init`.
    ///
    /// Grid and backend failures leave the scheduler uninitialized without any
    /// module code having run. `init` runs at most once: if it fails the
    /// scheduler is stopped for good.
    pub fn initialize<F>(&mut self, names: &ExportNames, make_backend: F) -> PortResult<()>
    where
        F: FnOnce(u32, u32) -> PortResult<Box<dyn RenderBackend>>,
    {
        if self.state != SchedulerState::Uninitialized {
            return Err(PortError::InvalidState(format!(
                "initialize called in state {:?}",
                self.state
            )));
        }

        let grid = {
            let mut module = self.borrow_module()?;
            GridDescriptor::resolve(&mut *module, names)?
        };
        let backend = make_backend(grid.width, grid.height)?;
        if backend.size() != (grid.width, grid.height) {
            return Err(PortError::Render(format!(
                "{} backend surface is {:?}, grid is {}x{}",
                backend.kind(),
                backend.size(),
                grid.width,
                grid.height
            )));
        }

        let init = self.borrow_module()?.init();
        if let Err(e) = init {
            self.state = SchedulerState::Stopped;
            return Err(e);
        }

        self.grid = Some(grid);
        self.backend = Some(backend);
        self.state = SchedulerState::Ready;
        Ok(())
    }

    /// Issue the first frame request.
    pub fn start(&mut self, source: &mut dyn FrameSource) -> PortResult<()> {
        if self.state != SchedulerState::Ready {
            return Err(PortError::InvalidState(format!(
                "start called in state {:?}",
                self.state
            )));
        }
        if self.stop.is_stopped() {
            self.state = SchedulerState::Stopped;
            return Ok(());
        }
        self.pending = Some(source.request_frame());
        self.state = SchedulerState::Running;
        tracing::debug!("Scheduler running");
        Ok(())
    }

    /// Handle one frame signal from `source`.
    ///
    /// Recoverable errors skip the present and keep the loop alive; any other
    /// error stops the scheduler and is returned once.
    pub fn on_frame(
        &mut self,
        signal: FrameSignal,
        source: &mut dyn FrameSource,
    ) -> PortResult<FrameOutcome> {
        if self.state == SchedulerState::Running && self.stop.is_stopped() {
            self.halt(source);
        }
        if self.state != SchedulerState::Running || self.pending != Some(signal.handle) {
            self.stats.ignored += 1;
            tracing::debug!(
                "Ignoring frame signal {} (state {:?}, pending {:?})",
                signal.handle,
                self.state,
                self.pending
            );
            return Ok(FrameOutcome::Ignored);
        }
        self.pending = None;

        let outcome = match self.run_frame(signal.timestamp_ms) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.state = SchedulerState::Stopped;
                return Err(e);
            }
        };

        if self.stop.is_stopped() {
            self.state = SchedulerState::Stopped;
            tracing::info!("Scheduler stopped after {} frames", self.stats.ticks);
        } else {
            self.pending = Some(source.request_frame());
        }
        Ok(outcome)
    }

    fn run_frame(&mut self, timestamp_ms: f64) -> PortResult<FrameOutcome> {
        let grid = self
            .grid
            .ok_or_else(|| PortError::InvalidState("frame before grid was resolved".into()))?;
        let backend = self
            .backend
            .as_mut()
            .ok_or_else(|| PortError::InvalidState("frame before backend was created".into()))?;
        let mut module = self.module.try_borrow_mut().map_err(|_| {
            PortError::InvalidState("module is already running another call".into())
        })?;

        module.tick(timestamp_ms)?;
        self.stats.ticks += 1;

        // Memory may have grown during tick; take a fresh view.
        let view = module.memory();
        match grid.pixels(&view) {
            Ok(pixels) => {
                backend.present(pixels, grid.width, grid.height)?;
                self.stats.presented += 1;
                tracing::trace!("Presented frame {} at {:.1}ms", self.stats.ticks, timestamp_ms);
                Ok(FrameOutcome::Presented)
            }
            Err(e) if e.is_recoverable() => {
                self.stats.skipped += 1;
                tracing::warn!("Skipping present for frame {}: {}", self.stats.ticks, e);
                Ok(FrameOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop now: cancel the pending request, if any, and never issue another.
    pub fn stop(&mut self, source: &mut dyn FrameSource) {
        self.stop.stop();
        self.halt(source);
    }

    fn halt(&mut self, source: &mut dyn FrameSource) {
        if let Some(handle) = self.pending.take() {
            source.cancel_frame(handle);
        }
        if self.state != SchedulerState::Stopped {
            tracing::info!("Scheduler stopped after {} frames", self.stats.ticks);
        }
        self.state = SchedulerState::Stopped;
    }

    fn borrow_module(&self) -> PortResult<std::cell::RefMut<'_, M>> {
        self.module.try_borrow_mut().map_err(|_| {
            PortError::InvalidState("module is already running another call".into())
        })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn module(&self) -> &SharedModule<M> {
        &self.module
    }

    pub fn pending(&self) -> Option<AnimationHandle> {
        self.pending
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn grid(&self) -> Option<GridDescriptor> {
        self.grid
    }

    pub fn backend(&self) -> Option<&dyn RenderBackend> {
        self.backend.as_deref()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }
}
