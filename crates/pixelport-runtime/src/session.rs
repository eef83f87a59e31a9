use pixelport_core::{FrameBuffer, PointerEvent, PortConfig, PortError, PortResult, ScriptedInput};
use pixelport_module::{shared, ComputeModule, InputRouter, WasmModule};
use pixelport_render::{create_backend, BackendKind, RenderBackend};

use crate::frame_source::FrameSource;
use crate::scheduler::{FrameScheduler, FrameStats, SchedulerState, StopHandle};

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub stats: FrameStats,
    pub state: SchedulerState,
    /// Scripted pointer events that reached the module.
    pub inputs_dispatched: u64,
}

/// One module, one backend and the loop that drives them.
pub struct Session<M> {
    scheduler: FrameScheduler<M>,
    input: InputRouter<M>,
    script: Vec<ScriptedInput>,
    cursor: usize,
    inputs_dispatched: u64,
    max_frames: Option<u64>,
}

impl Session<WasmModule> {
    /// Load the configured module and bring it up on the configured backend.
    ///
    /// The backend name is checked before the module is even read, so an
    /// unsupported backend never runs any module code.
    pub fn from_config(config: &PortConfig) -> PortResult<Self> {
        Self::from_config_with(config, create_backend)
    }

    /// Like [`Session::from_config`], with the caller building the backend for the parsed kind.
    pub fn from_config_with<F>(config: &PortConfig, make_backend: F) -> PortResult<Self>
    where
        F: FnOnce(BackendKind, u32, u32) -> PortResult<Box<dyn RenderBackend>>,
    {
        config.validate()?;
        let kind = BackendKind::parse(&config.render.backend)?;
        let module = WasmModule::from_file(&config.module.path, config.module.seed, &config.exports)?;
        Self::with_module(module, config, |width, height| {
            make_backend(kind, width, height)
        })
    }
}

impl<M: ComputeModule> Session<M> {
    pub fn with_module<F>(module: M, config: &PortConfig, make_backend: F) -> PortResult<Self>
    where
        F: FnOnce(u32, u32) -> PortResult<Box<dyn RenderBackend>>,
    {
        let module = shared(module);
        let mut scheduler = FrameScheduler::new(module.clone());
        scheduler.initialize(&config.exports, make_backend)?;

        let mut script = config.input.clone();
        script.sort_by_key(|event| event.frame);
        if !script.is_empty() {
            tracing::info!("Replaying {} scripted pointer events", script.len());
        }

        Ok(Self {
            scheduler,
            input: InputRouter::new(module),
            script,
            cursor: 0,
            inputs_dispatched: 0,
            max_frames: config.session.max_frames,
        })
    }

    /// Drive frames from `source` until the scheduler stops or nothing is pending.
    ///
    /// A fatal error stops the loop and is returned; pointer handler failures
    /// are logged and the run carries on.
    pub fn run(&mut self, source: &mut dyn FrameSource) -> PortResult<SessionReport> {
        if self.max_frames == Some(0) {
            self.scheduler.stop_handle().stop();
        }
        self.scheduler.start(source)?;

        while let Some(signal) = source.wait_for_frame() {
            self.replay_input(self.scheduler.stats().ticks);
            self.scheduler.on_frame(signal, source)?;

            if let Some(max) = self.max_frames {
                if self.scheduler.stats().ticks >= max
                    && self.scheduler.state() == SchedulerState::Running
                {
                    tracing::debug!("Reached frame limit {}", max);
                    self.scheduler.stop(source);
                }
            }
        }
        if self.scheduler.state() == SchedulerState::Running {
            // The source ended with a request still outstanding.
            self.scheduler.stop(source);
        }

        let report = self.report();
        tracing::info!(
            "Session finished: {} ticks, {} presented, {} skipped",
            report.stats.ticks,
            report.stats.presented,
            report.stats.skipped
        );
        Ok(report)
    }

    /// Dispatch every scripted event due at or before `frame`.
    fn replay_input(&mut self, frame: u64) {
        while let Some(event) = self.script.get(self.cursor) {
            if event.frame > frame {
                break;
            }
            let pointer = PointerEvent::from_surface(event.kind, event.x, event.y);
            match self.input.dispatch(pointer) {
                Ok(()) => self.inputs_dispatched += 1,
                Err(e) => tracing::error!("Scripted input before frame {} failed: {}", frame, e),
            }
            self.cursor += 1;
        }
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            stats: self.scheduler.stats(),
            state: self.scheduler.state(),
            inputs_dispatched: self.inputs_dispatched,
        }
    }

    /// What the backend surface shows right now.
    pub fn snapshot(&self) -> PortResult<FrameBuffer> {
        self.scheduler
            .backend()
            .ok_or_else(|| PortError::InvalidState("session has no backend".into()))?
            .snapshot()
    }

    /// Router for live pointer input; clones share the same module.
    pub fn input(&self) -> InputRouter<M> {
        self.input.clone()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.scheduler.stop_handle()
    }

    pub fn scheduler(&self) -> &FrameScheduler<M> {
        &self.scheduler
    }
}
