use pixelport_core::frame::byte_len;
use pixelport_core::{FrameBuffer, PointerEvent, PortError, PortResult};
use pixelport_module::{ComputeModule, MemoryView};
use pixelport_render::{BackendKind, RenderBackend};

use crate::scheduler::StopHandle;

const GRID_OFFSET: usize = 16;

/// Module with the default grid exports laid out at fixed addresses:
/// `grid_ptr` at 0, `width` at 4, `height` at 8, pixels from 16.
pub struct ScriptedModule {
    memory: Vec<u8>,
    full_size: usize,
    pub inits: u32,
    pub ticks: Vec<f64>,
    pub pointer_events: Vec<PointerEvent>,
    pub shrink_on_tick: bool,
    pub stop_on_tick: Option<StopHandle>,
    pub fail_init: bool,
    trap_at: Option<usize>,
}

impl ScriptedModule {
    pub fn new(width: u32, height: u32) -> Self {
        let full_size = GRID_OFFSET + byte_len(width, height);
        let mut memory = vec![0; full_size];
        memory[0..4].copy_from_slice(&(GRID_OFFSET as u32).to_le_bytes());
        memory[4..8].copy_from_slice(&width.to_le_bytes());
        memory[8..12].copy_from_slice(&height.to_le_bytes());
        Self {
            memory,
            full_size,
            inits: 0,
            ticks: Vec::new(),
            pointer_events: Vec::new(),
            shrink_on_tick: false,
            stop_on_tick: None,
            fail_init: false,
            trap_at: None,
        }
    }

    /// Trap on the `n`th tick, counting from 1.
    pub fn trap_on_tick(mut self, n: usize) -> Self {
        self.trap_at = Some(n);
        self
    }

    pub fn restore_memory(&mut self) {
        self.shrink_on_tick = false;
        self.memory.resize(self.full_size, 0);
    }
}

impl ComputeModule for ScriptedModule {
    fn init(&mut self) -> PortResult<()> {
        self.inits += 1;
        if self.fail_init {
            return Err(PortError::trap("init", "wasm trap: unreachable"));
        }
        Ok(())
    }

    fn tick(&mut self, timestamp_ms: f64) -> PortResult<()> {
        if self.trap_at == Some(self.ticks.len() + 1) {
            return Err(PortError::trap("tick", "wasm trap: unreachable"));
        }
        self.ticks.push(timestamp_ms);
        let fill = self.ticks.len() as u8;
        if let Some(pixels) = self.memory.get_mut(GRID_OFFSET..) {
            pixels.fill(fill);
        }
        if self.shrink_on_tick {
            self.memory.truncate(GRID_OFFSET);
        }
        if let Some(stop) = &self.stop_on_tick {
            stop.stop();
        }
        Ok(())
    }

    fn pointer(&mut self, event: PointerEvent) -> PortResult<()> {
        self.pointer_events.push(event);
        Ok(())
    }

    fn value_export(&mut self, name: &str) -> PortResult<u32> {
        match name {
            "grid_ptr" => Ok(0),
            "width" => Ok(4),
            "height" => Ok(8),
            _ => Err(PortError::missing_export(name)),
        }
    }

    fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(&self.memory)
    }
}

/// CPU backend that keeps the last presented frame.
pub struct CountingBackend {
    frame: FrameBuffer,
    presents: u64,
}

impl CountingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: FrameBuffer::new(width, height),
            presents: 0,
        }
    }
}

impl RenderBackend for CountingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::DirectBlit
    }

    fn size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn present(&mut self, pixels: &[u8], width: u32, height: u32) -> PortResult<()> {
        if (width, height) != self.size() || pixels.len() != self.frame.byte_size() {
            return Err(PortError::Render(format!(
                "frame {}x{} does not match surface",
                width, height
            )));
        }
        self.frame.data.copy_from_slice(pixels);
        self.presents += 1;
        Ok(())
    }

    fn snapshot(&self) -> PortResult<FrameBuffer> {
        Ok(self.frame.clone())
    }

    fn present_count(&self) -> u64 {
        self.presents
    }
}
