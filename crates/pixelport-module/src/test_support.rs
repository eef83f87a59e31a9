use std::collections::HashMap;

use pixelport_core::{PointerEvent, PortError, PortResult};

use crate::memory::MemoryView;
use crate::module::ComputeModule;

/// In-memory module that records every entry point call.
pub struct FakeModule {
    pub memory: Vec<u8>,
    pub exports: HashMap<String, u32>,
    pub calls: Vec<String>,
    pub pointer_events: Vec<PointerEvent>,
}

impl FakeModule {
    pub fn new(memory_size: usize) -> Self {
        Self {
            memory: vec![0; memory_size],
            exports: HashMap::new(),
            calls: Vec::new(),
            pointer_events: Vec::new(),
        }
    }

    /// Export `name` as the address `address`, storing `value` there.
    pub fn define_value(&mut self, name: &str, address: u32, value: u32) {
        self.exports.insert(name.to_string(), address);
        self.write(address as usize, &value.to_le_bytes());
    }

    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        self.memory[offset..offset + bytes.len()].copy_from_slice(bytes);
    }
}

impl ComputeModule for FakeModule {
    fn init(&mut self) -> PortResult<()> {
        self.calls.push("init".into());
        Ok(())
    }

    fn tick(&mut self, timestamp_ms: f64) -> PortResult<()> {
        self.calls.push(format!("tick({timestamp_ms})"));
        Ok(())
    }

    fn pointer(&mut self, event: PointerEvent) -> PortResult<()> {
        self.calls.push(event.to_string());
        self.pointer_events.push(event);
        Ok(())
    }

    fn value_export(&mut self, name: &str) -> PortResult<u32> {
        self.exports
            .get(name)
            .copied()
            .ok_or_else(|| PortError::missing_export(name))
    }

    fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(&self.memory)
    }
}
