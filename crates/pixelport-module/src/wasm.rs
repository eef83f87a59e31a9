//! wasmtime-backed compute module.

use std::path::Path;

use pixelport_core::{ExportNames, PointerEvent, PointerKind, PortError, PortResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wasmtime::{
    Caller, Engine, Global, Instance, Linker, Memory, Module, Store, TypedFunc, Val, ValType,
    WasmParams, WasmResults,
};

use crate::memory::MemoryView;
use crate::module::ComputeModule;

/// Import namespace the module links its host services from.
pub const IMPORT_MODULE: &str = "env";
/// `() -> f64` in `[0, 1)`.
pub const IMPORT_RANDOM: &str = "Math.random";
pub const EXPORT_MEMORY: &str = "memory";

struct HostState {
    rng: StdRng,
}

/// A compute module instantiated in its own wasmtime store.
pub struct WasmModule {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
    init: TypedFunc<(), ()>,
    tick: TypedFunc<f64, ()>,
    on_move: TypedFunc<(i32, i32), ()>,
    on_down: TypedFunc<(i32, i32), ()>,
    on_up: TypedFunc<(i32, i32), ()>,
}

impl WasmModule {
    /// Load a `.wasm` (or `.wat`) file.
    pub fn from_file(path: &Path, seed: Option<u64>, names: &ExportNames) -> PortResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            PortError::Instantiation(format!("failed to read '{}': {}", path.display(), e))
        })?;
        tracing::info!("Loading module {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(&bytes, seed, names)
    }

    /// Compile, link and instantiate a module, checking every required export.
    ///
    /// The value exports named by `names` must be i32 globals. No module code
    /// runs here; `init` is left to the caller.
    pub fn from_bytes(bytes: &[u8], seed: Option<u64>, names: &ExportNames) -> PortResult<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes)
            .map_err(|e| PortError::Instantiation(format!("failed to compile module: {e:#}")))?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut store = Store::new(&engine, HostState { rng });

        let mut linker = Linker::new(&engine);
        linker
            .func_wrap(
                IMPORT_MODULE,
                IMPORT_RANDOM,
                |mut caller: Caller<'_, HostState>| -> f64 { caller.data_mut().rng.gen::<f64>() },
            )
            .map_err(|e| PortError::Instantiation(format!("failed to define imports: {e:#}")))?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| PortError::Instantiation(format!("failed to link module: {e:#}")))?;

        let memory = instance
            .get_memory(&mut store, EXPORT_MEMORY)
            .ok_or_else(|| PortError::missing_export(EXPORT_MEMORY))?;

        let init = typed_func(&instance, &mut store, "init")?;
        let tick = typed_func(&instance, &mut store, "tick")?;
        let on_move = typed_func(&instance, &mut store, PointerKind::Move.entry_point())?;
        let on_down = typed_func(&instance, &mut store, PointerKind::Down.entry_point())?;
        let on_up = typed_func(&instance, &mut store, PointerKind::Up.entry_point())?;
        for name in [&names.grid_ptr, &names.width, &names.height] {
            i32_global(&instance, &mut store, name)?;
        }

        Ok(Self {
            store,
            instance,
            memory,
            init,
            tick,
            on_move,
            on_down,
            on_up,
        })
    }

    /// Current linear memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }
}

fn typed_func<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &str,
) -> PortResult<TypedFunc<P, R>> {
    let func = instance
        .get_func(&mut *store, name)
        .ok_or_else(|| PortError::missing_export(name))?;
    func.typed::<P, R>(&*store).map_err(|e| {
        PortError::Instantiation(format!("export `{name}` has an unexpected signature: {e:#}"))
    })
}

fn i32_global(instance: &Instance, store: &mut Store<HostState>, name: &str) -> PortResult<Global> {
    let global = instance
        .get_global(&mut *store, name)
        .ok_or_else(|| PortError::missing_export(name))?;
    match global.ty(&*store).content() {
        ValType::I32 => Ok(global),
        _ => Err(PortError::missing_export(format!("{name} (as i32 global)"))),
    }
}

impl ComputeModule for WasmModule {
    fn init(&mut self) -> PortResult<()> {
        self.init
            .call(&mut self.store, ())
            .map_err(|e| PortError::trap("init", format!("{e:#}")))
    }

    fn tick(&mut self, timestamp_ms: f64) -> PortResult<()> {
        self.tick
            .call(&mut self.store, timestamp_ms)
            .map_err(|e| PortError::trap("tick", format!("{e:#}")))
    }

    fn pointer(&mut self, event: PointerEvent) -> PortResult<()> {
        let func = match event.kind {
            PointerKind::Move => &self.on_move,
            PointerKind::Down => &self.on_down,
            PointerKind::Up => &self.on_up,
        };
        func.call(&mut self.store, (event.x, event.y))
            .map_err(|e| PortError::trap(event.kind.entry_point(), format!("{e:#}")))
    }

    fn value_export(&mut self, name: &str) -> PortResult<u32> {
        let global = i32_global(&self.instance, &mut self.store, name)?;
        match global.get(&mut self.store) {
            Val::I32(address) => Ok(address as u32),
            _ => Err(PortError::missing_export(format!("{name} (as i32 global)"))),
        }
    }

    fn memory(&self) -> MemoryView<'_> {
        MemoryView::new(self.memory.data(&self.store))
    }
}
