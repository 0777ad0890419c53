//! Core-pinned thread spawning for ESP32-S3 dual-core.
//!
//! Wraps `esp_pthread_set_cfg()` so that `std::thread::spawn` creates a
//! FreeRTOS task pinned to a specific CPU core with explicit priority
//! and stack size. On non-ESP targets, falls back to plain thread spawn.
//!
//! `esp_pthread_set_cfg()` sets thread-local configuration that applies to
//! the *next* `pthread_create()` from the calling thread, so the
//! config→spawn pair must not be interleaved with other thread creation.

use crate::error::Error;

/// CPU core identifiers for the ESP32-S3 Xtensa LX7 dual-core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): radio stacks and the display.
    Pro = 0,
    /// Core 1 (APP_CPU): AFE sampling.
    App = 1,
}

/// Placement of one dedicated firmware task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSpec {
    pub core: Core,
    /// FreeRTOS priority.
    pub priority: u8,
    pub stack_kb: usize,
    /// Null-terminated, e.g. `"afe-sampler\0"`.
    pub name: &'static str,
}

impl TaskSpec {
    fn display_name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }
}

/// Spawn a thread placed according to `spec`.
#[cfg(target_os = "espidf")]
pub fn spawn_on_core(
    spec: &TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> Result<std::thread::JoinHandle<()>, Error> {
    if !spec.name.ends_with('\0') {
        return Err(Error::Task("task name must be null-terminated"));
    }

    // SAFETY: called from the spawning thread immediately before
    // `thread::spawn`; `name` is 'static and null-terminated.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = spec.core as i32;
        cfg.prio = i32::from(spec.priority);
        cfg.stack_size = (spec.stack_kb * 1024) as i32;
        cfg.thread_name = spec.name.as_ptr().cast();
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        log::error!("esp_pthread_set_cfg failed: {}", ret);
        return Err(Error::Task("esp_pthread_set_cfg failed"));
    }

    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        spec.display_name(),
        spec.core,
        spec.priority,
        spec.stack_kb
    );

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .spawn(f)
        .map_err(|_| Error::Task("thread creation failed"))
}

/// Simulation fallback: only the name and stack size apply.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core(
    spec: &TaskSpec,
    f: impl FnOnce() + Send + 'static,
) -> Result<std::thread::JoinHandle<()>, Error> {
    log::info!("Spawning '{}' (sim, stack={}KB)", spec.display_name(), spec.stack_kb);

    std::thread::Builder::new()
        .name(spec.display_name().into())
        .stack_size(spec.stack_kb * 1024)
        .spawn(f)
        .map_err(|_| Error::Task("thread creation failed"))
}
