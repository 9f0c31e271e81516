//! The host device: memory in process, programs checked and executed
//! natively, one in-order command queue.

use crate::kernels::{self, Launch};
use crate::memory::{host_memory, HostMemory};
use crate::program::HostProgram;
use crate::queue::CommandQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tileblas::device::{Buffer, Device, DeviceError, DeviceIdentity, DeviceType, KernelLaunch, Program};
use tileblas::event::Event;
use tracing::{debug, info};

/// Configuration of a [`HostDevice`].
#[derive(Debug, Clone)]
pub struct HostDeviceConfig {
    /// Identity reported to the tuning database.
    pub identity: DeviceIdentity,
    /// Upper bound on live allocations in bytes; unlimited when `None`.
    pub memory_limit: Option<usize>,
    /// Largest accepted work-group (product of the local sizes).
    pub max_work_group_size: usize,
}

impl Default for HostDeviceConfig {
    fn default() -> Self {
        Self {
            identity: DeviceIdentity::new(DeviceType::Cpu, "tileblas", "host"),
            memory_limit: None,
            max_work_group_size: 1024,
        }
    }
}

impl HostDeviceConfig {
    /// Report `identity` to the tuning database instead of the host identity.
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Fail allocations once live buffers would exceed `bytes`.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }
}

/// A [`Device`] that runs every kernel on the host.
///
/// Launches are validated when enqueued (signature, bounds, geometry) and
/// executed in order on the queue's worker thread.
pub struct HostDevice {
    config: HostDeviceConfig,
    queue: CommandQueue,
    allocated: Arc<AtomicUsize>,
    builds: AtomicUsize,
    launches: AtomicUsize,
}

impl HostDevice {
    /// A host device with the default configuration.
    pub fn new() -> Self {
        Self::with_config(HostDeviceConfig::default())
    }

    pub fn with_config(config: HostDeviceConfig) -> Self {
        info!(device = %config.identity, "creating host device");
        Self {
            queue: CommandQueue::new(&config.identity.name),
            config,
            allocated: Arc::new(AtomicUsize::new(0)),
            builds: AtomicUsize::new(0),
            launches: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &HostDeviceConfig {
        &self.config
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Number of successful program builds.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Number of kernel launches accepted onto the queue.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn reserve(&self, bytes: usize) -> Result<(), DeviceError> {
        let limit = match self.config.memory_limit {
            Some(limit) => limit,
            None => {
                self.allocated.fetch_add(bytes, Ordering::SeqCst);
                return Ok(());
            }
        };
        self.allocated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(bytes).filter(|total| *total <= limit)
            })
            .map(|_| ())
            .map_err(|current| DeviceError::OutOfMemory {
                requested: bytes,
                available: limit.saturating_sub(current),
            })
    }

    fn check_geometry(&self, launch: &KernelLaunch<'_>) -> Result<(), DeviceError> {
        let (global, local) = (&launch.global, &launch.local);
        if global.is_empty() || global.len() > 3 || global.len() != local.len() {
            return Err(DeviceError::InvalidLaunch(format!(
                "{}: global {:?} and local {:?} must have 1 to 3 matching dimensions",
                launch.kernel, global, local
            )));
        }
        if global.iter().chain(local.iter()).any(|&size| size == 0) {
            return Err(DeviceError::InvalidLaunch(format!(
                "{}: zero work size in global {:?} / local {:?}",
                launch.kernel, global, local
            )));
        }
        let group: usize = local.iter().product();
        if group > self.config.max_work_group_size {
            return Err(DeviceError::InvalidLaunch(format!(
                "{}: work-group of {} exceeds the maximum of {}",
                launch.kernel, group, self.config.max_work_group_size
            )));
        }
        Ok(())
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HostDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostDevice")
            .field("identity", &self.config.identity)
            .field("allocated", &self.allocated_bytes())
            .field("builds", &self.builds())
            .field("launches", &self.launches())
            .finish()
    }
}

impl Device for HostDevice {
    fn identity(&self) -> &DeviceIdentity {
        &self.config.identity
    }

    fn allocate(&self, bytes: usize) -> Result<Buffer, DeviceError> {
        if bytes == 0 {
            return Err(DeviceError::InvalidBufferSize);
        }
        self.reserve(bytes)?;
        Ok(Buffer::new(Arc::new(HostMemory::new(
            bytes,
            Arc::clone(&self.allocated),
        ))))
    }

    fn build_program(&self, source: &str, options: &[String]) -> Result<Arc<dyn Program>, DeviceError> {
        let program = HostProgram::compile(source, options)?;
        self.builds.fetch_add(1, Ordering::SeqCst);
        debug!(
            precision = %program.precision(),
            kernels = program.kernel_names().len(),
            "built program"
        );
        Ok(Arc::new(program))
    }

    fn enqueue_kernel(&self, launch: KernelLaunch<'_>) -> Result<Event, DeviceError> {
        let program = launch
            .program
            .as_any()
            .downcast_ref::<HostProgram>()
            .ok_or(DeviceError::ForeignProgram)?;
        if !program.has_kernel(launch.kernel) {
            return Err(DeviceError::KernelNotFound(launch.kernel.to_string()));
        }
        self.check_geometry(&launch)?;
        let job = kernels::prepare(&Launch {
            program,
            kernel: launch.kernel,
            args: &launch.args,
            global: &launch.global,
            local: &launch.local,
        })?;
        let event = self.queue.submit(launch.kernel, launch.wait_for, job)?;
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(event)
    }

    fn enqueue_copy(
        &self,
        src: &Buffer,
        dst: &Buffer,
        bytes: usize,
        wait_for: &[Event],
    ) -> Result<Event, DeviceError> {
        for buffer in [src, dst] {
            host_memory(buffer)?;
            if buffer.size() < bytes {
                return Err(DeviceError::OutOfRange(format!(
                    "copy of {} bytes from a {} byte buffer",
                    bytes,
                    buffer.size()
                )));
            }
        }
        let (src, dst) = (src.clone(), dst.clone());
        self.queue.submit(
            "copy",
            wait_for,
            Box::new(move || {
                let mut staging = vec![0u8; bytes];
                host_memory(&src)?.read_bytes(0, &mut staging)?;
                host_memory(&dst)?.write_bytes(0, &staging)
            }),
        )
    }

    fn write_buffer(&self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        let memory = host_memory(buffer)?;
        self.queue.finish()?;
        memory.write_bytes(offset, data)
    }

    fn read_buffer(&self, buffer: &Buffer, offset: usize, out: &mut [u8]) -> Result<(), DeviceError> {
        let memory = host_memory(buffer)?;
        self.queue.finish()?;
        memory.read_bytes(offset, out)
    }

    fn finish(&self) -> Result<(), DeviceError> {
        self.queue.finish()
    }
}
