//! Device abstraction consumed by the routine engine.
//!
//! A backend implements [`Device`] to provide memory, program compilation and
//! an in-order command queue. The engine never touches device memory directly:
//! it only allocates [`Buffer`]s, builds [`Program`]s from assembled kernel
//! source and enqueues kernel launches by entry-point name.
//!
//! ```text
//! Engine ──allocate──────────────▶ Buffer (temporaries, RAII)
//!        ──build_program(source)─▶ Program (cached per key)
//!        ──enqueue_kernel(launch)▶ Event  (in-order queue)
//! ```

use crate::event::Event;
use crate::types::Scalar;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a device backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// An allocation would exceed the memory the device has left.
    #[error("Out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// A zero-byte allocation was requested.
    #[error("Invalid buffer size: allocations must be non-empty")]
    InvalidBufferSize,

    /// A command referenced a handle without memory behind it.
    #[error("Null buffer handle")]
    NullBuffer,

    /// A read, write or copy reaches past the end of a buffer.
    #[error("Buffer access out of range: {0}")]
    OutOfRange(String),

    /// The kernel source was rejected by the device compiler.
    #[error("Program build failed: {0}")]
    Build(String),

    /// The program has no entry point of this name.
    #[error("Kernel not found: {0}")]
    KernelNotFound(String),

    /// A program built by another backend was passed in.
    #[error("Program was not built by this device")]
    ForeignProgram,

    /// Kernel arguments do not match the entry point's signature.
    #[error("Invalid arguments for kernel {kernel}: {reason}")]
    InvalidArguments { kernel: String, reason: String },

    /// Global and local work sizes are inconsistent or too large.
    #[error("Invalid launch configuration: {0}")]
    InvalidLaunch(String),

    /// A command failed while running on the queue.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The queue stopped before the command could run.
    #[error("Command queue is no longer running")]
    QueueClosed,
}

/// Kind of compute device. `All` only appears in tuning selectors, where it
/// matches any device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Cpu,
    Gpu,
    Accelerator,
    All,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceType::Cpu => "cpu",
            DeviceType::Gpu => "gpu",
            DeviceType::Accelerator => "accelerator",
            DeviceType::All => "all",
        };
        f.write_str(name)
    }
}

/// Identity of a device as seen by the tuning database and program cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub device_type: DeviceType,
    pub vendor: String,
    pub name: String,
}

impl DeviceIdentity {
    pub fn new(device_type: DeviceType, vendor: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device_type,
            vendor: vendor.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} ({})", self.vendor, self.name, self.device_type)
    }
}

/// Backend-owned memory behind a [`Buffer`].
pub trait DeviceMemory: Send + Sync + fmt::Debug {
    /// Size in bytes.
    fn size(&self) -> usize;

    fn as_any(&self) -> &dyn Any;
}

/// Reference-counted handle to device memory. Clones share the same memory;
/// the memory is released when the last handle drops.
#[derive(Clone, Default)]
pub struct Buffer {
    memory: Option<Arc<dyn DeviceMemory>>,
}

impl Buffer {
    pub fn new(memory: Arc<dyn DeviceMemory>) -> Self {
        Self {
            memory: Some(memory),
        }
    }

    /// A handle that refers to no memory.
    pub fn null() -> Self {
        Self { memory: None }
    }

    pub fn is_null(&self) -> bool {
        self.memory.is_none()
    }

    /// Size in bytes; zero for a null handle.
    pub fn size(&self) -> usize {
        self.memory.as_ref().map_or(0, |memory| memory.size())
    }

    /// Backend memory of a given concrete type.
    pub fn downcast<M: DeviceMemory + 'static>(&self) -> Option<&M> {
        self.memory.as_ref()?.as_any().downcast_ref::<M>()
    }

    /// Whether both handles refer to the same memory.
    pub fn same_memory(&self, other: &Buffer) -> bool {
        match (&self.memory, &other.memory) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.memory {
            Some(memory) => f.debug_tuple("Buffer").field(memory).finish(),
            None => f.write_str("Buffer(null)"),
        }
    }
}

/// A compiled program exposing named kernel entry points.
pub trait Program: Send + Sync + fmt::Debug {
    fn kernel_names(&self) -> Vec<&str>;

    fn has_kernel(&self, name: &str) -> bool {
        self.kernel_names().contains(&name)
    }

    fn as_any(&self) -> &dyn Any;
}

/// Argument of a kernel launch.
#[derive(Debug, Clone)]
pub enum KernelArg {
    Size(usize),
    Flag(bool),
    Scalar(Scalar),
    Buffer(Buffer),
}

impl From<usize> for KernelArg {
    fn from(value: usize) -> Self {
        KernelArg::Size(value)
    }
}

impl From<bool> for KernelArg {
    fn from(value: bool) -> Self {
        KernelArg::Flag(value)
    }
}

impl From<Scalar> for KernelArg {
    fn from(value: Scalar) -> Self {
        KernelArg::Scalar(value)
    }
}

impl From<&Buffer> for KernelArg {
    fn from(value: &Buffer) -> Self {
        KernelArg::Buffer(value.clone())
    }
}

/// One kernel launch: entry point, arguments and work geometry.
#[derive(Debug, Clone)]
pub struct KernelLaunch<'a> {
    pub program: &'a Arc<dyn Program>,
    pub kernel: &'a str,
    pub args: Vec<KernelArg>,
    pub global: Vec<usize>,
    pub local: Vec<usize>,
    /// Events that must succeed before the kernel runs. When one of them
    /// failed the kernel is skipped and its event carries that failure.
    pub wait_for: &'a [Event],
}

/// A compute device with one in-order command queue.
pub trait Device: Send + Sync {
    fn identity(&self) -> &DeviceIdentity;

    /// Allocate `bytes` bytes of device memory.
    fn allocate(&self, bytes: usize) -> Result<Buffer, DeviceError>;

    /// Compile a program from source with the given build options.
    fn build_program(&self, source: &str, options: &[String])
        -> Result<Arc<dyn Program>, DeviceError>;

    /// Enqueue a kernel launch behind all previously enqueued commands and
    /// the launch's wait list.
    fn enqueue_kernel(&self, launch: KernelLaunch<'_>) -> Result<Event, DeviceError>;

    /// Enqueue a copy of the first `bytes` bytes of `src` into `dst`, skipped
    /// like a kernel when an event of `wait_for` failed.
    fn enqueue_copy(
        &self,
        src: &Buffer,
        dst: &Buffer,
        bytes: usize,
        wait_for: &[Event],
    ) -> Result<Event, DeviceError>;

    /// Blocking write, ordered after previously enqueued commands.
    fn write_buffer(&self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<(), DeviceError>;

    /// Blocking read, ordered after previously enqueued commands.
    fn read_buffer(&self, buffer: &Buffer, offset: usize, out: &mut [u8])
        -> Result<(), DeviceError>;

    /// Block until every enqueued command has completed.
    fn finish(&self) -> Result<(), DeviceError>;
}
