//! Host reference device for tileblas.
//!
//! [`HostDevice`] implements [`tileblas::Device`] entirely in process: device
//! memory is host memory, a program build parses the assembled kernel source
//! and checks its compile-time constraints, and every kernel entry point has
//! a native execution that follows the device code's work-item mapping.
//! Commands run in submission order on a dedicated worker thread; with the
//! `parallel` feature (on by default) the multiply and solve kernels spread
//! their columns over rayon's thread pool.
//!
//! # Quick Start
//!
//! ```ignore
//! use tileblas_host::matmul;
//!
//! // Simple one-shot API (uses a cached global engine)
//! let a = vec![1.0f32; 64 * 32];
//! let b = vec![1.0f32; 32 * 16];
//! let c = matmul(&a, 64, 32, &b, 16)?;
//! ```
//!
//! # Persistent Engine
//!
//! ```ignore
//! use std::sync::Arc;
//! use tileblas::{DeviceMatrix, Engine, Layout, Side, Triangle, Transpose, Diagonal};
//! use tileblas_host::HostDevice;
//!
//! let engine = Engine::new(Arc::new(HostDevice::new()));
//! let a = DeviceMatrix::from_host(engine.device(), &a_host, n, n, Layout::ColMajor)?;
//! let b = DeviceMatrix::from_host(engine.device(), &b_host, n, nrhs, Layout::ColMajor)?;
//!
//! engine
//!     .trsm(Layout::ColMajor, Side::Left, Triangle::Lower, Transpose::No,
//!           Diagonal::NonUnit, n, nrhs, 1.0f64, a.as_arg(), b.as_arg())?
//!     .wait()?;
//! let x = b.to_host(engine.device())?;
//! ```
//!
//! # Configuration
//!
//! The global engine reads [`EngineConfig::from_env`]: `TILEBLAS_TUNING_FILE`
//! layers a JSON tuning file over the built-in tables and
//! `TILEBLAS_SKIP_COPY=0` forces every operand through a temporary.

mod context;
mod error;
mod kernels;
mod memory;
mod program;
mod queue;

use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, PoisonError};
use tileblas::{BlasError, DeviceMatrix, Element, Engine, EngineConfig, Layout, Transpose};

/// Global engine for the convenience functions.
/// Lazily initialized on first use, persists for process lifetime.
static GLOBAL_ENGINE: OnceCell<Engine> = OnceCell::new();

/// Mutex to ensure only one thread initializes the engine.
static INIT_MUTEX: Mutex<()> = Mutex::new(());

/// Get or initialize the global engine on a default [`HostDevice`].
///
/// # Errors
///
/// Returns an error if the tuning file named by `TILEBLAS_TUNING_FILE`
/// cannot be loaded.
pub fn get_global_engine() -> Result<&'static Engine> {
    if let Some(engine) = GLOBAL_ENGINE.get() {
        return Ok(engine);
    }

    let _lock = INIT_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);

    // Double-check after acquiring lock
    if let Some(engine) = GLOBAL_ENGINE.get() {
        return Ok(engine);
    }

    let engine = Engine::from_config(Arc::new(HostDevice::new()), EngineConfig::from_env())?;
    Ok(GLOBAL_ENGINE.get_or_init(|| engine))
}

pub use context::{HostDevice, HostDeviceConfig};
pub use error::{HostError, Result};
pub use memory::HostMemory;
pub use program::HostProgram;

/// One-shot matrix multiplication on the global engine.
///
/// # Arguments
///
/// * `a` - Matrix A in row-major order, dimensions m×k
/// * `m` - Number of rows in A
/// * `k` - Number of columns in A / rows in B
/// * `b` - Matrix B in row-major order, dimensions k×n
/// * `n` - Number of columns in B
///
/// # Returns
///
/// Result matrix C in row-major order, dimensions m×n
pub fn matmul<T: Element>(a: &[T], m: usize, k: usize, b: &[T], n: usize) -> Result<Vec<T>> {
    matmul_with(get_global_engine()?, a, m, k, b, n)
}

/// [`matmul`] on a given engine.
pub fn matmul_with<T: Element>(
    engine: &Engine,
    a: &[T],
    m: usize,
    k: usize,
    b: &[T],
    n: usize,
) -> Result<Vec<T>> {
    if a.len() != m * k {
        return Err(HostError::DimensionMismatch(format!(
            "A: expected {} elements, got {}",
            m * k,
            a.len()
        )));
    }
    if b.len() != k * n {
        return Err(HostError::DimensionMismatch(format!(
            "B: expected {} elements, got {}",
            k * n,
            b.len()
        )));
    }

    let device = engine.device();
    let a = DeviceMatrix::from_host(device, a, m, k, Layout::RowMajor)?;
    let b = DeviceMatrix::from_host(device, b, k, n, Layout::RowMajor)?;
    let c = DeviceMatrix::<T>::zeros(device, m, n, Layout::RowMajor)?;

    engine
        .gemm(
            Layout::RowMajor,
            Transpose::No,
            Transpose::No,
            m,
            n,
            k,
            T::one(),
            a.as_arg(),
            b.as_arg(),
            T::zero(),
            c.as_arg(),
        )?
        .wait()
        .map_err(BlasError::from)?;

    Ok(c.to_host(device)?)
}
