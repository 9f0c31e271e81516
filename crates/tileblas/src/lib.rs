//! Device-aware level-3 BLAS.
//!
//! Every routine is built on one tiled matrix-multiply kernel whose tile
//! sizes come from a per-device tuning database. Operands are staged into
//! tile-multiple temporaries (padded, transposed and conjugated as needed),
//! the kernel runs, and results are copied back.
//!
//! | Routine | Operation |
//! |---------|-----------|
//! | `gemm` | `C = alpha * op(A) * op(B) + beta * C` |
//! | `symm`, `hemm` | `C = alpha * A * B + beta * C`, A symmetric / Hermitian |
//! | `syrk`, `herk` | `C = alpha * op(A) * op(A)^T + beta * C` (one triangle) |
//! | `syr2k`, `her2k` | `C = alpha * op(A) * op(B)^T + alpha * op(B) * op(A)^T + beta * C` |
//! | `trmm` | `B = alpha * op(A) * B`, A triangular |
//! | `trsm` | solve `op(A) * X = alpha * B` |
//!
//! The crate does not talk to hardware itself. A backend implements the
//! [`Device`] trait (memory, program builds, an in-order command queue) and
//! an [`Engine`] drives it:
//!
//! ```ignore
//! use std::sync::Arc;
//! use tileblas::{DeviceMatrix, Engine, Layout, Transpose};
//!
//! let engine = Engine::new(Arc::new(device));
//! let a = DeviceMatrix::from_host(engine.device(), &a_host, m, k, Layout::RowMajor)?;
//! let b = DeviceMatrix::from_host(engine.device(), &b_host, k, n, Layout::RowMajor)?;
//! let c = DeviceMatrix::<f32>::zeros(engine.device(), m, n, Layout::RowMajor)?;
//!
//! engine
//!     .gemm(Layout::RowMajor, Transpose::No, Transpose::No, m, n, k,
//!           1.0f32, a.as_arg(), b.as_arg(), 0.0f32, c.as_arg())?
//!     .wait()?;
//! let result = c.to_host(engine.device())?;
//! ```
//!
//! # Tuning
//!
//! Parameters are looked up per routine, precision and device with a
//! device -> vendor default -> global default fallback (see [`database`]).
//! A JSON file can layer extra entries over the built-in tables; set
//! `TILEBLAS_TUNING_FILE` and use [`EngineConfig::from_env`].
//!
//! # Compiled programs
//!
//! Each routine family compiles one program per device and precision. The
//! [`ProgramCache`] keeps it for the lifetime of the engine, so only the
//! first call of a family pays for the build.

pub mod cache;
pub mod config;
pub mod database;
pub mod descriptor;
pub mod device;
pub mod engine;
pub mod error;
pub mod event;
pub mod matrix;
pub mod routines;
pub mod source;
pub mod types;

pub use cache::ProgramCache;
pub use config::EngineConfig;
pub use database::{DatabaseError, TuningDatabase, TuningParameters};
pub use descriptor::{MatrixArg, MatrixDescriptor};
pub use device::{Buffer, Device, DeviceError, DeviceIdentity, DeviceType, KernelArg, Program};
pub use engine::Engine;
pub use error::{BlasError, Operand, Result, StatusCode};
pub use event::Event;
pub use matrix::{download, upload, DeviceMatrix};
pub use routines::Routine;
pub use source::RoutineFamily;
pub use types::{
    Complex32, Complex64, ComplexElement, Diagonal, Element, Layout, Precision, Scalar, Side,
    Transpose, Triangle,
};
