//! Level-3 routines built on one tiled multiply kernel.
//!
//! Every routine follows the same flow:
//!
//! ```text
//! validate operands -> resolve tuning parameters -> fetch/build program
//!     -> stage operands in -> launch kernel(s) -> stage result out
//! ```
//!
//! | Routine | Kernel launches |
//! |---------|-----------------|
//! | `gemm` | `Xgemm` |
//! | `symm`, `hemm` | `Symm*ToSquared` / `Herm*ToSquared`, then `gemm` |
//! | `syrk`, `herk` | `XgemmUpper` / `XgemmLower` |
//! | `syr2k`, `her2k` | `XgemmUpper` / `XgemmLower`, twice |
//! | `trmm` | `Trmm*ToSquared`, then `gemm` |
//! | `trsm` | `Trmm*ToSquared`, then `TrsmSolve` |
//!
//! Every command a routine enqueues waits on the commands it enqueued
//! before, so the first failing stage fails the rest. Routines return one
//! [`Event`] joined over all of their commands.

#![allow(clippy::too_many_arguments)]

mod gemm;
mod rank_2k;
mod rank_k;
mod staging;
mod symm;
mod triangular;

pub use staging::{
    copy_geometry, select_copy_kernel, CopyKernel, Direction, MatrixView, PaddedBuffer,
    PaddedShape, ShapePipeline, StagedMatrix, Transform, TriangleRestriction, WriteBack,
};

use crate::database::TuningParameters;
use crate::device::{Buffer, Device, KernelArg, KernelLaunch, Program};
use crate::engine::Engine;
use crate::error::{BlasError, Result};
use crate::event::{Event, EventChain};
use crate::source::{self, RoutineFamily};
use crate::types::Precision;
use std::sync::Arc;
use tracing::debug;

/// Resolved parameters and compiled program for one routine family and
/// precision on an engine's device.
pub struct Routine<'e> {
    engine: &'e Engine,
    family: RoutineFamily,
    precision: Precision,
    params: TuningParameters,
    program: Arc<dyn Program>,
    chain: Arc<EventChain>,
}

impl<'e> Routine<'e> {
    pub(crate) fn prepare(
        engine: &'e Engine,
        family: RoutineFamily,
        precision: Precision,
    ) -> Result<Self> {
        let params = engine.parameters(family, precision);
        let source = source::assemble(precision, &params, family.fragments());
        let program = engine
            .cache()
            .get_or_build(engine.device(), precision, family, &source, &[])?;
        Ok(Self {
            engine,
            family,
            precision,
            params,
            program,
            chain: Arc::new(EventChain::new()),
        })
    }

    pub fn family(&self) -> RoutineFamily {
        self.family
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn parameters(&self) -> &TuningParameters {
        &self.params
    }

    pub fn program(&self) -> &Arc<dyn Program> {
        &self.program
    }

    /// A positive tuning parameter; missing or zero is `InvalidKernel`.
    pub fn param(&self, name: &str) -> Result<usize> {
        required_param(&self.params, name)
    }

    pub fn pipeline(&self) -> ShapePipeline<'_> {
        ShapePipeline::new(
            self.engine.device(),
            &self.program,
            &self.params,
            self.precision.element_size(),
        )
        .with_skip_copy(self.engine.config().skip_copy)
        .with_chain(Arc::clone(&self.chain))
    }

    /// Event over every command this routine has enqueued.
    pub fn completion(&self) -> Event {
        self.chain.joined()
    }

    pub(crate) fn device(&self) -> &dyn Device {
        self.engine.device()
    }

    pub(crate) fn run_kernel(
        &self,
        kernel: &str,
        args: Vec<KernelArg>,
        global: Vec<usize>,
        local: Vec<usize>,
    ) -> Result<Event> {
        launch(
            self.engine.device(),
            &self.program,
            &self.chain,
            kernel,
            args,
            global,
            local,
        )
    }

    /// Device-side copy of the first `bytes` bytes of `src` into `dst`.
    pub(crate) fn copy_buffer(&self, src: &Buffer, dst: &Buffer, bytes: usize) -> Result<Event> {
        let wait_for = self.chain.wait_list();
        let event = self.device().enqueue_copy(src, dst, bytes, &wait_for)?;
        self.chain.push(event.clone());
        Ok(event)
    }

    /// Temporary of `elements` elements of this routine's precision.
    pub(crate) fn allocate(&self, elements: usize) -> Result<Buffer> {
        let bytes = elements * self.precision.element_size();
        self.device()
            .allocate(bytes)
            .map_err(|err| BlasError::TempBufferAllocFailure(format!("{} bytes: {}", bytes, err)))
    }

    /// Work sizes of the tiled multiply over an `m_ceiled x n_ceiled` result.
    pub(crate) fn gemm_geometry(
        &self,
        m_ceiled: usize,
        n_ceiled: usize,
    ) -> Result<(Vec<usize>, Vec<usize>)> {
        let mdimc = self.param("MDIMC")?;
        let ndimc = self.param("NDIMC")?;
        let global = vec![
            m_ceiled * mdimc / self.param("MWG")?,
            n_ceiled * ndimc / self.param("NWG")?,
        ];
        Ok((global, vec![mdimc, ndimc]))
    }

    /// Work sizes of the `*ToSquared` packing kernels over a `dim x dim` result.
    pub(crate) fn pad_geometry(&self, dim: usize) -> Result<(Vec<usize>, Vec<usize>)> {
        let dimx = self.param("PAD_DIMX")?;
        let dimy = self.param("PAD_DIMY")?;
        let global = vec![
            ceil(ceil_div(dim, self.param("PAD_WPTX")?), dimx),
            ceil(ceil_div(dim, self.param("PAD_WPTY")?), dimy),
        ];
        Ok((global, vec![dimx, dimy]))
    }
}

impl std::fmt::Debug for Routine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Routine")
            .field("family", &self.family)
            .field("precision", &self.precision)
            .field("params", &self.params)
            .finish()
    }
}

pub(crate) fn required_param(params: &TuningParameters, name: &str) -> Result<usize> {
    match params.get(name) {
        Some(0) => Err(BlasError::InvalidKernel(format!(
            "tuning parameter {} must be positive",
            name
        ))),
        Some(value) => Ok(value),
        None => Err(BlasError::InvalidKernel(format!(
            "missing tuning parameter {}",
            name
        ))),
    }
}

/// Enqueue `kernel` behind every command already in `chain`, then add it to
/// the chain.
pub(crate) fn launch(
    device: &dyn Device,
    program: &Arc<dyn Program>,
    chain: &EventChain,
    kernel: &str,
    args: Vec<KernelArg>,
    global: Vec<usize>,
    local: Vec<usize>,
) -> Result<Event> {
    if !program.has_kernel(kernel) {
        return Err(BlasError::InvalidKernel(format!(
            "program has no kernel {}",
            kernel
        )));
    }
    let wait_for = chain.wait_list();
    debug!(kernel, ?global, ?local, waits = wait_for.len(), "enqueue kernel");
    let event = device.enqueue_kernel(KernelLaunch {
        program,
        kernel,
        args,
        global,
        local,
        wait_for: &wait_for,
    })?;
    chain.push(event.clone());
    Ok(event)
}

pub(crate) fn ceil_div(x: usize, y: usize) -> usize {
    (x + y - 1) / y
}

/// Round `x` up to a multiple of `y`.
pub(crate) fn ceil(x: usize, y: usize) -> usize {
    ceil_div(x, y) * y
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub(crate) fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}
