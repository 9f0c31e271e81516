//! General matrix multiply, and the driver every other routine reuses.

use super::{ceil, PaddedShape, Routine, StagedMatrix, Transform, WriteBack};
use crate::descriptor::{MatrixArg, MatrixDescriptor};
use crate::engine::Engine;
use crate::error::{BlasError, Operand, Result};
use crate::event::Event;
use crate::source::RoutineFamily;
use crate::types::{Element, Layout, Transpose};
use tracing::debug_span;

impl Engine {
    /// `C = alpha * op(A) * op(B) + beta * C` with `op(A)` of size `m x k`,
    /// `op(B)` of size `k x n` and `C` of size `m x n`.
    pub fn gemm<T: Element>(
        &self,
        layout: Layout,
        a_transpose: Transpose,
        b_transpose: Transpose,
        m: usize,
        n: usize,
        k: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
        beta: T,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span = debug_span!("gemm", precision = %T::PRECISION, ?layout, m, n, k).entered();
        let operands = GemmOperands::new(
            layout,
            a_transpose,
            b_transpose,
            m,
            n,
            k,
            a,
            b,
            c,
            T::PRECISION.element_size(),
        )?;
        let routine = self.routine(RoutineFamily::Gemm, T::PRECISION)?;
        run_gemm(&routine, &operands, alpha, beta)
    }
}

/// Validated operands of one multiply.
#[derive(Debug)]
pub(crate) struct GemmOperands<'a> {
    m: usize,
    n: usize,
    k: usize,
    a: MatrixDescriptor<'a>,
    b: MatrixDescriptor<'a>,
    c: MatrixDescriptor<'a>,
    a_conjugate: bool,
    b_conjugate: bool,
}

impl<'a> GemmOperands<'a> {
    pub(crate) fn new(
        layout: Layout,
        a_transpose: Transpose,
        b_transpose: Transpose,
        m: usize,
        n: usize,
        k: usize,
        a: MatrixArg<'a>,
        b: MatrixArg<'a>,
        c: MatrixArg<'a>,
        element_size: usize,
    ) -> Result<Self> {
        if m == 0 || n == 0 || k == 0 {
            return Err(BlasError::InvalidDimension);
        }
        let a = MatrixDescriptor::new(a, m, k, layout, a_transpose.is_transposed());
        let b = MatrixDescriptor::new(b, k, n, layout, b_transpose.is_transposed());
        let c = MatrixDescriptor::new(c, m, n, layout, false);
        a.validate(Operand::A, element_size)?;
        b.validate(Operand::B, element_size)?;
        c.validate(Operand::C, element_size)?;
        Ok(Self {
            m,
            n,
            k,
            a,
            b,
            c,
            a_conjugate: a_transpose.is_conjugate(),
            b_conjugate: b_transpose.is_conjugate(),
        })
    }
}

/// Stage A, B and C into tile-multiple temporaries, run `Xgemm`, and copy
/// C back.
///
/// ```text
/// A -> (m_ceiled, k_ceiled)   transposed when A is rotated
/// B -> (n_ceiled, k_ceiled)   transposed when B is not rotated
/// C -> (m_ceiled, n_ceiled)   transposed for row-major layout
/// ```
pub(crate) fn run_gemm<T: Element>(
    routine: &Routine<'_>,
    ops: &GemmOperands<'_>,
    alpha: T,
    beta: T,
) -> Result<Event> {
    GemmPlan::reserve(routine, ops)?.execute(routine, alpha, beta)
}

/// A multiply whose temporaries are allocated but not yet filled. Routines
/// that enqueue work of their own before the multiply reserve the plan first
/// so that an allocation failure happens before any launch.
pub(crate) struct GemmPlan<'o, 'a> {
    ops: &'o GemmOperands<'a>,
    m_ceiled: usize,
    n_ceiled: usize,
    k_ceiled: usize,
    global: Vec<usize>,
    local: Vec<usize>,
    transforms: [Transform; 3],
    staged: [StagedMatrix<'a>; 3],
}

impl<'o, 'a> GemmPlan<'o, 'a> {
    pub(crate) fn reserve(routine: &Routine<'_>, ops: &'o GemmOperands<'a>) -> Result<Self> {
        let m_ceiled = ceil(ops.m, routine.param("MWG")?);
        let n_ceiled = ceil(ops.n, routine.param("NWG")?);
        let k_ceiled = ceil(ops.k, routine.param("KWG")?);
        let (global, local) = routine.gemm_geometry(m_ceiled, n_ceiled)?;

        let transforms = [
            Transform::new(ops.a.rotated(), ops.a_conjugate),
            Transform::new(!ops.b.rotated(), ops.b_conjugate),
            Transform::new(ops.c.rotated(), false),
        ];
        let pipeline = routine.pipeline();
        let staged = [
            pipeline.reserve(&ops.a, PaddedShape::new(m_ceiled, k_ceiled), transforms[0])?,
            pipeline.reserve(&ops.b, PaddedShape::new(n_ceiled, k_ceiled), transforms[1])?,
            pipeline.reserve(&ops.c, PaddedShape::new(m_ceiled, n_ceiled), transforms[2])?,
        ];
        Ok(Self {
            ops,
            m_ceiled,
            n_ceiled,
            k_ceiled,
            global,
            local,
            transforms,
            staged,
        })
    }

    pub(crate) fn execute<T: Element>(self, routine: &Routine<'_>, alpha: T, beta: T) -> Result<Event> {
        let [a_staged, b_staged, c_staged] = &self.staged;
        let [a_transform, b_transform, c_transform] = self.transforms;

        let pipeline = routine.pipeline();
        pipeline.load(a_staged, &self.ops.a, a_transform)?;
        pipeline.load(b_staged, &self.ops.b, b_transform)?;
        pipeline.load(c_staged, &self.ops.c, c_transform)?;

        routine.run_kernel(
            "Xgemm",
            vec![
                self.m_ceiled.into(),
                self.n_ceiled.into(),
                self.k_ceiled.into(),
                alpha.to_scalar().into(),
                beta.to_scalar().into(),
                a_staged.buffer().into(),
                b_staged.buffer().into(),
                c_staged.buffer().into(),
            ],
            self.global.clone(),
            self.local.clone(),
        )?;

        pipeline.stage_out(c_staged, &self.ops.c, c_transform, WriteBack::FULL)?;
        Ok(routine.completion())
    }
}
