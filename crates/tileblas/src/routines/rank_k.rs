//! Symmetric and Hermitian rank-k updates, and the triangle-restricted
//! driver shared with the rank-2k updates.
//!
//! ```text
//! syrk: C = alpha * op(A) * op(A)^T + beta * C
//! herk: C = alpha * op(A) * op(A)^H + beta * C      (alpha, beta real)
//! ```
//!
//! `op(A)` is `n x k`. Only `triangle` of C is written; the other triangle
//! keeps its contents.

use super::{ceil, lcm, PaddedShape, Routine, ShapePipeline, StagedMatrix, Transform};
use super::{TriangleRestriction, WriteBack};
use crate::descriptor::{MatrixArg, MatrixDescriptor};
use crate::engine::Engine;
use crate::error::{BlasError, Operand, Result};
use crate::event::Event;
use crate::source::RoutineFamily;
use crate::types::{ComplexElement, Element, Layout, Transpose, Triangle};
use tracing::debug_span;

impl Engine {
    /// Symmetric rank-k update. `Transpose::Conjugate` acts as `Yes`.
    pub fn syrk<T: Element>(
        &self,
        layout: Layout,
        triangle: Triangle,
        a_transpose: Transpose,
        n: usize,
        k: usize,
        alpha: T,
        a: MatrixArg<'_>,
        beta: T,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span = debug_span!("syrk", precision = %T::PRECISION, ?triangle, n, k).entered();
        if n == 0 || k == 0 {
            return Err(BlasError::InvalidDimension);
        }
        let element_size = T::PRECISION.element_size();
        let a = rank_operand(a, layout, a_transpose, n, k, Operand::A, element_size)?;
        let c = result_operand(c, layout, n, element_size)?;

        let routine = self.routine(RoutineFamily::Syrk, T::PRECISION)?;
        let pass = RankPass {
            x: &a,
            x_conjugate: false,
            y: &a,
            y_conjugate: false,
            alpha,
            beta,
        };
        run_rank_update(&routine, triangle, n, k, &c, &[pass], false)
    }

    /// Hermitian rank-k update. `Transpose::Yes` acts as `Conjugate`; the
    /// imaginary parts of C's diagonal are cleared.
    pub fn herk<T: ComplexElement>(
        &self,
        layout: Layout,
        triangle: Triangle,
        a_transpose: Transpose,
        n: usize,
        k: usize,
        alpha: T::Real,
        a: MatrixArg<'_>,
        beta: T::Real,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span = debug_span!("herk", precision = %T::PRECISION, ?triangle, n, k).entered();
        if n == 0 || k == 0 {
            return Err(BlasError::InvalidDimension);
        }
        let element_size = T::PRECISION.element_size();
        let a = rank_operand(a, layout, a_transpose, n, k, Operand::A, element_size)?;
        let c = result_operand(c, layout, n, element_size)?;

        let routine = self.routine(RoutineFamily::Herk, T::PRECISION)?;
        let transposed = a_transpose.is_transposed();
        let pass = RankPass {
            x: &a,
            x_conjugate: transposed,
            y: &a,
            y_conjugate: !transposed,
            alpha: T::from_real(alpha),
            beta: T::from_real(beta),
        };
        run_rank_update(&routine, triangle, n, k, &c, &[pass], true)
    }
}

/// `op(X)` of a rank update: `n x k` after its transpose flag.
pub(super) fn rank_operand<'a>(
    arg: MatrixArg<'a>,
    layout: Layout,
    transpose: Transpose,
    n: usize,
    k: usize,
    operand: Operand,
    element_size: usize,
) -> Result<MatrixDescriptor<'a>> {
    let descriptor = MatrixDescriptor::new(arg, n, k, layout, transpose.is_transposed());
    descriptor.validate(operand, element_size)?;
    Ok(descriptor)
}

/// The `n x n` result of a rank update.
pub(super) fn result_operand<'a>(
    arg: MatrixArg<'a>,
    layout: Layout,
    n: usize,
    element_size: usize,
) -> Result<MatrixDescriptor<'a>> {
    let descriptor = MatrixDescriptor::new(arg, n, n, layout, false);
    descriptor.validate(Operand::C, element_size)?;
    Ok(descriptor)
}

/// One `C = alpha * X * Y^T + beta * C` launch.
pub(super) struct RankPass<'d, 'a, T> {
    pub x: &'d MatrixDescriptor<'a>,
    pub x_conjugate: bool,
    pub y: &'d MatrixDescriptor<'a>,
    pub y_conjugate: bool,
    pub alpha: T,
    pub beta: T,
}

struct StagedOperand<'d, 'a> {
    source: &'d MatrixDescriptor<'a>,
    transform: Transform,
    staged: StagedMatrix<'a>,
}

/// Stage `source` once per distinct transform.
fn reserve_operand<'d, 'a>(
    pipeline: &ShapePipeline<'_>,
    operands: &mut Vec<StagedOperand<'d, 'a>>,
    source: &'d MatrixDescriptor<'a>,
    conjugate: bool,
    shape: PaddedShape,
) -> Result<usize> {
    let transform = Transform::new(source.rotated(), conjugate);
    let existing = operands
        .iter()
        .position(|op| std::ptr::eq(op.source, source) && op.transform == transform);
    if let Some(index) = existing {
        return Ok(index);
    }
    let staged = pipeline.reserve(source, shape, transform)?;
    operands.push(StagedOperand {
        source,
        transform,
        staged,
    });
    Ok(operands.len() - 1)
}

/// Run the passes into a copy of C with the triangle-restricted kernel, then
/// write back only `triangle`.
///
/// ```text
/// n_ceiled = ceil(n, lcm(MWG, NWG))      k_ceiled = ceil(k, KWG)
/// X, Y -> (n_ceiled, k_ceiled)           C -> (n_ceiled, n_ceiled)
/// ```
pub(super) fn run_rank_update<T: Element>(
    routine: &Routine<'_>,
    triangle: Triangle,
    n: usize,
    k: usize,
    c: &MatrixDescriptor<'_>,
    passes: &[RankPass<'_, '_, T>],
    zero_diagonal_imag: bool,
) -> Result<Event> {
    let n_ceiled = ceil(n, lcm(routine.param("MWG")?, routine.param("NWG")?));
    let k_ceiled = ceil(k, routine.param("KWG")?);
    let (global, local) = routine.gemm_geometry(n_ceiled, n_ceiled)?;
    let operand_shape = PaddedShape::new(n_ceiled, k_ceiled);

    let pipeline = routine.pipeline();
    let mut operands = Vec::new();
    let mut launches = Vec::with_capacity(passes.len());
    for pass in passes {
        let x = reserve_operand(&pipeline, &mut operands, pass.x, pass.x_conjugate, operand_shape)?;
        let y = reserve_operand(&pipeline, &mut operands, pass.y, pass.y_conjugate, operand_shape)?;
        launches.push((x, y));
    }
    // the kernel writes whole tiles across the diagonal, so C is never used in place
    let c_transform = Transform::new(c.rotated(), false);
    let c_temp = StagedMatrix::Padded(pipeline.allocate(PaddedShape::new(n_ceiled, n_ceiled))?);

    for operand in &operands {
        pipeline.load(&operand.staged, operand.source, operand.transform)?;
    }
    pipeline.load(&c_temp, c, c_transform)?;

    let (kernel, restriction) = match triangle {
        Triangle::Upper => ("XgemmUpper", TriangleRestriction::Upper),
        Triangle::Lower => ("XgemmLower", TriangleRestriction::Lower),
    };
    for (pass, (x, y)) in passes.iter().zip(launches) {
        routine.run_kernel(
            kernel,
            vec![
                n_ceiled.into(),
                k_ceiled.into(),
                pass.alpha.to_scalar().into(),
                pass.beta.to_scalar().into(),
                operands[x].staged.buffer().into(),
                operands[y].staged.buffer().into(),
                c_temp.buffer().into(),
            ],
            global.clone(),
            local.clone(),
        )?;
    }

    let mut write_back = WriteBack::triangle(restriction);
    if zero_diagonal_imag {
        write_back = write_back.with_zero_diagonal_imag();
    }
    pipeline.stage_out(&c_temp, c, c_transform, write_back)?;
    Ok(routine.completion())
}
