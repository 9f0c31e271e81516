//! Triangular multiply and solve.
//!
//! Both routines first pack the referenced triangle of A into a full `k x k`
//! temporary with zeros outside the triangle and, for unit-diagonal
//! matrices, ones on the diagonal.

use super::gemm::{GemmOperands, GemmPlan};
use super::symm::expand_to_squared;
use super::{ceil, Direction, PaddedShape, Transform, WriteBack};
use crate::descriptor::{MatrixArg, MatrixDescriptor};
use crate::engine::Engine;
use crate::error::{BlasError, Operand, Result};
use crate::event::Event;
use crate::source::RoutineFamily;
use crate::types::{Diagonal, Element, Layout, Side, Transpose, Triangle};
use tracing::debug_span;

/// Validated `A` (`k x k`) and `B` (`m x n`) of a triangular routine.
struct TriangularOperands<'a> {
    k: usize,
    a: MatrixDescriptor<'a>,
    b: MatrixDescriptor<'a>,
}

impl<'a> TriangularOperands<'a> {
    fn new(
        layout: Layout,
        side: Side,
        m: usize,
        n: usize,
        a: MatrixArg<'a>,
        b: MatrixArg<'a>,
        element_size: usize,
    ) -> Result<Self> {
        if m == 0 || n == 0 {
            return Err(BlasError::InvalidDimension);
        }
        let k = match side {
            Side::Left => m,
            Side::Right => n,
        };
        let a = MatrixDescriptor::new(a, k, k, layout, false);
        let b = MatrixDescriptor::new(b, m, n, layout, false);
        a.validate(Operand::A, element_size)?;
        b.validate(Operand::B, element_size)?;
        Ok(Self { k, a, b })
    }
}

/// Packing kernel for the stored triangle; row-major storage holds the
/// transpose, so the triangle flips.
fn packing_kernel(layout: Layout, triangle: Triangle) -> (&'static str, bool) {
    let upper = (triangle == Triangle::Upper) ^ (layout == Layout::RowMajor);
    if upper {
        ("TrmmUpperToSquared", true)
    } else {
        ("TrmmLowerToSquared", false)
    }
}

impl Engine {
    /// `B = alpha * op(A) * B` (left) or `B = alpha * B * op(A)` (right)
    /// with A triangular.
    pub fn trmm<T: Element>(
        &self,
        layout: Layout,
        side: Side,
        triangle: Triangle,
        a_transpose: Transpose,
        diagonal: Diagonal,
        m: usize,
        n: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span =
            debug_span!("trmm", precision = %T::PRECISION, ?side, ?triangle, ?diagonal, m, n)
                .entered();
        let element_size = T::PRECISION.element_size();
        let ops = TriangularOperands::new(layout, side, m, n, a, b, element_size)?;
        let k = ops.k;

        let routine = self.routine(RoutineFamily::Trmm, T::PRECISION)?;
        let b_elements = ops
            .b
            .required_elements()
            .ok_or(BlasError::InvalidDimension)?;
        let b_copy = routine.allocate(b_elements)?;
        let packed = routine.allocate(k * k)?;

        // B is both an input and the output: the multiply reads a copy
        let squared = MatrixArg::new(&packed, 0, k);
        let copied = MatrixArg::new(&b_copy, ops.b.offset, ops.b.ld);
        let (first, second, first_transpose, second_transpose) = match side {
            Side::Left => (squared, copied, a_transpose, Transpose::No),
            Side::Right => (copied, squared, Transpose::No, a_transpose),
        };
        let gemm = GemmOperands::new(
            layout,
            first_transpose,
            second_transpose,
            m,
            n,
            k,
            first,
            second,
            b,
            element_size,
        )?;
        let plan = GemmPlan::reserve(&routine, &gemm)?;

        routine.copy_buffer(ops.b.buffer, &b_copy, b_elements * element_size)?;
        let (kernel, _) = packing_kernel(layout, triangle);
        expand_to_squared(
            &routine,
            kernel,
            &ops.a,
            k,
            &packed,
            Some(diagonal == Diagonal::Unit),
        )?;
        plan.execute(&routine, alpha, T::zero())
    }

    /// Solve `op(A) * X = alpha * B` (left) or `X * op(A) = alpha * B`
    /// (right) for X, overwriting B.
    ///
    /// Both sides are reduced to a column-major system `M * X' = alpha * B'`:
    ///
    /// ```text
    /// Left:  M = op(A),    X' = X,    B' = B      (k x n)
    /// Right: M = op(A)^T,  X' = X^T,  B' = B^T    (k x m)
    /// ```
    ///
    /// A singular A yields non-finite results, as in reference BLAS.
    pub fn trsm<T: Element>(
        &self,
        layout: Layout,
        side: Side,
        triangle: Triangle,
        a_transpose: Transpose,
        diagonal: Diagonal,
        m: usize,
        n: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span =
            debug_span!("trsm", precision = %T::PRECISION, ?side, ?triangle, ?diagonal, m, n)
                .entered();
        let ops = TriangularOperands::new(layout, side, m, n, a, b, T::PRECISION.element_size())?;
        let k = ops.k;

        let routine = self.routine(RoutineFamily::Trsm, T::PRECISION)?;
        let trsm_dim = routine.param("TRSM_DIM")?;

        let row_major = layout == Layout::RowMajor;
        let (kernel, packed_upper) = packing_kernel(layout, triangle);
        // transform taking the packed storage of A to M
        let system_transform = Transform::new(
            a_transpose.is_transposed() ^ row_major ^ (side == Side::Right),
            a_transpose.is_conjugate(),
        );
        let lower = !packed_upper ^ system_transform.transpose;

        let (cols, b_transform) = match side {
            Side::Left => (n, Transform::new(ops.b.rotated(), false)),
            Side::Right => (m, Transform::new(!ops.b.rotated(), false)),
        };

        let pipeline = routine.pipeline();
        let square = PaddedShape::new(k, k);
        let packed = pipeline.allocate(square)?;
        let restaged = if system_transform.is_identity() {
            None
        } else {
            Some(pipeline.allocate(square)?)
        };
        let b_staged = pipeline.reserve(&ops.b, PaddedShape::new(k, cols), b_transform)?;

        expand_to_squared(
            &routine,
            kernel,
            &ops.a,
            k,
            packed.buffer(),
            Some(diagonal == Diagonal::Unit),
        )?;
        let system = match &restaged {
            Some(target) => {
                pipeline.pad_copy_transpose(
                    &packed.view(),
                    &target.view(),
                    Direction::In,
                    system_transform,
                    WriteBack::FULL,
                )?;
                target
            }
            None => &packed,
        };
        pipeline.load(&b_staged, &ops.b, b_transform)?;

        routine.run_kernel(
            "TrsmSolve",
            vec![
                k.into(),
                cols.into(),
                lower.into(),
                alpha.to_scalar().into(),
                system.buffer().into(),
                k.into(),
                b_staged.buffer().into(),
                k.into(),
            ],
            vec![ceil(cols, trsm_dim)],
            vec![trsm_dim],
        )?;

        pipeline.stage_out(&b_staged, &ops.b, b_transform, WriteBack::FULL)?;
        Ok(routine.completion())
    }
}
