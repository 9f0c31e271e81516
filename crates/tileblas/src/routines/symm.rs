//! Symmetric and Hermitian matrix multiply.
//!
//! The stored triangle of A is expanded into a full `k x k` temporary, which
//! then takes part in a regular multiply:
//!
//! ```text
//! Left:  C = alpha * A * B + beta * C     (k = m)
//! Right: C = alpha * B * A + beta * C     (k = n)
//! ```

use super::gemm::{GemmOperands, GemmPlan};
use super::Routine;
use crate::descriptor::{MatrixArg, MatrixDescriptor};
use crate::device::{Buffer, KernelArg};
use crate::engine::Engine;
use crate::error::{BlasError, Operand, Result};
use crate::event::Event;
use crate::source::RoutineFamily;
use crate::types::{ComplexElement, Element, Layout, Side, Transpose, Triangle};
use tracing::debug_span;

impl Engine {
    /// `C = alpha * A * B + beta * C` (left) or `C = alpha * B * A + beta * C`
    /// (right) with A symmetric, only its `triangle` referenced.
    pub fn symm<T: Element>(
        &self,
        layout: Layout,
        side: Side,
        triangle: Triangle,
        m: usize,
        n: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
        beta: T,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span = debug_span!("symm", precision = %T::PRECISION, ?side, ?triangle, m, n).entered();
        self.multiply_squared(RoutineFamily::Symm, layout, side, triangle, m, n, alpha, a, b, beta, c)
    }

    /// As [`Engine::symm`] with A Hermitian: mirrored elements are conjugated
    /// and the imaginary part of the diagonal is ignored.
    pub fn hemm<T: ComplexElement>(
        &self,
        layout: Layout,
        side: Side,
        triangle: Triangle,
        m: usize,
        n: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
        beta: T,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span = debug_span!("hemm", precision = %T::PRECISION, ?side, ?triangle, m, n).entered();
        self.multiply_squared(RoutineFamily::Hemm, layout, side, triangle, m, n, alpha, a, b, beta, c)
    }

    fn multiply_squared<T: Element>(
        &self,
        family: RoutineFamily,
        layout: Layout,
        side: Side,
        triangle: Triangle,
        m: usize,
        n: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
        beta: T,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        if m == 0 || n == 0 {
            return Err(BlasError::InvalidDimension);
        }
        let element_size = T::PRECISION.element_size();
        let k = match side {
            Side::Left => m,
            Side::Right => n,
        };
        let a_desc = MatrixDescriptor::new(a, k, k, layout, false);
        a_desc.validate(Operand::A, element_size)?;
        MatrixDescriptor::new(b, m, n, layout, false).validate(Operand::B, element_size)?;
        MatrixDescriptor::new(c, m, n, layout, false).validate(Operand::C, element_size)?;

        let routine = self.routine(family, T::PRECISION)?;
        let temp = routine.allocate(k * k)?;
        let squared = MatrixArg::new(&temp, 0, k);
        let (first, second) = match side {
            Side::Left => (squared, b),
            Side::Right => (b, squared),
        };
        let ops = GemmOperands::new(
            layout,
            Transpose::No,
            Transpose::No,
            m,
            n,
            k,
            first,
            second,
            c,
            element_size,
        )?;
        let plan = GemmPlan::reserve(&routine, &ops)?;

        // row-major storage holds the transpose, so the stored triangle flips
        let upper = (triangle == Triangle::Upper) ^ (layout == Layout::RowMajor);
        let kernel = match (family, upper) {
            (RoutineFamily::Hemm, true) => "HermUpperToSquared",
            (RoutineFamily::Hemm, false) => "HermLowerToSquared",
            (_, true) => "SymmUpperToSquared",
            (_, false) => "SymmLowerToSquared",
        };
        expand_to_squared(&routine, kernel, &a_desc, k, &temp, None)?;
        plan.execute(&routine, alpha, beta)
    }
}

/// Launch a `*ToSquared` kernel writing a full `dim x dim` copy of the
/// triangle stored in `src` into `dst` (leading dimension `dim`). `unit`
/// carries the unit-diagonal flag of the triangular variants.
pub(crate) fn expand_to_squared(
    routine: &Routine<'_>,
    kernel: &str,
    src: &MatrixDescriptor<'_>,
    dim: usize,
    dst: &Buffer,
    unit: Option<bool>,
) -> Result<Event> {
    let (global, local) = routine.pad_geometry(dim)?;
    let mut args: Vec<KernelArg> = vec![
        dim.into(),
        src.ld.into(),
        src.offset.into(),
        src.buffer.into(),
        dim.into(),
        dim.into(),
        0usize.into(),
        dst.into(),
    ];
    if let Some(unit) = unit {
        args.push(unit.into());
    }
    routine.run_kernel(kernel, args, global, local)
}
