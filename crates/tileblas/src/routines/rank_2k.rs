//! Symmetric and Hermitian rank-2k updates.
//!
//! ```text
//! syr2k: C = alpha * op(A) * op(B)^T + alpha       * op(B) * op(A)^T + beta * C
//! her2k: C = alpha * op(A) * op(B)^H + conj(alpha) * op(B) * op(A)^H + beta * C
//! ```
//!
//! Two launches of the triangle-restricted kernel into the same copy of C;
//! the second swaps the operands and accumulates with `beta = 1`.

use super::rank_k::{rank_operand, result_operand, run_rank_update, RankPass};
use crate::descriptor::MatrixArg;
use crate::engine::Engine;
use crate::error::{BlasError, Operand, Result};
use crate::event::Event;
use crate::source::RoutineFamily;
use crate::types::{ComplexElement, Element, Layout, Transpose, Triangle};
use tracing::debug_span;

impl Engine {
    /// Symmetric rank-2k update. `Transpose::Conjugate` acts as `Yes`.
    pub fn syr2k<T: Element>(
        &self,
        layout: Layout,
        triangle: Triangle,
        ab_transpose: Transpose,
        n: usize,
        k: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
        beta: T,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span = debug_span!("syr2k", precision = %T::PRECISION, ?triangle, n, k).entered();
        if n == 0 || k == 0 {
            return Err(BlasError::InvalidDimension);
        }
        let element_size = T::PRECISION.element_size();
        let a = rank_operand(a, layout, ab_transpose, n, k, Operand::A, element_size)?;
        let b = rank_operand(b, layout, ab_transpose, n, k, Operand::B, element_size)?;
        let c = result_operand(c, layout, n, element_size)?;

        let routine = self.routine(RoutineFamily::Syr2k, T::PRECISION)?;
        let passes = [
            RankPass {
                x: &a,
                x_conjugate: false,
                y: &b,
                y_conjugate: false,
                alpha,
                beta,
            },
            RankPass {
                x: &b,
                x_conjugate: false,
                y: &a,
                y_conjugate: false,
                alpha,
                beta: T::one(),
            },
        ];
        run_rank_update(&routine, triangle, n, k, &c, &passes, false)
    }

    /// Hermitian rank-2k update with a real `beta`. `Transpose::Yes` acts as
    /// `Conjugate`; the imaginary parts of C's diagonal are cleared.
    pub fn her2k<T: ComplexElement>(
        &self,
        layout: Layout,
        triangle: Triangle,
        ab_transpose: Transpose,
        n: usize,
        k: usize,
        alpha: T,
        a: MatrixArg<'_>,
        b: MatrixArg<'_>,
        beta: T::Real,
        c: MatrixArg<'_>,
    ) -> Result<Event> {
        let _span = debug_span!("her2k", precision = %T::PRECISION, ?triangle, n, k).entered();
        if n == 0 || k == 0 {
            return Err(BlasError::InvalidDimension);
        }
        let element_size = T::PRECISION.element_size();
        let a = rank_operand(a, layout, ab_transpose, n, k, Operand::A, element_size)?;
        let b = rank_operand(b, layout, ab_transpose, n, k, Operand::B, element_size)?;
        let c = result_operand(c, layout, n, element_size)?;

        let routine = self.routine(RoutineFamily::Her2k, T::PRECISION)?;
        let transposed = ab_transpose.is_transposed();
        let passes = [
            RankPass {
                x: &a,
                x_conjugate: transposed,
                y: &b,
                y_conjugate: !transposed,
                alpha,
                beta: T::from_real(beta),
            },
            RankPass {
                x: &b,
                x_conjugate: transposed,
                y: &a,
                y_conjugate: !transposed,
                alpha: alpha.conj(),
                beta: T::one(),
            },
        ];
        run_rank_update(&routine, triangle, n, k, &c, &passes, true)
    }
}
