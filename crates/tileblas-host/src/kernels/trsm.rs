//! Column-wise triangular solve `M * X = alpha * B` by substitution.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{Launch, Region};
use crate::memory::host_memory;
use crate::queue::Job;
use tileblas::device::DeviceError;
use tileblas::Element;

pub(super) fn trsm_solve(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), prepare(launch))
}

#[derive(Debug, Clone, Copy)]
struct Solve<T> {
    k: usize,
    lower: bool,
    alpha: T,
    a_ld: usize,
}

impl<T: Element> Solve<T> {
    /// Solve one column of B in place.
    fn column(&self, a: &[T], x: &mut [T]) {
        let k = self.k;
        let at = |row: usize, col: usize| a[col * self.a_ld + row];
        if self.lower {
            for i in 0..k {
                let mut sum = self.alpha * x[i];
                for p in 0..i {
                    sum = sum - at(i, p) * x[p];
                }
                x[i] = sum / at(i, i);
            }
        } else {
            for i in (0..k).rev() {
                let mut sum = self.alpha * x[i];
                for p in i + 1..k {
                    sum = sum - at(i, p) * x[p];
                }
                x[i] = sum / at(i, i);
            }
        }
    }
}

fn prepare<T: Element>(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let dim = launch.constant("TRSM_DIM")?;
    let [groups] = launch.groups([dim])?;
    let mut reader = launch.reader();
    let k = reader.size()?;
    let cols = reader.size()?;
    let lower = reader.flag()?;
    let alpha = reader.scalar::<T>()?;
    let a = reader.buffer()?;
    let a_ld = reader.size()?;
    let b = reader.buffer()?;
    let b_ld = reader.size()?;

    let active = cols.min(groups * dim);
    Region::new(k, k, a_ld, 0).check::<T>(launch, "A", &a)?;
    Region::new(k, active, b_ld, 0).check::<T>(launch, "B", &b)?;
    if k == 0 || active == 0 {
        return Ok(Box::new(|| Ok(())));
    }

    let solve = Solve {
        k,
        lower,
        alpha,
        a_ld,
    };
    Ok(Box::new(move || {
        let a = host_memory(&a)?.to_elements::<T>();
        host_memory(&b)?.with_elements_mut::<T, _>(|b| {
            #[cfg(feature = "parallel")]
            b.par_chunks_mut(b_ld)
                .take(active)
                .for_each(|x| solve.column(&a, &mut x[..k]));

            #[cfg(not(feature = "parallel"))]
            b.chunks_mut(b_ld)
                .take(active)
                .for_each(|x| solve.column(&a, &mut x[..k]));
        });
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use approx::assert_relative_eq;
    use tileblas::device::KernelArg;
    use tileblas::source::{COMMON, TRSM_KERNELS};
    use tileblas::{Buffer, Complex32, Element, Precision};

    fn args<T: Element>(k: usize, cols: usize, lower: bool, alpha: T, a: &Buffer, b: &Buffer) -> Vec<KernelArg> {
        vec![
            k.into(),
            cols.into(),
            lower.into(),
            alpha.to_scalar().into(),
            a.into(),
            k.into(),
            b.into(),
            k.into(),
        ]
    }

    #[test]
    fn test_lower_forward_substitution() {
        let program = program(Precision::Double, &[("TRSM_DIM", 2)], &[COMMON, TRSM_KERNELS]);
        // M = [[2, 0], [1, 4]] column-major
        let a = buffer_with(&[2.0f64, 1.0, 0.0, 4.0]);
        // columns: M * [1, 1] = [2, 5], M * [2, -1] = [4, -2]
        let b = buffer_with(&[2.0f64, 5.0, 4.0, -2.0]);
        run(&program, "TrsmSolve", args(2, 2, true, 1.0f64, &a, &b), vec![2], vec![2]).unwrap();
        let x = contents::<f64>(&b);
        for (got, want) in x.iter().zip([1.0, 1.0, 2.0, -1.0]) {
            assert_relative_eq!(*got, want, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_upper_back_substitution_with_alpha() {
        let program = program(Precision::Double, &[("TRSM_DIM", 4)], &[COMMON, TRSM_KERNELS]);
        // M = [[1, 2], [0, 2]]; alpha * B = M * [3, 1] = [5, 2]
        let a = buffer_with(&[1.0f64, 0.0, 2.0, 2.0]);
        let b = buffer_with(&[2.5f64, 1.0]);
        run(&program, "TrsmSolve", args(2, 1, false, 2.0f64, &a, &b), vec![4], vec![4]).unwrap();
        let x = contents::<f64>(&b);
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(x[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_complex_division() {
        let program = program(Precision::ComplexSingle, &[("TRSM_DIM", 1)], &[COMMON, TRSM_KERNELS]);
        let a = buffer_with(&[Complex32::new(0.0, 2.0)]);
        let b = buffer_with(&[Complex32::new(4.0, 0.0)]);
        run(
            &program,
            "TrsmSolve",
            args(1, 1, true, Complex32::new(1.0, 0.0), &a, &b),
            vec![1],
            vec![1],
        )
        .unwrap();
        let x = contents::<Complex32>(&b)[0];
        assert_relative_eq!(x.re, 0.0, epsilon = 1e-6);
        assert_relative_eq!(x.im, -2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_singular_system_is_not_finite() {
        let program = program(Precision::Single, &[("TRSM_DIM", 1)], &[COMMON, TRSM_KERNELS]);
        let a = buffer_with(&[0.0f32]);
        let b = buffer_with(&[1.0f32]);
        run(&program, "TrsmSolve", args(1, 1, true, 1.0f32, &a, &b), vec![1], vec![1]).unwrap();
        assert!(!contents::<f32>(&b)[0].is_finite());
    }
}
