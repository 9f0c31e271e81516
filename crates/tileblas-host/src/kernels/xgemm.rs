//! The tiled matrix multiply on padded, column-major operands:
//!
//! ```text
//! C[m + n*M] = alpha * sum_k A[m + k*M] * B[n + k*N] + beta * C[m + n*M]
//! ```
//!
//! Work-group `(gm, gn)` owns the `MWG x NWG` tile of C starting at
//! `(gm*MWG, gn*NWG)`. The square variants skip whole tiles outside the
//! requested triangle, so elements of those tiles are left as they were.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{Launch, Region};
use crate::memory::host_memory;
use crate::queue::Job;
use tileblas::device::DeviceError;
use tileblas::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tiles {
    All,
    Upper,
    Lower,
}

pub(super) fn xgemm(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), prepare(launch, Tiles::All))
}

pub(super) fn xgemm_upper(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), prepare(launch, Tiles::Upper))
}

pub(super) fn xgemm_lower(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), prepare(launch, Tiles::Lower))
}

/// Everything one column of C needs.
#[derive(Debug, Clone, Copy)]
struct Multiply<T> {
    m: usize,
    n: usize,
    k: usize,
    rows: usize,
    mwg: usize,
    nwg: usize,
    tiles: Tiles,
    alpha: T,
    beta: T,
}

impl<T: Element> Multiply<T> {
    #[inline]
    fn tile_active(&self, group_m: usize, group_n: usize) -> bool {
        match self.tiles {
            Tiles::All => true,
            Tiles::Upper => group_m * self.mwg <= group_n * self.nwg + self.nwg - 1,
            Tiles::Lower => group_m * self.mwg + self.mwg - 1 >= group_n * self.nwg,
        }
    }

    fn column(&self, n: usize, c: &mut [T], a: &[T], b: &[T]) {
        let group_n = n / self.nwg;
        for m in 0..self.rows {
            if !self.tile_active(m / self.mwg, group_n) {
                continue;
            }
            let mut acc = T::zero();
            for p in 0..self.k {
                acc = acc + a[p * self.m + m] * b[p * self.n + n];
            }
            c[m] = self.alpha * acc + self.beta * c[m];
        }
    }
}

fn prepare<T: Element>(launch: &Launch<'_>, tiles: Tiles) -> Result<Job, DeviceError> {
    let mwg = launch.constant("MWG")?;
    let nwg = launch.constant("NWG")?;
    let kwg = launch.constant("KWG")?;
    let [groups_m, groups_n] =
        launch.groups([launch.constant("MDIMC")?, launch.constant("NDIMC")?])?;

    let mut reader = launch.reader();
    let (m, n) = match tiles {
        Tiles::All => (reader.size()?, reader.size()?),
        Tiles::Upper | Tiles::Lower => {
            let n = reader.size()?;
            (n, n)
        }
    };
    let k = reader.size()?;
    let alpha = reader.scalar::<T>()?;
    let beta = reader.scalar::<T>()?;
    let a = reader.buffer()?;
    let b = reader.buffer()?;
    let c = reader.buffer()?;

    if m % mwg != 0 || n % nwg != 0 || k % kwg != 0 {
        return Err(launch.invalid(format!(
            "sizes {}x{}x{} are not multiples of the {}x{}x{} tile",
            m, n, k, mwg, nwg, kwg
        )));
    }
    let (rows, cols) = (groups_m * mwg, groups_n * nwg);
    if rows > m || cols > n {
        return Err(DeviceError::InvalidLaunch(format!(
            "{} work-groups cover {}x{} of a {}x{} result",
            launch.kernel, rows, cols, m, n
        )));
    }
    Region::new(m, k, m, 0).check::<T>(launch, "A", &a)?;
    Region::new(n, k, n, 0).check::<T>(launch, "B", &b)?;
    Region::new(m, n, m, 0).check::<T>(launch, "C", &c)?;

    let task = Multiply {
        m,
        n,
        k,
        rows,
        mwg,
        nwg,
        tiles,
        alpha,
        beta,
    };
    if rows == 0 || cols == 0 {
        return Ok(Box::new(|| Ok(())));
    }

    Ok(Box::new(move || {
        let a = host_memory(&a)?.to_elements::<T>();
        let b = host_memory(&b)?.to_elements::<T>();
        host_memory(&c)?.with_elements_mut::<T, _>(|c| {
            let c = &mut c[..m * cols];

            #[cfg(feature = "parallel")]
            c.par_chunks_mut(m)
                .enumerate()
                .for_each(|(n, column)| task.column(n, column, &a, &b));

            #[cfg(not(feature = "parallel"))]
            c.chunks_mut(m)
                .enumerate()
                .for_each(|(n, column)| task.column(n, column, &a, &b));
        });
        Ok(())
    }))
}
