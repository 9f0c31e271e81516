//! Shared helpers for the routine tests: an engine with small tiles so that
//! padding and multi-tile launches show up at tiny sizes, host matrices in
//! logical order, and naive references.

#![allow(dead_code)]

use approx::relative_eq;
use std::sync::Arc;
use tileblas::database::{
    DeviceSelector, TuningEntry, COPY, PAD, PAD_TRANSPOSE, TRANSPOSE, TRSM, XGEMM,
};
use tileblas::{
    Buffer, Complex32, Complex64, Element, Engine, EngineConfig, Layout, Precision, Transpose,
    Triangle, TuningDatabase, TuningParameters,
};
use tileblas_host::HostDevice;

/// Global defaults with 4x4x4 multiply tiles and 2x2 copy tiles.
pub fn small_tiles() -> Arc<TuningDatabase> {
    let tables: [(&str, &[(&str, usize)]); 6] = [
        (COPY, &[("COPY_DIMX", 2), ("COPY_DIMY", 2), ("COPY_WPT", 1), ("COPY_VW", 1)]),
        (PAD, &[("PAD_DIMX", 2), ("PAD_DIMY", 2), ("PAD_WPTX", 1), ("PAD_WPTY", 1)]),
        (TRANSPOSE, &[("TRA_DIM", 2), ("TRA_WPT", 1), ("TRA_PAD", 0), ("TRA_SHUFFLE", 0)]),
        (PAD_TRANSPOSE, &[("PADTRA_TILE", 2), ("PADTRA_WPT", 1), ("PADTRA_PAD", 0)]),
        (
            XGEMM,
            &[
                ("MWG", 4),
                ("NWG", 4),
                ("KWG", 4),
                ("MDIMC", 2),
                ("NDIMC", 2),
                ("MDIMA", 2),
                ("NDIMB", 2),
                ("KWI", 1),
                ("VWM", 1),
                ("VWN", 1),
                ("STRM", 0),
                ("STRN", 0),
                ("SA", 0),
                ("SB", 0),
            ],
        ),
        (TRSM, &[("TRSM_DIM", 2)]),
    ];

    let mut overrides = Vec::new();
    for (routine, pairs) in tables {
        for precision in Precision::ALL {
            overrides.push(TuningEntry {
                routine: routine.to_string(),
                precision,
                selector: DeviceSelector::global_default(),
                parameters: TuningParameters::from_pairs(pairs.iter().copied()),
            });
        }
    }
    Arc::new(
        TuningDatabase::builtin()
            .with_overrides(overrides)
            .expect("small tile overrides are well formed"),
    )
}

/// A fresh host device and an engine with small tiles on it.
pub fn engine() -> (Arc<HostDevice>, Engine) {
    engine_with(EngineConfig::default())
}

pub fn engine_with(config: EngineConfig) -> (Arc<HostDevice>, Engine) {
    let device = Arc::new(HostDevice::new());
    let engine = Engine::new(device.clone())
        .with_database(small_tiles())
        .with_config(config);
    (device, engine)
}

pub fn upload<T: Element>(engine: &Engine, data: &[T]) -> Buffer {
    tileblas::upload(engine.device(), data).expect("upload")
}

pub fn download<T: Element>(engine: &Engine, buffer: &Buffer) -> Vec<T> {
    let elements = buffer.size() / T::PRECISION.element_size();
    tileblas::download(engine.device(), buffer, 0, elements).expect("download")
}

/// Element types the tests generate and compare.
pub trait TestElement: Element {
    fn from_parts(re: f64, im: f64) -> Self;
    fn to_c64(self) -> Complex64;
    fn tolerance() -> f64;
}

impl TestElement for f32 {
    fn from_parts(re: f64, _im: f64) -> Self {
        re as f32
    }
    fn to_c64(self) -> Complex64 {
        Complex64::new(self as f64, 0.0)
    }
    fn tolerance() -> f64 {
        1e-4
    }
}

impl TestElement for f64 {
    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }
    fn to_c64(self) -> Complex64 {
        Complex64::new(self, 0.0)
    }
    fn tolerance() -> f64 {
        1e-10
    }
}

impl TestElement for Complex32 {
    fn from_parts(re: f64, im: f64) -> Self {
        Complex32::new(re as f32, im as f32)
    }
    fn to_c64(self) -> Complex64 {
        Complex64::new(self.re as f64, self.im as f64)
    }
    fn tolerance() -> f64 {
        1e-4
    }
}

impl TestElement for Complex64 {
    fn from_parts(re: f64, im: f64) -> Self {
        Complex64::new(re, im)
    }
    fn to_c64(self) -> Complex64 {
        self
    }
    fn tolerance() -> f64 {
        1e-10
    }
}

/// Small deterministic values, distinct per `(seed, index)`.
pub fn value<T: TestElement>(seed: usize, index: usize) -> T {
    let re = ((seed * 31 + index * 17) % 13) as f64 / 4.0 - 1.5;
    let im = ((seed * 7 + index * 11) % 9) as f64 / 4.0 - 1.0;
    T::from_parts(re, im)
}

/// Element-wise comparison of real and imaginary parts, with an absolute
/// floor that grows with the magnitude of the expected value.
pub fn assert_close<T: TestElement>(got: &[T], want: &[T]) {
    assert_eq!(got.len(), want.len(), "length mismatch");
    for (index, (g, w)) in got.iter().zip(want).enumerate() {
        let (g, w) = (g.to_c64(), w.to_c64());
        let epsilon = T::tolerance() * (1.0 + w.norm());
        let close = |got: f64, want: f64| {
            relative_eq!(got, want, epsilon = epsilon, max_relative = T::tolerance())
        };
        assert!(
            close(g.re, w.re) && close(g.im, w.im),
            "element {}: got {}, want {}",
            index,
            g,
            w
        );
    }
}

/// A matrix in logical `(row, col)` order, independent of storage layout.
#[derive(Debug, Clone, PartialEq)]
pub struct HostMatrix<T> {
    pub rows: usize,
    pub cols: usize,
    data: Vec<T>,
}

impl<T: TestElement> HostMatrix<T> {
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for col in 0..cols {
            for row in 0..rows {
                data.push(f(row, col));
            }
        }
        Self { rows, cols, data }
    }

    pub fn random(rows: usize, cols: usize, seed: usize) -> Self {
        Self::from_fn(rows, cols, |row, col| value(seed, row + col * rows))
    }

    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[col * self.rows + row]
    }

    /// Offset of `(row, col)` in storage with the given layout and `ld`.
    pub fn index(layout: Layout, ld: usize, offset: usize, row: usize, col: usize) -> usize {
        match layout {
            Layout::ColMajor => offset + col * ld + row,
            Layout::RowMajor => offset + row * ld + col,
        }
    }

    /// Storage of this matrix; elements outside it (the offset prefix and
    /// the `ld` gaps) hold `fill`.
    pub fn store(&self, layout: Layout, ld: usize, offset: usize, fill: T) -> Vec<T> {
        let two = match layout {
            Layout::ColMajor => self.cols,
            Layout::RowMajor => self.rows,
        };
        let mut out = vec![fill; offset + ld * two];
        for col in 0..self.cols {
            for row in 0..self.rows {
                out[Self::index(layout, ld, offset, row, col)] = self.get(row, col);
            }
        }
        out
    }

    pub fn load(buffer: &[T], rows: usize, cols: usize, layout: Layout, ld: usize, offset: usize) -> Self {
        Self::from_fn(rows, cols, |row, col| buffer[Self::index(layout, ld, offset, row, col)])
    }

    pub fn op(&self, transpose: Transpose) -> Self {
        match transpose {
            Transpose::No => self.clone(),
            Transpose::Yes => Self::from_fn(self.cols, self.rows, |row, col| self.get(col, row)),
            Transpose::Conjugate => {
                Self::from_fn(self.cols, self.rows, |row, col| self.get(col, row).conj())
            }
        }
    }

    pub fn matmul(&self, other: &Self) -> Self {
        assert_eq!(self.cols, other.rows);
        Self::from_fn(self.rows, other.cols, |row, col| {
            let mut acc = T::zero();
            for p in 0..self.cols {
                acc = acc + self.get(row, p) * other.get(p, col);
            }
            acc
        })
    }

    /// `alpha * self + beta * other`
    pub fn axpby(&self, alpha: T, beta: T, other: &Self) -> Self {
        Self::from_fn(self.rows, self.cols, |row, col| {
            alpha * self.get(row, col) + beta * other.get(row, col)
        })
    }

    /// Keep `triangle` (diagonal included) of `self`, the rest from `other`.
    pub fn merge_triangle(&self, triangle: Triangle, other: &Self) -> Self {
        Self::from_fn(self.rows, self.cols, |row, col| {
            let inside = match triangle {
                Triangle::Upper => row <= col,
                Triangle::Lower => row >= col,
            };
            if inside {
                self.get(row, col)
            } else {
                other.get(row, col)
            }
        })
    }

    pub fn values(&self) -> &[T] {
        &self.data
    }
}

/// The full matrix a stored triangle stands for.
pub fn expand_symmetric<T: TestElement>(
    stored: &HostMatrix<T>,
    triangle: Triangle,
    hermitian: bool,
) -> HostMatrix<T> {
    HostMatrix::from_fn(stored.rows, stored.cols, |row, col| {
        let inside = match triangle {
            Triangle::Upper => row <= col,
            Triangle::Lower => row >= col,
        };
        let value = if inside {
            stored.get(row, col)
        } else if hermitian {
            stored.get(col, row).conj()
        } else {
            stored.get(col, row)
        };
        if hermitian && row == col {
            value.real_only()
        } else {
            value
        }
    })
}

/// The triangular matrix a stored triangle stands for.
pub fn expand_triangular<T: TestElement>(
    stored: &HostMatrix<T>,
    triangle: Triangle,
    unit: bool,
) -> HostMatrix<T> {
    HostMatrix::from_fn(stored.rows, stored.cols, |row, col| {
        let inside = match triangle {
            Triangle::Upper => row <= col,
            Triangle::Lower => row >= col,
        };
        if row == col && unit {
            T::one()
        } else if inside {
            stored.get(row, col)
        } else {
            T::zero()
        }
    })
}

/// A well-conditioned triangular operand: a strong diagonal and small
/// off-diagonal values.
pub fn diagonally_dominant<T: TestElement>(n: usize, seed: usize) -> HostMatrix<T> {
    HostMatrix::from_fn(n, n, |row, col| {
        if row == col {
            T::from_parts(4.0 + row as f64, 0.5)
        } else {
            let v: T = value(seed, row + col * n);
            v * T::from_parts(0.25, 0.0)
        }
    })
}
