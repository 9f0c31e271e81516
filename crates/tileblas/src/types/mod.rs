//! Element types and routine options.
//!
//! Every routine is generic over the element type, which fixes the numeric
//! precision of the compiled program:
//!
//! | Element | [`Precision`] | `PRECISION` define | Bytes |
//! |---------|---------------|--------------------|-------|
//! | `f32` | `Single` | 32 | 4 |
//! | `f64` | `Double` | 64 | 8 |
//! | [`Complex32`] | `ComplexSingle` | 3232 | 8 |
//! | [`Complex64`] | `ComplexDouble` | 6464 | 16 |
//!
//! Hermitian routines (`hemm`, `herk`, `her2k`) are only available for the
//! complex types through the [`ComplexElement`] bound.
//!
//! # Options
//!
//! The option enums follow the usual BLAS conventions:
//!
//! - [`Layout`]: row-major or column-major storage of every operand
//! - [`Transpose`]: `No`, `Yes` or `Conjugate` (conjugate transpose)
//! - [`Triangle`]: which triangle of a symmetric/triangular matrix is stored
//! - [`Side`]: whether the special matrix multiplies from the left or right
//! - [`Diagonal`]: whether a triangular matrix has an implicit unit diagonal
//!
//! # Example
//!
//! ```rust
//! use tileblas::types::{Element, Precision};
//! use num_complex::Complex32;
//!
//! assert_eq!(<f64 as Element>::PRECISION, Precision::Double);
//! assert_eq!(Complex32::new(1.0, 2.0).conj(), Complex32::new(1.0, -2.0));
//! assert_eq!(Precision::ComplexSingle.element_size(), 8);
//! ```

mod element;
mod options;

pub use element::{ComplexElement, Element, Precision, Scalar};
pub use num_complex::{Complex32, Complex64};
pub use options::{is_rotated, Diagonal, Layout, Side, Transpose, Triangle};
