//! Logical matrix views over raw device buffers, and their validation.
//!
//! A matrix of `rows × cols` (after its transpose flag is applied) is stored
//! with a contiguous extent `one` and a strided extent `two`:
//!
//! ```text
//! element(i_one, i_two) = buffer[offset + i_two * ld + i_one]
//!
//! rotated = (ColMajor && transposed) || (RowMajor && !transposed)
//! one     = if rotated { cols } else { rows }
//! two     = if rotated { rows } else { cols }
//! ```
//!
//! Validation requires `ld >= one` and
//! `(ld * (two - 1) + one + offset) * element_size <= buffer bytes`.

use crate::device::Buffer;
use crate::error::{BlasError, Operand, Result};
use crate::types::{is_rotated, Layout};

/// The `(buffer, offset, leading dimension)` triple a caller passes per operand.
#[derive(Debug, Clone, Copy)]
pub struct MatrixArg<'a> {
    pub buffer: &'a Buffer,
    pub offset: usize,
    pub ld: usize,
}

impl<'a> MatrixArg<'a> {
    pub fn new(buffer: &'a Buffer, offset: usize, ld: usize) -> Self {
        Self { buffer, offset, ld }
    }
}

/// A caller matrix with its logical shape, layout and transpose flag.
#[derive(Debug, Clone, Copy)]
pub struct MatrixDescriptor<'a> {
    pub buffer: &'a Buffer,
    pub offset: usize,
    pub ld: usize,
    pub rows: usize,
    pub cols: usize,
    pub transposed: bool,
    pub layout: Layout,
}

impl<'a> MatrixDescriptor<'a> {
    pub fn new(
        arg: MatrixArg<'a>,
        rows: usize,
        cols: usize,
        layout: Layout,
        transposed: bool,
    ) -> Self {
        Self {
            buffer: arg.buffer,
            offset: arg.offset,
            ld: arg.ld,
            rows,
            cols,
            transposed,
            layout,
        }
    }

    pub fn rotated(&self) -> bool {
        is_rotated(self.layout, self.transposed)
    }

    /// Contiguous extent.
    pub fn one(&self) -> usize {
        if self.rotated() {
            self.cols
        } else {
            self.rows
        }
    }

    /// Strided extent.
    pub fn two(&self) -> usize {
        if self.rotated() {
            self.rows
        } else {
            self.cols
        }
    }

    /// Number of elements from the start of the buffer to one past the last
    /// element of the matrix; `None` on overflow.
    pub fn required_elements(&self) -> Option<usize> {
        self.ld
            .checked_mul(self.two().checked_sub(1)?)?
            .checked_add(self.one())?
            .checked_add(self.offset)
    }

    /// Check this matrix against its buffer. See [`validate`].
    pub fn validate(&self, operand: Operand, element_size: usize) -> Result<()> {
        validate(self, operand, element_size)
    }
}

/// Pre-flight check of one operand, in this order: zero extents, null or
/// empty buffer, leading dimension, buffer size.
pub fn validate(
    descriptor: &MatrixDescriptor<'_>,
    operand: Operand,
    element_size: usize,
) -> Result<()> {
    if descriptor.rows == 0 || descriptor.cols == 0 {
        return Err(BlasError::InvalidDimension);
    }
    if descriptor.buffer.is_null() || descriptor.buffer.size() == 0 {
        return Err(BlasError::InvalidBufferHandle(operand));
    }

    let minimum = descriptor.one();
    if descriptor.ld < minimum {
        return Err(BlasError::InvalidLeadingDimension {
            operand,
            ld: descriptor.ld,
            minimum,
        });
    }

    let available = descriptor.buffer.size();
    let required = descriptor
        .required_elements()
        .and_then(|elements| elements.checked_mul(element_size))
        .unwrap_or(usize::MAX);
    if required > available {
        return Err(BlasError::InvalidMatrixSize {
            operand,
            required,
            available,
        });
    }
    Ok(())
}
