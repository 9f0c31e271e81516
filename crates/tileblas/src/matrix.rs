//! Host/device transfer helpers for matrices.

use crate::descriptor::MatrixArg;
use crate::device::{Buffer, Device};
use crate::error::{BlasError, Result};
use crate::types::{Element, Layout};
use std::marker::PhantomData;

/// Copy host elements into a freshly allocated device buffer.
pub fn upload<T: Element>(device: &dyn Device, data: &[T]) -> Result<Buffer> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let buffer = device.allocate(bytes.len())?;
    device.write_buffer(&buffer, 0, bytes)?;
    Ok(buffer)
}

/// Read `len` elements starting at element `offset` of a device buffer.
pub fn download<T: Element>(
    device: &dyn Device,
    buffer: &Buffer,
    offset: usize,
    len: usize,
) -> Result<Vec<T>> {
    let mut out = vec![T::zero(); len];
    device.read_buffer(
        buffer,
        offset * std::mem::size_of::<T>(),
        bytemuck::cast_slice_mut(&mut out),
    )?;
    Ok(out)
}

/// A dense matrix stored on a device with a tight leading dimension.
///
/// Column-major matrices have `ld == rows`, row-major ones `ld == cols`.
pub struct DeviceMatrix<T: Element> {
    buffer: Buffer,
    rows: usize,
    cols: usize,
    layout: Layout,
    _marker: PhantomData<T>,
}

impl<T: Element> DeviceMatrix<T> {
    /// Upload host data already stored in `layout` order.
    pub fn from_host(
        device: &dyn Device,
        data: &[T],
        rows: usize,
        cols: usize,
        layout: Layout,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 || data.len() != rows * cols {
            return Err(BlasError::InvalidDimension);
        }
        Ok(Self {
            buffer: upload(device, data)?,
            rows,
            cols,
            layout,
            _marker: PhantomData,
        })
    }

    /// Allocate a zero-filled matrix.
    pub fn zeros(device: &dyn Device, rows: usize, cols: usize, layout: Layout) -> Result<Self> {
        let data = vec![T::zero(); rows * cols];
        Self::from_host(device, &data, rows, cols, layout)
    }

    /// Copy the matrix back to the host in its own layout.
    pub fn to_host(&self, device: &dyn Device) -> Result<Vec<T>> {
        download(device, &self.buffer, 0, self.rows * self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn ld(&self) -> usize {
        match self.layout {
            Layout::ColMajor => self.rows,
            Layout::RowMajor => self.cols,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    /// The `(buffer, 0, ld)` argument routines take for this matrix.
    pub fn as_arg(&self) -> MatrixArg<'_> {
        MatrixArg::new(&self.buffer, 0, self.ld())
    }
}

impl<T: Element> std::fmt::Debug for DeviceMatrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMatrix")
            .field("precision", &T::PRECISION)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("layout", &self.layout)
            .finish()
    }
}
