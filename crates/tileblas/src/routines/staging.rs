//! Shape adaptation between caller matrices and kernel-shaped temporaries.
//!
//! The multiply kernels only accept zero-offset, column-major operands whose
//! extents are multiples of the work-group tile. Caller matrices are staged
//! into such temporaries (padding with zeros, transposing and conjugating in
//! the same pass) and results are staged back, optionally restricted to one
//! triangle.
//!
//! Kernel choice per copy:
//!
//! | Kernel | Used when |
//! |--------|-----------|
//! | `CopyMatrix` | same shape and `ld`, zero offsets, no conjugate or mask, extents divide the Copy tiles |
//! | `TransposeMatrix` | as above, transposing, square, extents divide the Transpose tiles |
//! | `PadMatrix` / `UnPadMatrix` | any other non-transposing copy |
//! | `PadTransposeMatrix` / `UnPadTransposeMatrix` | any other transposing copy |
//!
//! A source that already has the target shape, zero offset, `ld == one` and
//! needs no transform is used in place ([`StagedMatrix::InPlace`]) unless the
//! engine is configured otherwise.

use super::{launch, required_param};
use crate::database::TuningParameters;
use crate::descriptor::MatrixDescriptor;
use crate::device::{Buffer, Device, KernelArg, Program};
use crate::error::{BlasError, Result};
use crate::event::{Event, EventChain};
use std::sync::Arc;
use tracing::debug;

/// Extents of a kernel-shaped temporary; its leading dimension is `one`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddedShape {
    pub one: usize,
    pub two: usize,
}

impl PaddedShape {
    /// `one` is the contiguous extent, `two` the strided one.
    pub fn new(one: usize, two: usize) -> Self {
        Self { one, two }
    }

    /// Leading dimension of the temporary, equal to `one`.
    pub fn ld(&self) -> usize {
        self.one
    }

    /// Number of elements the temporary holds.
    pub fn elements(&self) -> usize {
        self.one * self.two
    }
}

/// Raw storage view used by the copy kernels.
#[derive(Debug, Clone, Copy)]
pub struct MatrixView<'a> {
    pub buffer: &'a Buffer,
    pub offset: usize,
    pub ld: usize,
    pub one: usize,
    pub two: usize,
}

impl<'a> MatrixView<'a> {
    pub fn padded(buffer: &'a Buffer, shape: PaddedShape) -> Self {
        Self {
            buffer,
            offset: 0,
            ld: shape.ld(),
            one: shape.one,
            two: shape.two,
        }
    }
}

impl<'a> From<&MatrixDescriptor<'a>> for MatrixView<'a> {
    fn from(descriptor: &MatrixDescriptor<'a>) -> Self {
        Self {
            buffer: descriptor.buffer,
            offset: descriptor.offset,
            ld: descriptor.ld,
            one: descriptor.one(),
            two: descriptor.two(),
        }
    }
}

/// Temporary device memory owned by one routine invocation. The memory is
/// released when this value drops.
#[derive(Debug)]
pub struct PaddedBuffer {
    buffer: Buffer,
    shape: PaddedShape,
}

impl PaddedBuffer {
    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn shape(&self) -> PaddedShape {
        self.shape
    }

    pub fn view(&self) -> MatrixView<'_> {
        MatrixView::padded(&self.buffer, self.shape)
    }
}

/// An operand in kernel shape: either the caller's buffer or a temporary.
#[derive(Debug)]
pub enum StagedMatrix<'a> {
    InPlace(&'a Buffer),
    Padded(PaddedBuffer),
}

impl StagedMatrix<'_> {
    pub fn buffer(&self) -> &Buffer {
        match self {
            StagedMatrix::InPlace(buffer) => buffer,
            StagedMatrix::Padded(temp) => temp.buffer(),
        }
    }

    pub fn is_in_place(&self) -> bool {
        matches!(self, StagedMatrix::InPlace(_))
    }
}

/// Element transform applied while copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transform {
    pub transpose: bool,
    pub conjugate: bool,
}

impl Transform {
    pub const NONE: Transform = Transform {
        transpose: false,
        conjugate: false,
    };

    pub fn new(transpose: bool, conjugate: bool) -> Self {
        Self {
            transpose,
            conjugate,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.transpose && !self.conjugate
    }
}

/// Which elements of the result a write-back may touch, in logical
/// (row, column) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriangleRestriction {
    #[default]
    Full,
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteBack {
    pub restriction: TriangleRestriction,
    /// Clear the imaginary part of diagonal elements.
    pub zero_diagonal_imag: bool,
}

impl WriteBack {
    pub const FULL: WriteBack = WriteBack {
        restriction: TriangleRestriction::Full,
        zero_diagonal_imag: false,
    };

    pub fn triangle(restriction: TriangleRestriction) -> Self {
        Self {
            restriction,
            zero_diagonal_imag: false,
        }
    }

    pub fn with_zero_diagonal_imag(mut self) -> Self {
        self.zero_diagonal_imag = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Caller matrix into a temporary.
    In,
    /// Temporary back into the caller matrix.
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyKernel {
    Copy,
    Transpose,
    Pad,
    UnPad,
    PadTranspose,
    UnPadTranspose,
}

impl CopyKernel {
    pub fn name(self) -> &'static str {
        match self {
            CopyKernel::Copy => "CopyMatrix",
            CopyKernel::Transpose => "TransposeMatrix",
            CopyKernel::Pad => "PadMatrix",
            CopyKernel::UnPad => "UnPadMatrix",
            CopyKernel::PadTranspose => "PadTransposeMatrix",
            CopyKernel::UnPadTranspose => "UnPadTransposeMatrix",
        }
    }
}

/// Pick the copy kernel for one staging pass.
pub fn select_copy_kernel(
    src: &MatrixView<'_>,
    dst: &MatrixView<'_>,
    direction: Direction,
    transform: Transform,
    write_back: WriteBack,
    params: &TuningParameters,
) -> Result<CopyKernel> {
    let plain = src.offset == 0
        && dst.offset == 0
        && !transform.conjugate
        && src.one == dst.one
        && src.two == dst.two
        && src.ld == dst.ld
        && write_back == WriteBack::FULL;

    if transform.transpose {
        let dim = required_param(params, "TRA_DIM")?;
        let wpt = required_param(params, "TRA_WPT")?;
        let tile = dim * wpt;
        if plain
            && src.one == src.two
            && src.ld % wpt == 0
            && src.one % tile == 0
            && src.two % tile == 0
        {
            return Ok(CopyKernel::Transpose);
        }
        return Ok(match direction {
            Direction::In => CopyKernel::PadTranspose,
            Direction::Out => CopyKernel::UnPadTranspose,
        });
    }

    let vw = required_param(params, "COPY_VW")?;
    let dimx = required_param(params, "COPY_DIMX")?;
    let dimy = required_param(params, "COPY_DIMY")?;
    let wpt = required_param(params, "COPY_WPT")?;
    if plain && src.ld % vw == 0 && src.one % (vw * dimx) == 0 && src.two % (wpt * dimy) == 0 {
        return Ok(CopyKernel::Copy);
    }
    Ok(match direction {
        Direction::In => CopyKernel::Pad,
        Direction::Out => CopyKernel::UnPad,
    })
}

/// Global and local work sizes of a copy kernel writing `dst`.
pub fn copy_geometry(
    kernel: CopyKernel,
    dst: &MatrixView<'_>,
    params: &TuningParameters,
) -> Result<(Vec<usize>, Vec<usize>)> {
    use super::{ceil, ceil_div};

    Ok(match kernel {
        CopyKernel::Copy => {
            let vw = required_param(params, "COPY_VW")?;
            let wpt = required_param(params, "COPY_WPT")?;
            (
                vec![dst.one / vw, dst.two / wpt],
                vec![
                    required_param(params, "COPY_DIMX")?,
                    required_param(params, "COPY_DIMY")?,
                ],
            )
        }
        CopyKernel::Transpose => {
            let dim = required_param(params, "TRA_DIM")?;
            let wpt = required_param(params, "TRA_WPT")?;
            (vec![dst.one / wpt, dst.two / wpt], vec![dim, dim])
        }
        CopyKernel::Pad | CopyKernel::UnPad => {
            let dimx = required_param(params, "PAD_DIMX")?;
            let dimy = required_param(params, "PAD_DIMY")?;
            let wptx = required_param(params, "PAD_WPTX")?;
            let wpty = required_param(params, "PAD_WPTY")?;
            (
                vec![
                    ceil(ceil_div(dst.one, wptx), dimx),
                    ceil(ceil_div(dst.two, wpty), dimy),
                ],
                vec![dimx, dimy],
            )
        }
        CopyKernel::PadTranspose | CopyKernel::UnPadTranspose => {
            let tile = required_param(params, "PADTRA_TILE")?;
            let wpt = required_param(params, "PADTRA_WPT")?;
            (
                vec![
                    ceil(ceil_div(dst.one, wpt), tile),
                    ceil(ceil_div(dst.two, wpt), tile),
                ],
                vec![tile, tile],
            )
        }
    })
}

fn copy_args(
    kernel: CopyKernel,
    src: &MatrixView<'_>,
    dst: &MatrixView<'_>,
    transform: Transform,
    write_back: WriteBack,
) -> Vec<KernelArg> {
    if matches!(kernel, CopyKernel::Copy | CopyKernel::Transpose) {
        return vec![src.ld.into(), src.buffer.into(), dst.buffer.into()];
    }
    let mut args: Vec<KernelArg> = vec![
        src.one.into(),
        src.two.into(),
        src.ld.into(),
        src.offset.into(),
        src.buffer.into(),
        dst.one.into(),
        dst.two.into(),
        dst.ld.into(),
        dst.offset.into(),
        dst.buffer.into(),
        transform.conjugate.into(),
    ];
    if matches!(kernel, CopyKernel::UnPad | CopyKernel::UnPadTranspose) {
        args.push((write_back.restriction == TriangleRestriction::Upper).into());
        args.push((write_back.restriction == TriangleRestriction::Lower).into());
        args.push(write_back.zero_diagonal_imag.into());
    }
    args
}

/// Stages operands for one routine invocation.
pub struct ShapePipeline<'r> {
    device: &'r dyn Device,
    program: &'r Arc<dyn Program>,
    params: &'r TuningParameters,
    element_size: usize,
    skip_copy: bool,
    chain: Arc<EventChain>,
}

impl<'r> ShapePipeline<'r> {
    pub fn new(
        device: &'r dyn Device,
        program: &'r Arc<dyn Program>,
        params: &'r TuningParameters,
        element_size: usize,
    ) -> Self {
        Self {
            device,
            program,
            params,
            element_size,
            skip_copy: true,
            chain: Arc::new(EventChain::new()),
        }
    }

    /// Use an operand in place when it already has kernel shape. On by
    /// default.
    pub fn with_skip_copy(mut self, skip_copy: bool) -> Self {
        self.skip_copy = skip_copy;
        self
    }

    /// Enqueue every copy pass behind the commands of `chain`.
    pub fn with_chain(mut self, chain: Arc<EventChain>) -> Self {
        self.chain = chain;
        self
    }

    /// Whether `src` can be handed to a kernel expecting `shape` as is.
    pub fn can_skip(&self, src: &MatrixDescriptor<'_>, shape: PaddedShape, transform: Transform) -> bool {
        self.skip_copy
            && transform.is_identity()
            && src.offset == 0
            && src.one() == shape.one
            && src.two() == shape.two
            && src.ld == shape.ld()
    }

    /// Allocate an uninitialized temporary of `shape`.
    pub fn allocate(&self, shape: PaddedShape) -> Result<PaddedBuffer> {
        let bytes = shape.elements() * self.element_size;
        let buffer = self.device.allocate(bytes).map_err(|err| {
            BlasError::TempBufferAllocFailure(format!(
                "{}x{} temporary ({} bytes): {}",
                shape.one, shape.two, bytes, err
            ))
        })?;
        Ok(PaddedBuffer { buffer, shape })
    }

    /// Decide where `src` will live in kernel shape, allocating a temporary
    /// when it cannot be used in place. Nothing is enqueued.
    pub fn reserve<'a>(
        &self,
        src: &MatrixDescriptor<'a>,
        shape: PaddedShape,
        transform: Transform,
    ) -> Result<StagedMatrix<'a>> {
        if self.can_skip(src, shape, transform) {
            debug!(one = shape.one, two = shape.two, "operand used in place");
            return Ok(StagedMatrix::InPlace(src.buffer));
        }
        self.allocate(shape).map(StagedMatrix::Padded)
    }

    /// Fill a reserved operand from `src`; in-place operands need no work.
    pub fn load(
        &self,
        staged: &StagedMatrix<'_>,
        src: &MatrixDescriptor<'_>,
        transform: Transform,
    ) -> Result<Option<Event>> {
        match staged {
            StagedMatrix::InPlace(_) => Ok(None),
            StagedMatrix::Padded(temp) => self
                .pad_copy_transpose(
                    &MatrixView::from(src),
                    &temp.view(),
                    Direction::In,
                    transform,
                    WriteBack::FULL,
                )
                .map(Some),
        }
    }

    /// Bring `src` into kernel shape.
    pub fn stage_in<'a>(
        &self,
        src: &MatrixDescriptor<'a>,
        shape: PaddedShape,
        transform: Transform,
    ) -> Result<StagedMatrix<'a>> {
        let staged = self.reserve(src, shape, transform)?;
        self.load(&staged, src, transform)?;
        Ok(staged)
    }

    /// Bring `src` into a temporary, never using it in place.
    pub fn stage_in_copy(
        &self,
        src: &MatrixDescriptor<'_>,
        shape: PaddedShape,
        transform: Transform,
    ) -> Result<PaddedBuffer> {
        let temp = self.allocate(shape)?;
        self.pad_copy_transpose(
            &MatrixView::from(src),
            &temp.view(),
            Direction::In,
            transform,
            WriteBack::FULL,
        )?;
        Ok(temp)
    }

    /// Write a staged result back into `dst`. Returns `None` when the kernel
    /// already wrote the caller's buffer.
    pub fn stage_out(
        &self,
        staged: &StagedMatrix<'_>,
        dst: &MatrixDescriptor<'_>,
        transform: Transform,
        write_back: WriteBack,
    ) -> Result<Option<Event>> {
        match staged {
            StagedMatrix::InPlace(_) => Ok(None),
            StagedMatrix::Padded(temp) => self
                .pad_copy_transpose(
                    &temp.view(),
                    &MatrixView::from(dst),
                    Direction::Out,
                    transform,
                    write_back,
                )
                .map(Some),
        }
    }

    /// Enqueue one copy pass from `src` to `dst`.
    pub fn pad_copy_transpose(
        &self,
        src: &MatrixView<'_>,
        dst: &MatrixView<'_>,
        direction: Direction,
        transform: Transform,
        write_back: WriteBack,
    ) -> Result<Event> {
        let kernel = select_copy_kernel(src, dst, direction, transform, write_back, self.params)?;
        let (global, local) = copy_geometry(kernel, dst, self.params)?;
        let args = copy_args(kernel, src, dst, transform, write_back);
        launch(
            self.device,
            self.program,
            &self.chain,
            kernel.name(),
            args,
            global,
            local,
        )
    }
}
