//! Native executions of the kernel entry points.
//!
//! Every `__kernel` the engine's programs declare has a host counterpart
//! registered here. A launch is turned into a [`Job`] at enqueue time: the
//! argument list is checked against the kernel's signature, the touched
//! regions of every buffer are bounds-checked and the work geometry is
//! validated, so that a malformed launch fails synchronously instead of on
//! the queue.
//!
//! The executions reproduce the work-item to element mapping of the device
//! code, including which elements a launch with too small a global size
//! leaves untouched.
//!
//! | Module | Entry points |
//! |--------|--------------|
//! | `copy` | `CopyMatrix`, `PadMatrix`, `UnPadMatrix` |
//! | `transpose` | `TransposeMatrix`, `PadTransposeMatrix`, `UnPadTransposeMatrix` |
//! | `level3` | `{Symm,Herm,Trmm}{Upper,Lower}ToSquared` |
//! | `xgemm` | `Xgemm`, `XgemmUpper`, `XgemmLower` |
//! | `trsm` | `TrsmSolve` |

use crate::memory::host_memory;
use crate::program::HostProgram;
use crate::queue::Job;
use tileblas::device::{Buffer, DeviceError, KernelArg};
use tileblas::Element;

/// Run a generic function instantiated for the element type of a precision.
macro_rules! with_element {
    ($precision:expr, $func:ident($($arg:expr),* $(,)?)) => {
        match $precision {
            tileblas::Precision::Single => $func::<f32>($($arg),*),
            tileblas::Precision::Double => $func::<f64>($($arg),*),
            tileblas::Precision::ComplexSingle => $func::<tileblas::Complex32>($($arg),*),
            tileblas::Precision::ComplexDouble => $func::<tileblas::Complex64>($($arg),*),
        }
    };
}

mod copy;
mod level3;
mod transpose;
mod trsm;
mod xgemm;

/// Kind of one kernel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArgKind {
    Size,
    Flag,
    Scalar,
    Buffer,
}

impl ArgKind {
    fn of(arg: &KernelArg) -> Self {
        match arg {
            KernelArg::Size(_) => ArgKind::Size,
            KernelArg::Flag(_) => ArgKind::Flag,
            KernelArg::Scalar(_) => ArgKind::Scalar,
            KernelArg::Buffer(_) => ArgKind::Buffer,
        }
    }
}

use ArgKind::{Buffer as B, Flag as F, Scalar as S, Size as N};

const FAST_COPY: &[ArgKind] = &[N, B, B];
const PAD: &[ArgKind] = &[N, N, N, N, B, N, N, N, N, B, F];
const UNPAD: &[ArgKind] = &[N, N, N, N, B, N, N, N, N, B, F, F, F, F];
const TO_SQUARED: &[ArgKind] = &[N, N, N, B, N, N, N, B];
const TRMM_TO_SQUARED: &[ArgKind] = &[N, N, N, B, N, N, N, B, F];
const XGEMM: &[ArgKind] = &[N, N, N, S, S, B, B, B];
const XGEMM_SQUARE: &[ArgKind] = &[N, N, S, S, B, B, B];
const TRSM_SOLVE: &[ArgKind] = &[N, N, F, S, B, N, B, N];

struct KernelSpec {
    name: &'static str,
    signature: &'static [ArgKind],
    prepare: fn(&Launch<'_>) -> Result<Job, DeviceError>,
}

static KERNELS: &[KernelSpec] = &[
    KernelSpec { name: "CopyMatrix", signature: FAST_COPY, prepare: copy::copy_matrix },
    KernelSpec { name: "PadMatrix", signature: PAD, prepare: copy::pad_matrix },
    KernelSpec { name: "UnPadMatrix", signature: UNPAD, prepare: copy::unpad_matrix },
    KernelSpec { name: "TransposeMatrix", signature: FAST_COPY, prepare: transpose::transpose_matrix },
    KernelSpec { name: "PadTransposeMatrix", signature: PAD, prepare: transpose::pad_transpose_matrix },
    KernelSpec { name: "UnPadTransposeMatrix", signature: UNPAD, prepare: transpose::unpad_transpose_matrix },
    KernelSpec { name: "SymmLowerToSquared", signature: TO_SQUARED, prepare: level3::symm_lower },
    KernelSpec { name: "SymmUpperToSquared", signature: TO_SQUARED, prepare: level3::symm_upper },
    KernelSpec { name: "HermLowerToSquared", signature: TO_SQUARED, prepare: level3::herm_lower },
    KernelSpec { name: "HermUpperToSquared", signature: TO_SQUARED, prepare: level3::herm_upper },
    KernelSpec { name: "TrmmLowerToSquared", signature: TRMM_TO_SQUARED, prepare: level3::trmm_lower },
    KernelSpec { name: "TrmmUpperToSquared", signature: TRMM_TO_SQUARED, prepare: level3::trmm_upper },
    KernelSpec { name: "Xgemm", signature: XGEMM, prepare: xgemm::xgemm },
    KernelSpec { name: "XgemmUpper", signature: XGEMM_SQUARE, prepare: xgemm::xgemm_upper },
    KernelSpec { name: "XgemmLower", signature: XGEMM_SQUARE, prepare: xgemm::xgemm_lower },
    KernelSpec { name: "TrsmSolve", signature: TRSM_SOLVE, prepare: trsm::trsm_solve },
];

/// Whether the host device can execute a kernel of this name.
pub fn is_known(name: &str) -> bool {
    KERNELS.iter().any(|entry| entry.name == name)
}

/// A kernel launch as seen by a host execution.
pub(crate) struct Launch<'a> {
    pub program: &'a HostProgram,
    pub kernel: &'a str,
    pub args: &'a [KernelArg],
    pub global: &'a [usize],
    pub local: &'a [usize],
}

impl<'a> Launch<'a> {
    pub fn reader(&self) -> ArgReader<'a> {
        ArgReader {
            kernel: self.kernel,
            args: self.args,
            next: 0,
        }
    }

    /// A compile-time constant of the program.
    pub fn constant(&self, name: &str) -> Result<usize, DeviceError> {
        self.program.constant(name)
    }

    pub fn invalid(&self, reason: impl Into<String>) -> DeviceError {
        DeviceError::InvalidArguments {
            kernel: self.kernel.to_string(),
            reason: reason.into(),
        }
    }

    /// Number of work-groups per dimension of a launch whose local size must
    /// be exactly `local`.
    pub fn groups<const D: usize>(&self, local: [usize; D]) -> Result<[usize; D], DeviceError> {
        if self.global.len() != D || self.local != local.as_slice() {
            return Err(DeviceError::InvalidLaunch(format!(
                "{} expects local size {:?}, got {:?} (global {:?})",
                self.kernel, local, self.local, self.global
            )));
        }
        let mut groups = [0; D];
        for (slot, (global, local)) in groups.iter_mut().zip(self.global.iter().zip(local)) {
            if local == 0 || global % local != 0 {
                return Err(DeviceError::InvalidLaunch(format!(
                    "{}: global size {:?} is not a multiple of local size {:?}",
                    self.kernel, self.global, self.local
                )));
            }
            *slot = global / local;
        }
        Ok(groups)
    }
}

/// Validate a launch against its kernel and turn it into a queued job.
pub(crate) fn prepare(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let entry = KERNELS
        .iter()
        .find(|entry| entry.name == launch.kernel)
        .ok_or_else(|| DeviceError::KernelNotFound(launch.kernel.to_string()))?;
    let kinds: Vec<ArgKind> = launch.args.iter().map(ArgKind::of).collect();
    if kinds != entry.signature {
        return Err(launch.invalid(format!(
            "expected arguments {:?}, got {:?}",
            entry.signature, kinds
        )));
    }
    (entry.prepare)(launch)
}

/// Sequential access to the arguments of a launch.
pub(crate) struct ArgReader<'a> {
    kernel: &'a str,
    args: &'a [KernelArg],
    next: usize,
}

impl<'a> ArgReader<'a> {
    fn take(&mut self) -> Result<&'a KernelArg, DeviceError> {
        let arg = self.args.get(self.next).ok_or_else(|| self.invalid("too few arguments"))?;
        self.next += 1;
        Ok(arg)
    }

    fn invalid(&self, reason: &str) -> DeviceError {
        DeviceError::InvalidArguments {
            kernel: self.kernel.to_string(),
            reason: format!("argument {}: {}", self.next, reason),
        }
    }

    pub fn size(&mut self) -> Result<usize, DeviceError> {
        match self.take()? {
            KernelArg::Size(value) => Ok(*value),
            _ => Err(self.invalid("expected an integer")),
        }
    }

    pub fn flag(&mut self) -> Result<bool, DeviceError> {
        match self.take()? {
            KernelArg::Flag(value) => Ok(*value),
            _ => Err(self.invalid("expected a flag")),
        }
    }

    pub fn scalar<T: Element>(&mut self) -> Result<T, DeviceError> {
        match self.take()? {
            KernelArg::Scalar(value) => T::from_scalar(*value).ok_or_else(|| {
                self.invalid(&format!(
                    "{} scalar passed to a {} program",
                    value.precision(),
                    T::PRECISION
                ))
            }),
            _ => Err(self.invalid("expected a scalar")),
        }
    }

    /// A buffer argument; it must be host memory.
    pub fn buffer(&mut self) -> Result<Buffer, DeviceError> {
        match self.take()? {
            KernelArg::Buffer(buffer) => {
                host_memory(buffer)?;
                Ok(buffer.clone())
            }
            _ => Err(self.invalid("expected a buffer")),
        }
    }
}

/// Column-major region of a buffer: element `(i, j)` lives at
/// `offset + j * ld + i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub one: usize,
    pub two: usize,
    pub ld: usize,
    pub offset: usize,
}

impl Region {
    pub fn new(one: usize, two: usize, ld: usize, offset: usize) -> Self {
        Self {
            one,
            two,
            ld,
            offset,
        }
    }

    #[inline]
    pub fn index(&self, one: usize, two: usize) -> usize {
        self.offset + two * self.ld + one
    }

    /// Check that the region lies inside `buffer` viewed as `T` elements.
    pub fn check<T: Element>(&self, launch: &Launch<'_>, name: &str, buffer: &Buffer) -> Result<(), DeviceError> {
        if self.one == 0 || self.two == 0 {
            return Ok(());
        }
        if self.ld < self.one {
            return Err(launch.invalid(format!(
                "{}: leading dimension {} below extent {}",
                name, self.ld, self.one
            )));
        }
        let len = buffer.size() / std::mem::size_of::<T>();
        let end = (self.two - 1)
            .checked_mul(self.ld)
            .and_then(|last| last.checked_add(self.offset))
            .and_then(|last| last.checked_add(self.one));
        match end {
            Some(end) if end <= len => Ok(()),
            _ => Err(DeviceError::OutOfRange(format!(
                "{} of {}: {}x{} region (ld {}, offset {}) exceeds {} elements",
                name, launch.kernel, self.one, self.two, self.ld, self.offset, len
            ))),
        }
    }
}
