//! Error types for routine execution.

use crate::device::DeviceError;
use std::fmt;
use thiserror::Error;

/// Matrix operand a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// The first input matrix.
    A,
    /// The second input matrix.
    B,
    /// The result matrix.
    C,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::A => f.write_str("A"),
            Operand::B => f.write_str("B"),
            Operand::C => f.write_str("C"),
        }
    }
}

/// Errors that can occur while running a routine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BlasError {
    /// A problem dimension is zero.
    #[error("Invalid dimension: all problem dimensions must be non-zero")]
    InvalidDimension,

    /// Null or empty buffer.
    #[error("Invalid buffer handle for matrix {0}")]
    InvalidBufferHandle(Operand),

    /// Leading dimension below the contiguous extent of the matrix.
    #[error("Invalid leading dimension for matrix {operand}: {ld} < {minimum}")]
    InvalidLeadingDimension {
        operand: Operand,
        ld: usize,
        minimum: usize,
    },

    /// Buffer too small for the described matrix.
    #[error("Insufficient buffer size for matrix {operand}: {required} bytes required, {available} available")]
    InvalidMatrixSize {
        operand: Operand,
        required: usize,
        available: usize,
    },

    /// Temporary device memory could not be allocated.
    #[error("Temporary buffer allocation failure: {0}")]
    TempBufferAllocFailure(String),

    /// Program build or kernel entry-point lookup failed.
    #[error("Invalid kernel: {0}")]
    InvalidKernel(String),

    /// The device rejected a kernel launch or its arguments.
    #[error("Kernel launch error: {0}")]
    KernelLaunchError(String),

    /// Any other device fault.
    #[error("Device error: {0}")]
    Device(String),
}

impl BlasError {
    /// Flat status code of this error.
    pub fn status(&self) -> StatusCode {
        match self {
            BlasError::InvalidDimension => StatusCode::InvalidDimension,
            BlasError::InvalidBufferHandle(_) => StatusCode::InvalidBufferHandle,
            BlasError::InvalidLeadingDimension { .. } => StatusCode::InvalidLeadingDimension,
            BlasError::InvalidMatrixSize { .. } => StatusCode::InvalidMatrixSize,
            BlasError::TempBufferAllocFailure(_) => StatusCode::TempBufferAllocFailure,
            BlasError::InvalidKernel(_) => StatusCode::InvalidKernel,
            BlasError::KernelLaunchError(_) => StatusCode::KernelLaunchError,
            BlasError::Device(_) => StatusCode::DeviceFailure,
        }
    }

    /// Operand a validation error refers to, if any.
    pub fn operand(&self) -> Option<Operand> {
        match self {
            BlasError::InvalidBufferHandle(operand)
            | BlasError::InvalidLeadingDimension { operand, .. }
            | BlasError::InvalidMatrixSize { operand, .. } => Some(*operand),
            _ => None,
        }
    }
}

impl From<DeviceError> for BlasError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::OutOfMemory { .. } | DeviceError::InvalidBufferSize => {
                BlasError::TempBufferAllocFailure(err.to_string())
            }
            DeviceError::Build(_) | DeviceError::KernelNotFound(_) => {
                BlasError::InvalidKernel(err.to_string())
            }
            DeviceError::InvalidArguments { .. }
            | DeviceError::InvalidLaunch(_)
            | DeviceError::ForeignProgram => BlasError::KernelLaunchError(err.to_string()),
            DeviceError::NullBuffer
            | DeviceError::OutOfRange(_)
            | DeviceError::Execution(_)
            | DeviceError::QueueClosed => BlasError::Device(err.to_string()),
        }
    }
}

/// Flat result code of a routine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Every stage of the routine was enqueued.
    Success,
    /// See [`BlasError::InvalidDimension`].
    InvalidDimension,
    /// See [`BlasError::InvalidBufferHandle`].
    InvalidBufferHandle,
    /// See [`BlasError::InvalidLeadingDimension`].
    InvalidLeadingDimension,
    /// See [`BlasError::InvalidMatrixSize`].
    InvalidMatrixSize,
    /// See [`BlasError::TempBufferAllocFailure`].
    TempBufferAllocFailure,
    /// See [`BlasError::InvalidKernel`].
    InvalidKernel,
    /// See [`BlasError::KernelLaunchError`].
    KernelLaunchError,
    /// See [`BlasError::Device`].
    DeviceFailure,
}

impl StatusCode {
    /// Whether the routine was enqueued without error.
    pub fn is_success(self) -> bool {
        self == StatusCode::Success
    }
}

impl<T> From<&Result<T>> for StatusCode {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => StatusCode::Success,
            Err(err) => err.status(),
        }
    }
}

/// Result type for routine execution.
pub type Result<T> = std::result::Result<T, BlasError>;
