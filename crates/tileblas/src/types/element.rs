use bytemuck::Pod;
use num_complex::{Complex32, Complex64};
use num_traits::Num;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric precision of a compiled program and of its tuning entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Single,
    Double,
    ComplexSingle,
    ComplexDouble,
}

impl Precision {
    pub const ALL: [Precision; 4] = [
        Precision::Single,
        Precision::Double,
        Precision::ComplexSingle,
        Precision::ComplexDouble,
    ];

    /// Size of one element in bytes.
    pub fn element_size(self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
            Precision::ComplexSingle => 8,
            Precision::ComplexDouble => 16,
        }
    }

    /// Value of the `PRECISION` constant that kernel sources are compiled with.
    pub fn define_value(self) -> usize {
        match self {
            Precision::Single => 32,
            Precision::Double => 64,
            Precision::ComplexSingle => 3232,
            Precision::ComplexDouble => 6464,
        }
    }

    /// Inverse of [`Precision::define_value`].
    pub fn from_define_value(value: usize) -> Option<Self> {
        Precision::ALL
            .into_iter()
            .find(|precision| precision.define_value() == value)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Precision::ComplexSingle | Precision::ComplexDouble)
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precision::Single => "single",
            Precision::Double => "double",
            Precision::ComplexSingle => "complex_single",
            Precision::ComplexDouble => "complex_double",
        };
        f.write_str(name)
    }
}

/// A scalar kernel argument (alpha, beta) tagged with its precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Single(f32),
    Double(f64),
    ComplexSingle(Complex32),
    ComplexDouble(Complex64),
}

impl Scalar {
    pub fn precision(&self) -> Precision {
        match self {
            Scalar::Single(_) => Precision::Single,
            Scalar::Double(_) => Precision::Double,
            Scalar::ComplexSingle(_) => Precision::ComplexSingle,
            Scalar::ComplexDouble(_) => Precision::ComplexDouble,
        }
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
    impl Sealed for super::Complex32 {}
    impl Sealed for super::Complex64 {}
}

/// Matrix element type. Implemented for `f32`, `f64`, [`Complex32`] and
/// [`Complex64`] only.
pub trait Element:
    Copy + Send + Sync + fmt::Debug + PartialEq + Pod + Num + sealed::Sealed + 'static
{
    /// The real type underlying this element (itself for real types).
    type Real: Element;

    const PRECISION: Precision;

    /// Complex conjugate; identity for real types.
    fn conj(self) -> Self;

    /// The same value with its imaginary part cleared.
    fn real_only(self) -> Self;

    fn from_real(value: Self::Real) -> Self;

    fn to_scalar(self) -> Scalar;

    /// Extracts a value of this type; `None` on a precision mismatch.
    fn from_scalar(scalar: Scalar) -> Option<Self>;
}

/// Marker for the element types Hermitian routines accept.
pub trait ComplexElement: Element {}

impl ComplexElement for Complex32 {}
impl ComplexElement for Complex64 {}

macro_rules! impl_real_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                type Real = $ty;
                const PRECISION: Precision = Precision::$variant;

                #[inline]
                fn conj(self) -> Self {
                    self
                }

                #[inline]
                fn real_only(self) -> Self {
                    self
                }

                #[inline]
                fn from_real(value: Self::Real) -> Self {
                    value
                }

                fn to_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                fn from_scalar(scalar: Scalar) -> Option<Self> {
                    match scalar {
                        Scalar::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

macro_rules! impl_complex_element {
    ($($ty:ty => $real:ty, $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                type Real = $real;
                const PRECISION: Precision = Precision::$variant;

                #[inline]
                fn conj(self) -> Self {
                    <$ty>::new(self.re, -self.im)
                }

                #[inline]
                fn real_only(self) -> Self {
                    <$ty>::new(self.re, 0.0)
                }

                #[inline]
                fn from_real(value: Self::Real) -> Self {
                    <$ty>::new(value, 0.0)
                }

                fn to_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                fn from_scalar(scalar: Scalar) -> Option<Self> {
                    match scalar {
                        Scalar::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_real_element! {
    f32 => Single,
    f64 => Double,
}

impl_complex_element! {
    Complex32 => f32, ComplexSingle,
    Complex64 => f64, ComplexDouble,
}
