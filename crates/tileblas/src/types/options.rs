/// Storage order of a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    RowMajor,
    #[default]
    ColMajor,
}

/// Operation applied to an operand before multiplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transpose {
    #[default]
    No,
    Yes,
    Conjugate,
}

impl Transpose {
    pub fn is_transposed(self) -> bool {
        !matches!(self, Transpose::No)
    }

    pub fn is_conjugate(self) -> bool {
        matches!(self, Transpose::Conjugate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Triangle {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Diagonal {
    Unit,
    #[default]
    NonUnit,
}

/// Whether a matrix is stored with its logical columns contiguous ("rotated"
/// relative to the column-major kernel layout).
///
/// ```text
///              transposed=false   transposed=true
/// ColMajor     not rotated        rotated
/// RowMajor     rotated            not rotated
/// ```
///
/// The same boolean decides whether staging into and out of kernel layout
/// transposes.
#[inline]
pub fn is_rotated(layout: Layout, transposed: bool) -> bool {
    match layout {
        Layout::ColMajor => transposed,
        Layout::RowMajor => !transposed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_table() {
        assert!(!is_rotated(Layout::ColMajor, false));
        assert!(is_rotated(Layout::ColMajor, true));
        assert!(is_rotated(Layout::RowMajor, false));
        assert!(!is_rotated(Layout::RowMajor, true));
    }

    #[test]
    fn test_transpose_flags() {
        assert!(!Transpose::No.is_transposed());
        assert!(Transpose::Yes.is_transposed());
        assert!(Transpose::Conjugate.is_transposed());
        assert!(Transpose::Conjugate.is_conjugate());
        assert!(!Transpose::Yes.is_conjugate());
    }
}
