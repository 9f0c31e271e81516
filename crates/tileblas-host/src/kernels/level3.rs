//! Expansion of a stored triangle into a full square matrix.

use super::copy::pad_coverage;
use super::{Launch, Region};
use crate::memory::host_memory;
use crate::queue::Job;
use tileblas::device::DeviceError;
use tileblas::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fill {
    /// Mirror the stored triangle.
    Symmetric,
    /// Mirror and conjugate; the diagonal is real.
    Hermitian,
    /// Zeros outside the stored triangle.
    Triangular,
}

pub(super) fn symm_lower(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), to_squared(launch, Fill::Symmetric, false))
}

pub(super) fn symm_upper(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), to_squared(launch, Fill::Symmetric, true))
}

pub(super) fn herm_lower(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), to_squared(launch, Fill::Hermitian, false))
}

pub(super) fn herm_upper(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), to_squared(launch, Fill::Hermitian, true))
}

pub(super) fn trmm_lower(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), to_squared(launch, Fill::Triangular, false))
}

pub(super) fn trmm_upper(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), to_squared(launch, Fill::Triangular, true))
}

fn to_squared<T: Element>(launch: &Launch<'_>, fill: Fill, stored_upper: bool) -> Result<Job, DeviceError> {
    let [covered_one, covered_two] = pad_coverage(launch)?;
    let mut reader = launch.reader();
    let src_dim = reader.size()?;
    let src_ld = reader.size()?;
    let src_offset = reader.size()?;
    let src = reader.buffer()?;
    let dest_dim = reader.size()?;
    let dest_ld = reader.size()?;
    let dest_offset = reader.size()?;
    let dest = reader.buffer()?;
    let unit_diagonal = fill == Fill::Triangular && reader.flag()?;

    let write_one = dest_dim.min(covered_one);
    let write_two = dest_dim.min(covered_two);
    let read = src_dim.min(write_one.max(write_two));
    let src_region = Region::new(read, read, src_ld, src_offset);
    let dest_region = Region::new(write_one, write_two, dest_ld, dest_offset);
    src_region.check::<T>(launch, "source", &src)?;
    dest_region.check::<T>(launch, "destination", &dest)?;

    Ok(Box::new(move || {
        let values = host_memory(&src)?.to_elements::<T>();
        host_memory(&dest)?.with_elements_mut::<T, _>(|out| {
            for two in 0..write_two {
                for one in 0..write_one {
                    let mut value = T::zero();
                    if one < src_dim && two < src_dim {
                        let stored = if stored_upper { one <= two } else { one >= two };
                        value = match (fill, stored) {
                            (_, true) => values[src_region.index(one, two)],
                            (Fill::Symmetric, false) => values[src_region.index(two, one)],
                            (Fill::Hermitian, false) => values[src_region.index(two, one)].conj(),
                            (Fill::Triangular, false) => T::zero(),
                        };
                        if one == two {
                            if fill == Fill::Hermitian {
                                value = value.real_only();
                            } else if unit_diagonal {
                                value = T::one();
                            }
                        }
                    }
                    out[dest_region.index(one, two)] = value;
                }
            }
        });
        Ok(())
    }))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use tileblas::device::KernelArg;
    use tileblas::source::{COMMON, PAD_COPY};
    use tileblas::{Buffer, Complex32, Precision};

    const PARAMS: &[(&str, usize)] = &[
        ("PAD_DIMX", 2),
        ("PAD_DIMY", 2),
        ("PAD_WPTX", 1),
        ("PAD_WPTY", 1),
    ];

    fn args(src: &Buffer, dim: usize, dest: &Buffer) -> Vec<KernelArg> {
        vec![
            dim.into(),
            dim.into(),
            0usize.into(),
            src.into(),
            dim.into(),
            dim.into(),
            0usize.into(),
            dest.into(),
        ]
    }

    #[test]
    fn test_symm_upper_mirrors() {
        let program = program(Precision::Single, PARAMS, &[COMMON, PAD_COPY]);
        // upper triangle holds 1, 2, 3; the lower entry is garbage
        let src = buffer_with(&[1.0f32, -9.0, 2.0, 3.0]);
        let dest = buffer_with(&[0.0f32; 4]);
        run(&program, "SymmUpperToSquared", args(&src, 2, &dest), vec![2, 2], vec![2, 2]).unwrap();
        assert_eq!(contents::<f32>(&dest), vec![1.0, 2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_herm_lower_conjugates_and_clears_diagonal() {
        let program = program(Precision::ComplexSingle, PARAMS, &[COMMON, PAD_COPY]);
        let src = buffer_with(&[
            Complex32::new(1.0, 5.0),
            Complex32::new(2.0, 1.0),
            Complex32::new(-9.0, -9.0),
            Complex32::new(3.0, 0.5),
        ]);
        let dest = buffer_with(&[Complex32::new(0.0, 0.0); 4]);
        run(&program, "HermLowerToSquared", args(&src, 2, &dest), vec![2, 2], vec![2, 2]).unwrap();
        assert_eq!(
            contents::<Complex32>(&dest),
            vec![
                Complex32::new(1.0, 0.0),
                Complex32::new(2.0, 1.0),
                Complex32::new(2.0, -1.0),
                Complex32::new(3.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_trmm_unit_diagonal_and_padding() {
        let program = program(Precision::Double, PARAMS, &[COMMON, PAD_COPY]);
        let src = buffer_with(&[5.0f64, 2.0, -9.0, 7.0]);
        let dest = buffer_with(&[-1.0f64; 9]);
        let args: Vec<KernelArg> = vec![
            2usize.into(),
            2usize.into(),
            0usize.into(),
            (&src).into(),
            3usize.into(),
            3usize.into(),
            0usize.into(),
            (&dest).into(),
            true.into(),
        ];
        run(&program, "TrmmLowerToSquared", args, vec![4, 4], vec![2, 2]).unwrap();
        assert_eq!(
            contents::<f64>(&dest),
            vec![1.0, 2.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0]
        );
    }
}
