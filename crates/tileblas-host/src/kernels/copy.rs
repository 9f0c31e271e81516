//! Matrix copies without transposition.

use super::{ArgReader, Launch, Region};
use crate::memory::host_memory;
use crate::queue::Job;
use tileblas::device::{Buffer, DeviceError};
use tileblas::Element;

/// Source and destination of the padding copies, in argument order.
pub(super) struct PadArgs {
    pub src: Buffer,
    pub src_region: Region,
    pub dest: Buffer,
    pub dest_region: Region,
    pub conjugate: bool,
}

impl PadArgs {
    pub fn read(reader: &mut ArgReader<'_>) -> Result<Self, DeviceError> {
        let (src_region, src) = read_matrix(reader)?;
        let (dest_region, dest) = read_matrix(reader)?;
        let conjugate = reader.flag()?;
        Ok(Self {
            src,
            src_region,
            dest,
            dest_region,
            conjugate,
        })
    }
}

fn read_matrix(reader: &mut ArgReader<'_>) -> Result<(Region, Buffer), DeviceError> {
    let one = reader.size()?;
    let two = reader.size()?;
    let ld = reader.size()?;
    let offset = reader.size()?;
    let buffer = reader.buffer()?;
    Ok((Region::new(one, two, ld, offset), buffer))
}

/// Which source elements a write-back copies.
#[derive(Debug, Clone, Copy)]
pub(super) struct WriteMask {
    upper: bool,
    lower: bool,
    diagonal_imag_zero: bool,
}

impl WriteMask {
    pub fn read(reader: &mut ArgReader<'_>) -> Result<Self, DeviceError> {
        Ok(Self {
            upper: reader.flag()?,
            lower: reader.flag()?,
            diagonal_imag_zero: reader.flag()?,
        })
    }

    #[inline]
    fn allows(&self, one: usize, two: usize) -> bool {
        if self.upper {
            one <= two
        } else if self.lower {
            one >= two
        } else {
            true
        }
    }

    #[inline]
    fn apply<T: Element>(&self, value: T, one: usize, two: usize) -> T {
        if self.diagonal_imag_zero && one == two {
            value.real_only()
        } else {
            value
        }
    }
}

/// Source coordinates of destination element `(one, two)`.
#[inline]
fn source_of(one: usize, two: usize, transposed: bool) -> (usize, usize) {
    if transposed {
        (two, one)
    } else {
        (one, two)
    }
}

/// Write extents of a padding copy: the destination clipped to the elements
/// the launch's work-items reach.
fn written(dest: &Region, covered: [usize; 2]) -> [usize; 2] {
    [dest.one.min(covered[0]), dest.two.min(covered[1])]
}

/// Copy into a destination, zero-filling where the source ends.
pub(super) fn pad_job<T: Element>(
    launch: &Launch<'_>,
    args: PadArgs,
    covered: [usize; 2],
    transposed: bool,
) -> Result<Job, DeviceError> {
    let PadArgs {
        src,
        src_region,
        dest,
        dest_region,
        conjugate,
    } = args;
    let [write_one, write_two] = written(&dest_region, covered);
    let (src_one, src_two) = source_of(src_region.one, src_region.two, transposed);
    let read = [write_one.min(src_one), write_two.min(src_two)];
    let (read_one, read_two) = source_of(read[0], read[1], transposed);
    Region { one: read_one, two: read_two, ..src_region }.check::<T>(launch, "source", &src)?;
    Region { one: write_one, two: write_two, ..dest_region }.check::<T>(launch, "destination", &dest)?;

    Ok(Box::new(move || {
        let values = host_memory(&src)?.to_elements::<T>();
        host_memory(&dest)?.with_elements_mut::<T, _>(|out| {
            for two in 0..write_two {
                for one in 0..write_one {
                    let mut value = if one < read[0] && two < read[1] {
                        let (s_one, s_two) = source_of(one, two, transposed);
                        values[src_region.index(s_one, s_two)]
                    } else {
                        T::zero()
                    };
                    if conjugate {
                        value = value.conj();
                    }
                    out[dest_region.index(one, two)] = value;
                }
            }
        });
        Ok(())
    }))
}

/// Copy out of a padded source, restricted by a write mask.
pub(super) fn unpad_job<T: Element>(
    launch: &Launch<'_>,
    args: PadArgs,
    mask: WriteMask,
    covered: [usize; 2],
    transposed: bool,
) -> Result<Job, DeviceError> {
    let PadArgs {
        src,
        src_region,
        dest,
        dest_region,
        conjugate,
    } = args;
    let [write_one, write_two] = written(&dest_region, covered);
    let (read_one, read_two) = source_of(write_one, write_two, transposed);
    Region { one: read_one, two: read_two, ..src_region }.check::<T>(launch, "source", &src)?;
    Region { one: write_one, two: write_two, ..dest_region }.check::<T>(launch, "destination", &dest)?;

    Ok(Box::new(move || {
        let values = host_memory(&src)?.to_elements::<T>();
        host_memory(&dest)?.with_elements_mut::<T, _>(|out| {
            for two in 0..write_two {
                for one in 0..write_one {
                    let (s_one, s_two) = source_of(one, two, transposed);
                    if !mask.allows(s_one, s_two) {
                        continue;
                    }
                    let mut value = values[src_region.index(s_one, s_two)];
                    if conjugate {
                        value = value.conj();
                    }
                    out[dest_region.index(one, two)] = mask.apply(value, s_one, s_two);
                }
            }
        });
        Ok(())
    }))
}

/// Elements reached by a launch of the `pad.cl` kernels.
pub(super) fn pad_coverage(launch: &Launch<'_>) -> Result<[usize; 2], DeviceError> {
    let dimx = launch.constant("PAD_DIMX")?;
    let dimy = launch.constant("PAD_DIMY")?;
    let [groups_one, groups_two] = launch.groups([dimx, dimy])?;
    Ok([
        groups_one * launch.constant("PAD_WPTX")? * dimx,
        groups_two * launch.constant("PAD_WPTY")? * dimy,
    ])
}

pub(super) fn copy_matrix(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), fast_copy(launch))
}

pub(super) fn pad_matrix(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), pad(launch))
}

pub(super) fn unpad_matrix(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), unpad(launch))
}

fn fast_copy<T: Element>(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let dimx = launch.constant("COPY_DIMX")?;
    let dimy = launch.constant("COPY_DIMY")?;
    let [groups_one, groups_two] = launch.groups([dimx, dimy])?;
    let mut reader = launch.reader();
    let ld = reader.size()?;
    let src = reader.buffer()?;
    let dest = reader.buffer()?;

    let region = Region::new(
        groups_one * dimx * launch.constant("COPY_VW")?,
        groups_two * dimy * launch.constant("COPY_WPT")?,
        ld,
        0,
    );
    region.check::<T>(launch, "source", &src)?;
    region.check::<T>(launch, "destination", &dest)?;

    Ok(Box::new(move || {
        let values = host_memory(&src)?.to_elements::<T>();
        host_memory(&dest)?.with_elements_mut::<T, _>(|out| {
            for two in 0..region.two {
                let start = region.index(0, two);
                out[start..start + region.one].copy_from_slice(&values[start..start + region.one]);
            }
        });
        Ok(())
    }))
}

fn pad<T: Element>(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let covered = pad_coverage(launch)?;
    let args = PadArgs::read(&mut launch.reader())?;
    pad_job::<T>(launch, args, covered, false)
}

fn unpad<T: Element>(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let covered = pad_coverage(launch)?;
    let mut reader = launch.reader();
    let args = PadArgs::read(&mut reader)?;
    let mask = WriteMask::read(&mut reader)?;
    unpad_job::<T>(launch, args, mask, covered, false)
}
