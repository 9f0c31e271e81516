//! Transposing matrix copies.

use super::copy::{pad_job, unpad_job, PadArgs, WriteMask};
use super::{Launch, Region};
use crate::memory::host_memory;
use crate::queue::Job;
use tileblas::device::DeviceError;
use tileblas::Element;

pub(super) fn transpose_matrix(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), fast_transpose(launch))
}

pub(super) fn pad_transpose_matrix(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), pad_transpose(launch))
}

pub(super) fn unpad_transpose_matrix(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    with_element!(launch.program.precision(), unpad_transpose(launch))
}

fn fast_transpose<T: Element>(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let dim = launch.constant("TRA_DIM")?;
    let wpt = launch.constant("TRA_WPT")?;
    let [groups_one, groups_two] = launch.groups([dim, dim])?;
    let mut reader = launch.reader();
    let ld = reader.size()?;
    let src = reader.buffer()?;
    let dest = reader.buffer()?;

    let (one, two) = (groups_one * dim * wpt, groups_two * dim * wpt);
    Region::new(two, one, ld, 0).check::<T>(launch, "source", &src)?;
    let region = Region::new(one, two, ld, 0);
    region.check::<T>(launch, "destination", &dest)?;

    Ok(Box::new(move || {
        let values = host_memory(&src)?.to_elements::<T>();
        host_memory(&dest)?.with_elements_mut::<T, _>(|out| {
            for j in 0..region.two {
                for i in 0..region.one {
                    out[region.index(i, j)] = values[j + i * ld];
                }
            }
        });
        Ok(())
    }))
}

/// Elements reached by a launch of the `padtranspose.cl` kernels.
fn coverage(launch: &Launch<'_>) -> Result<[usize; 2], DeviceError> {
    let tile = launch.constant("PADTRA_TILE")?;
    let wpt = launch.constant("PADTRA_WPT")?;
    let [groups_one, groups_two] = launch.groups([tile, tile])?;
    Ok([groups_one * wpt * tile, groups_two * wpt * tile])
}

fn pad_transpose<T: Element>(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let covered = coverage(launch)?;
    let args = PadArgs::read(&mut launch.reader())?;
    pad_job::<T>(launch, args, covered, true)
}

fn unpad_transpose<T: Element>(launch: &Launch<'_>) -> Result<Job, DeviceError> {
    let covered = coverage(launch)?;
    let mut reader = launch.reader();
    let args = PadArgs::read(&mut reader)?;
    let mask = WriteMask::read(&mut reader)?;
    unpad_job::<T>(launch, args, mask, covered, true)
}
