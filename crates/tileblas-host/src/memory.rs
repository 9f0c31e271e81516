//! Device memory of the host backend.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tileblas::device::{Buffer, DeviceError, DeviceMemory};
use tileblas::Element;

/// Zero-initialized, byte-addressed memory.
///
/// Storage is kept in 8-byte words so that every element type can be viewed
/// in place without realignment.
#[derive(Debug)]
pub struct HostMemory {
    words: RwLock<Vec<u64>>,
    size: usize,
    allocated: Arc<AtomicUsize>,
}

impl HostMemory {
    /// Memory of `size` bytes, accounted in `allocated` until dropped.
    pub(crate) fn new(size: usize, allocated: Arc<AtomicUsize>) -> Self {
        Self {
            words: RwLock::new(vec![0u64; (size + 7) / 8]),
            size,
            allocated,
        }
    }

    /// Copy `out.len()` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) -> Result<(), DeviceError> {
        let range = self.byte_range(offset, out.len())?;
        let words = self.words.read().unwrap_or_else(PoisonError::into_inner);
        let bytes: &[u8] = bytemuck::cast_slice(words.as_slice());
        out.copy_from_slice(&bytes[range]);
        Ok(())
    }

    /// Overwrite `data.len()` bytes starting at `offset`.
    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        let range = self.byte_range(offset, data.len())?;
        let mut words = self.words.write().unwrap_or_else(PoisonError::into_inner);
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(words.as_mut_slice());
        bytes[range].copy_from_slice(data);
        Ok(())
    }

    /// Number of whole `T` elements the memory holds.
    pub fn len_of<T: Element>(&self) -> usize {
        self.size / std::mem::size_of::<T>()
    }

    /// Snapshot of the memory as elements.
    pub fn to_elements<T: Element>(&self) -> Vec<T> {
        let len = self.len_of::<T>();
        let words = self.words.read().unwrap_or_else(PoisonError::into_inner);
        let bytes: &[u8] = bytemuck::cast_slice(words.as_slice());
        bytemuck::cast_slice(&bytes[..len * std::mem::size_of::<T>()]).to_vec()
    }

    /// Run `f` with exclusive access to the memory as elements.
    pub fn with_elements_mut<T: Element, R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        let len = self.len_of::<T>();
        let mut words = self.words.write().unwrap_or_else(PoisonError::into_inner);
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(words.as_mut_slice());
        f(bytemuck::cast_slice_mut(&mut bytes[..len * std::mem::size_of::<T>()]))
    }

    fn byte_range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, DeviceError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(offset..end),
            _ => Err(DeviceError::OutOfRange(format!(
                "bytes {}..{} of a {} byte buffer",
                offset,
                offset.saturating_add(len),
                self.size
            ))),
        }
    }
}

impl DeviceMemory for HostMemory {
    fn size(&self) -> usize {
        self.size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for HostMemory {
    fn drop(&mut self) {
        self.allocated.fetch_sub(self.size, Ordering::SeqCst);
    }
}

/// The host memory behind a buffer handle.
pub(crate) fn host_memory(buffer: &Buffer) -> Result<&HostMemory, DeviceError> {
    if buffer.is_null() {
        return Err(DeviceError::NullBuffer);
    }
    buffer
        .downcast::<HostMemory>()
        .ok_or_else(|| DeviceError::Execution("buffer was not allocated by the host device".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tileblas::Complex64;

    fn memory(size: usize) -> (HostMemory, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(size));
        (HostMemory::new(size, Arc::clone(&counter)), counter)
    }

    #[test]
    fn test_starts_zeroed() {
        let (mem, _) = memory(10);
        let mut out = [0xffu8; 10];
        mem.read_bytes(0, &mut out).unwrap();
        assert_eq!(out, [0u8; 10]);
    }

    #[test]
    fn test_byte_round_trip_with_offset() {
        let (mem, _) = memory(16);
        mem.write_bytes(3, &[1, 2, 3]).unwrap();
        let mut out = [0u8; 5];
        mem.read_bytes(2, &mut out).unwrap();
        assert_eq!(out, [0, 1, 2, 3, 0]);
    }

    #[test]
    fn test_out_of_range() {
        let (mem, _) = memory(8);
        assert!(matches!(
            mem.write_bytes(6, &[0; 4]),
            Err(DeviceError::OutOfRange(_))
        ));
        assert!(matches!(
            mem.read_bytes(usize::MAX, &mut [0; 2]),
            Err(DeviceError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_element_views() {
        let (mem, _) = memory(3 * 16);
        mem.with_elements_mut::<Complex64, _>(|values| {
            assert_eq!(values.len(), 3);
            values[1] = Complex64::new(1.5, -2.0);
        });
        let values = mem.to_elements::<Complex64>();
        assert_eq!(values[1], Complex64::new(1.5, -2.0));
        assert_eq!(mem.len_of::<f32>(), 12);
    }

    #[test]
    fn test_drop_releases_accounting() {
        let (mem, counter) = memory(64);
        assert_eq!(counter.load(Ordering::SeqCst), 64);
        drop(mem);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
