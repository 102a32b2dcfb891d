//! Allocation strategies for buffer storage.

use std::alloc::Layout;

/// Strategy used by a [`Buffer`](crate::Buffer) to obtain and release storage.
///
/// Buffers never touch the global allocator directly: every reallocation goes
/// through [`resize`](Self::resize) and every release through
/// [`release`](Self::release). Embedders can plug in pooled or accounting
/// strategies without changing any rendering code.
pub trait Allocator {
    /// Make `data` hold exactly `capacity` zero-initialized bytes.
    ///
    /// Bytes below the previous length must be preserved. Implementations
    /// must not return on failure; call [`allocation_failed`] instead.
    fn resize(&self, data: &mut Vec<u8>, capacity: usize);

    /// Give back storage that the buffer no longer needs.
    fn release(&self, data: Vec<u8>) {
        drop(data);
    }
}

/// Default strategy backed by the global allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct Heap;

impl Allocator for Heap {
    fn resize(&self, data: &mut Vec<u8>, capacity: usize) {
        if capacity > data.len() && data.try_reserve_exact(capacity - data.len()).is_err() {
            allocation_failed(capacity);
        }
        data.resize(capacity, 0);
    }
}

/// Terminate the process after an allocation of `size` bytes failed.
pub fn allocation_failed(size: usize) -> ! {
    tracing::error!(size, "Allocation failed");
    match Layout::array::<u8>(size) {
        Ok(layout) => std::alloc::handle_alloc_error(layout),
        Err(_) => std::process::abort(),
    }
}
