//! Growable byte buffer.

use std::ffi::CStr;
use std::fmt;
use std::io;
use std::ops::Deref;

use crate::alloc::{Allocator, Heap};

/// Growth unit for buffers holding inline (span-level) content.
pub const SPAN_UNIT: usize = 64;

/// Growth unit for buffers holding block-level content.
pub const BLOCK_UNIT: usize = 256;

/// UTF-8 encoding of U+FFFD REPLACEMENT CHARACTER.
const REPLACEMENT: &[u8] = b"\xef\xbf\xbd";

/// Growable byte buffer.
///
/// Storage is always exactly [`capacity`](Self::capacity) bytes long and the
/// logical content is its first [`len`](Self::len) bytes. Capacity only grows
/// in whole multiples of the growth unit, so
/// `len() <= capacity()` and `capacity() % unit() == 0` hold for every
/// writable buffer.
///
/// A buffer with unit `0` is a read-only view created by
/// [`read_only`](Self::read_only). Mutating it is a contract violation and
/// panics.
pub struct Buffer<A: Allocator = Heap> {
    /// Backing storage, `data.len()` is the allocated capacity.
    data: Vec<u8>,
    /// Logical size of the content.
    size: usize,
    /// Reallocation unit (0 = read-only).
    unit: usize,
    alloc: A,
}

impl Buffer<Heap> {
    /// Create an empty buffer on the global allocator.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is zero; use [`read_only`](Self::read_only) for views.
    #[must_use]
    pub fn new(unit: usize) -> Self {
        Self::with_allocator(unit, Heap)
    }

    /// Wrap caller-supplied bytes as a read-only buffer.
    #[must_use]
    pub fn read_only(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        Self {
            size: data.len(),
            data,
            unit: 0,
            alloc: Heap,
        }
    }
}

impl<A: Allocator> Buffer<A> {
    /// Create an empty buffer that obtains storage from `alloc`.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is zero.
    #[must_use]
    pub fn with_allocator(unit: usize, alloc: A) -> Self {
        assert!(unit > 0, "buffer growth unit must be non-zero");
        Self {
            data: Vec::new(),
            size: 0,
            unit,
            alloc,
        }
    }

    fn assert_writable(&self) {
        assert!(self.unit > 0, "attempted to mutate a read-only buffer");
    }

    /// Logical size in bytes.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the buffer holds no content.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Allocated size in bytes.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Reallocation unit, `0` for read-only buffers.
    pub fn unit(&self) -> usize {
        self.unit
    }

    /// Whether this buffer is a read-only view.
    pub fn is_read_only(&self) -> bool {
        self.unit == 0
    }

    /// The logical content.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Grow the allocation to hold at least `size` bytes.
    ///
    /// The new capacity is the current one plus the smallest number of whole
    /// units reaching `size`. Does nothing when the buffer is already large
    /// enough.
    pub fn grow(&mut self, size: usize) {
        self.assert_writable();
        let current = self.data.len();
        if current >= size {
            return;
        }
        let units = (size - current).div_ceil(self.unit);
        let capacity = current + units * self.unit;
        self.alloc.resize(&mut self.data, capacity);
    }

    /// Append raw bytes.
    pub fn put(&mut self, bytes: &[u8]) {
        self.assert_writable();
        let end = self.size + bytes.len();
        if end > self.data.len() {
            self.grow(end);
        }
        self.data[self.size..end].copy_from_slice(bytes);
        self.size = end;
    }

    /// Append a string.
    pub fn puts(&mut self, s: &str) {
        self.put(s.as_bytes());
    }

    /// Append a single byte.
    pub fn putc(&mut self, byte: u8) {
        self.assert_writable();
        if self.size >= self.data.len() {
            self.grow(self.size + 1);
        }
        self.data[self.size] = byte;
        self.size += 1;
    }

    /// Append formatted text.
    ///
    /// Formats straight into the spare capacity. When the output does not fit,
    /// the buffer grows just enough for the measured length and formats once
    /// more.
    pub fn printf(&mut self, args: fmt::Arguments<'_>) {
        self.assert_writable();
        if let Some(s) = args.as_str() {
            self.puts(s);
            return;
        }

        let Some(needed) = self.format_into_spare(args) else {
            return;
        };
        if needed > self.data.len() - self.size {
            self.grow(self.size + needed);
            if self.format_into_spare(args).is_none() {
                return;
            }
        }
        self.size += needed;
    }

    /// Format into the bytes past `size`, returning the full output length.
    fn format_into_spare(&mut self, args: fmt::Arguments<'_>) -> Option<usize> {
        let mut probe = Probe {
            dst: &mut self.data[self.size..],
            written: 0,
        };
        fmt::write(&mut probe, args).ok()?;
        Some(probe.written)
    }

    /// Append the UTF-8 encoding of a code point.
    ///
    /// Surrogates and values past U+10FFFF are replaced by U+FFFD.
    #[allow(clippy::cast_possible_truncation)]
    pub fn put_utf8(&mut self, codepoint: u32) {
        let c = codepoint;
        if c < 0x80 {
            self.putc(c as u8);
        } else if c < 0x800 {
            self.put(&[0xC0 | (c >> 6) as u8, 0x80 | (c & 0x3F) as u8]);
        } else if c.wrapping_sub(0xD800) < 0x800 {
            self.put(REPLACEMENT);
        } else if c < 0x10000 {
            self.put(&[
                0xE0 | (c >> 12) as u8,
                0x80 | ((c >> 6) & 0x3F) as u8,
                0x80 | (c & 0x3F) as u8,
            ]);
        } else if c < 0x11_0000 {
            self.put(&[
                0xF0 | (c >> 18) as u8,
                0x80 | ((c >> 12) & 0x3F) as u8,
                0x80 | ((c >> 6) & 0x3F) as u8,
                0x80 | (c & 0x3F) as u8,
            ]);
        } else {
            self.put(REPLACEMENT);
        }
    }

    /// Replace the content with `bytes`.
    pub fn set(&mut self, bytes: &[u8]) {
        self.assert_writable();
        if bytes.len() > self.data.len() {
            self.grow(bytes.len());
        }
        self.data[..bytes.len()].copy_from_slice(bytes);
        self.size = bytes.len();
    }

    /// Replace the content with a string.
    pub fn sets(&mut self, s: &str) {
        self.set(s.as_bytes());
    }

    /// Compare the start of the buffer with `prefix`.
    ///
    /// Returns the byte difference at the first mismatch, or `0` when the
    /// buffer content is a prefix of `prefix` or `prefix` is a prefix of the
    /// content.
    pub fn prefix(&self, prefix: &[u8]) -> i32 {
        for (i, &byte) in self.as_bytes().iter().enumerate() {
            let Some(&expected) = prefix.get(i) else {
                return 0;
            };
            if byte != expected {
                return i32::from(byte) - i32::from(expected);
            }
        }
        0
    }

    /// Remove `count` bytes from the front.
    pub fn slurp(&mut self, count: usize) {
        self.assert_writable();
        if count >= self.size {
            self.size = 0;
            return;
        }
        self.data.copy_within(count..self.size, 0);
        self.size -= count;
    }

    /// Shorten the content to `len` bytes, keeping the allocation.
    pub fn truncate(&mut self, len: usize) {
        self.assert_writable();
        self.size = self.size.min(len);
    }

    /// View the content as a NUL-terminated string.
    ///
    /// The terminator is written just past the content and is not counted in
    /// [`len`](Self::len), so calling this repeatedly is a no-op after the
    /// first time. Interior NUL bytes end the returned string early.
    pub fn cstr(&mut self) -> &CStr {
        self.assert_writable();
        if self.size >= self.data.len() {
            self.grow(self.size + 1);
        }
        self.data[self.size] = 0;
        CStr::from_bytes_until_nul(&self.data[..=self.size]).unwrap_or_default()
    }

    /// Append everything `reader` yields until end of input.
    ///
    /// Reads one growth unit at a time and returns the number of bytes
    /// appended.
    pub fn read_from<R: io::Read>(&mut self, mut reader: R) -> io::Result<usize> {
        self.assert_writable();
        let start = self.size;
        loop {
            self.grow(self.size + self.unit);
            match reader.read(&mut self.data[self.size..]) {
                Ok(0) => return Ok(self.size - start),
                Ok(n) => self.size += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Drop the storage, leaving an empty buffer that can be reused.
    pub fn reset(&mut self) {
        self.assert_writable();
        self.alloc.release(std::mem::take(&mut self.data));
        self.size = 0;
    }

    /// End the buffer's lifetime, handing its storage back to the allocator.
    pub fn release(mut self) {
        self.alloc.release(std::mem::take(&mut self.data));
    }
}

/// Formatting sink that writes into a fixed slice and keeps counting past it.
struct Probe<'a> {
    dst: &'a mut [u8],
    written: usize,
}

impl fmt::Write for Probe<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.written + s.len();
        if end <= self.dst.len() {
            self.dst[self.written..end].copy_from_slice(s.as_bytes());
        }
        self.written = end;
        Ok(())
    }
}

impl<A: Allocator> Drop for Buffer<A> {
    fn drop(&mut self) {
        if !self.data.is_empty() {
            self.alloc.release(std::mem::take(&mut self.data));
        }
    }
}

impl Default for Buffer<Heap> {
    fn default() -> Self {
        Self::new(SPAN_UNIT)
    }
}

impl<A: Allocator> Deref for Buffer<A> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<A: Allocator> AsRef<[u8]> for Buffer<A> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl<A: Allocator> fmt::Debug for Buffer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("content", &String::from_utf8_lossy(self.as_bytes()))
            .field("size", &self.size)
            .field("capacity", &self.data.len())
            .field("unit", &self.unit)
            .finish()
    }
}

impl<A: Allocator> fmt::Write for Buffer<A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.puts(s);
        Ok(())
    }
}

impl<A: Allocator> io::Write for Buffer<A> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.put(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<A: Allocator> PartialEq<[u8]> for Buffer<A> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl<A: Allocator> PartialEq<&[u8]> for Buffer<A> {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl<A: Allocator> PartialEq<str> for Buffer<A> {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<A: Allocator> PartialEq<&str> for Buffer<A> {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
