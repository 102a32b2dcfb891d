//! Growable byte buffers and handle stacks for markup rendering.
//!
//! Every intermediate and output string produced by the renderer lives in a
//! [`Buffer`]: an append-mostly byte sequence that grows in whole multiples of
//! a fixed unit through a pluggable [`Allocator`] strategy. [`Stack`] is the
//! matching LIFO of borrowed handles that document drivers use to track
//! nesting.
//!
//! # Failure model
//!
//! Allocation failure is not recoverable. A buffer that failed to grow has no
//! consistent state to fall back to, so [`Heap`] aborts the process through
//! [`std::alloc::handle_alloc_error`] instead of returning an error.
//!
//! # Example
//!
//! ```
//! use rw_buffer::Buffer;
//!
//! let mut buf = Buffer::new(16);
//! buf.puts("<p>");
//! buf.printf(format_args!("{}", 42));
//! buf.putc(b'!');
//! assert_eq!(buf, "<p>42!");
//! assert_eq!(buf.capacity(), 16);
//! ```

mod alloc;
mod buffer;
mod stack;

pub use alloc::{Allocator, Heap, allocation_failed};
pub use buffer::{BLOCK_UNIT, Buffer, SPAN_UNIT};
pub use stack::{DEFAULT_STACK_SIZE, Stack};
