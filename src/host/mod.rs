//! Host-provided services: section memory, cache maintenance, the
//! data-to-instruction address mapping, and the control transfer into
//! loaded code.
//!
//! The loader itself never allocates, flushes or jumps; everything below
//! is supplied by the embedding firmware (or by a mock in tests).

use crate::base::{CodeAddr, DataAddr};

/// The services the loader consumes from its embedding.
///
/// Allocator contract, both variants: the returned buffer is word aligned,
/// writable at the returned data-bus address, zero initialized, and
/// word-granular (its backing extends to a multiple of four bytes, so the
/// word-lane primitives may read and rewrite any word overlapping it).
pub trait Host {
    /// Allocate `size` bytes that are writable on the data bus and
    /// simultaneously fetchable on the instruction bus.
    ///
    /// The returned address is the *data-bus* (writable) view; the
    /// instruction-bus alias of the same physical bytes is derived from it
    /// via [`Host::instr_alias`].
    fn alloc_exec(&mut self, size: usize) -> Option<DataAddr>;

    /// Allocate `size` bytes of plain data memory
    fn alloc_data(&mut self, size: usize) -> Option<DataAddr>;

    /// Release a buffer previously returned by one of the allocators.
    ///
    /// # Safety
    ///
    /// `addr`, `size` and `exec` must match the original allocation, and
    /// no live reference into the buffer may remain.
    unsafe fn dealloc(&mut self, addr: DataAddr, size: usize, exec: bool);

    /// The instruction-bus virtual address backed by the same physical
    /// memory as `addr`. Only meaningful for [`Host::alloc_exec`] buffers.
    fn instr_alias(&self, addr: DataAddr) -> CodeAddr;

    /// Flush `len` bytes at `addr` from the data cache so instruction
    /// fetches through the paired alias observe prior writes. The range
    /// may start and end at any byte.
    fn flush_dcache(&self, addr: usize, len: usize);

    /// Transfer control to loaded code and return its result.
    ///
    /// # Safety
    ///
    /// `entry` must be the instruction-bus alias of a loaded,
    /// fully-relocated function; every byte written to its backing
    /// allocation must have been flushed; and the callee must honor the
    /// `extern "C" fn(i32) -> i32` convention this loader documents for
    /// entry points.
    unsafe fn call(&mut self, entry: CodeAddr, arg: i32) -> i32;
}
