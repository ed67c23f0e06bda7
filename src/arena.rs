//! Per-thread bump allocator for BxDF sets (spec.md §3 `Allocator`, §5
//! "Arena contract").
//!
//! Wraps [`bumpalo::Bump`] — the ecosystem's standard arena allocator,
//! used here the way a worker-local scratch allocator is used throughout
//! the teacher's simulation crates — rather than hand-rolling a bump
//! pointer. Lifetime is exactly one pixel sample: [`Allocator::restart`]
//! resets the pointer without running destructors, so everything allocated
//! through it must be `Copy`/trivially destructible (a `Drop` impl would
//! simply never run).

use bumpalo::Bump;

pub struct Allocator {
    bump: Bump,
}

impl Allocator {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Allocate a value from the arena. The returned reference is valid
    /// until the next [`Allocator::restart`].
    pub fn alloc<T>(&self, value: T) -> &T {
        self.bump.alloc(value)
    }

    pub fn alloc_slice_copy<'a, T: Copy>(&'a self, values: &[T]) -> &'a [T] {
        self.bump.alloc_slice_copy(values)
    }

    /// Release all memory allocated since the last restart. O(1): no
    /// destructors run, matching the arena contract in spec.md §5.
    pub fn restart(&mut self) {
        self.bump.reset();
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::new()
    }
}
