use std::mem::MaybeUninit;

/// A fixed-capacity block of raw storage for up to `N` elements.
///
/// Chunks are allocated uninitialized and never track which of their slots
/// hold live values; the owning deque's cursors are the single source of
/// truth for that.
#[repr(transparent)]
pub(crate) struct Chunk<T, const N: usize> {
    slots: [MaybeUninit<T>; N],
}

/// A chunk handle as stored in the deque's chunk map. Null slots in the map
/// mean "no chunk allocated here".
pub(crate) type ChunkPtr<T, const N: usize> = *mut Chunk<T, N>;

impl<T, const N: usize> Chunk<T, N> {
    /// Allocates a chunk, leaving every slot uninitialized.
    pub(crate) fn allocate() -> ChunkPtr<T, N> {
        // Going through `Box` keeps the (potentially large) array off the
        // stack.
        //
        // SAFETY: an uninitialized `[MaybeUninit<T>; N]` is a valid value of
        // the type; slots are written individually before they are read.
        let boxed = unsafe { Box::<Self>::new_uninit().assume_init() };
        Box::into_raw(boxed)
    }

    /// Releases a chunk previously returned by [`Chunk::allocate`].
    ///
    /// # Safety
    /// `chunk` must come from `allocate` and must not be used afterwards.
    /// Any live elements must have been dropped or moved out already.
    pub(crate) unsafe fn release(chunk: ChunkPtr<T, N>) {
        drop(Box::from_raw(chunk));
    }

    /// Pointer to slot `index` of `chunk`.
    ///
    /// # Safety
    /// `chunk` must be a live allocation and `index <= N`; the one-past
    /// position may be formed but not dereferenced.
    #[inline]
    pub(crate) unsafe fn slot(chunk: ChunkPtr<T, N>, index: usize) -> *mut T {
        debug_assert!(index <= N);
        (&raw mut (*chunk).slots).cast::<T>().add(index)
    }
}

#[cfg(test)]
mod tests {
    use super::Chunk;

    #[test]
    fn chunk_slots_round_trip() {
        let chunk = Chunk::<u64, 4>::allocate();
        assert!(!chunk.is_null());

        unsafe {
            for i in 0..4 {
                Chunk::slot(chunk, i).write(i as u64 * 10);
            }
            for i in 0..4 {
                assert_eq!(Chunk::slot(chunk, i).read(), i as u64 * 10);
            }
            Chunk::release(chunk);
        }
    }

    #[test]
    fn chunk_slots_are_contiguous() {
        let chunk = Chunk::<u32, 8>::allocate();

        unsafe {
            let base = Chunk::slot(chunk, 0);
            for i in 0..8 {
                assert_eq!(Chunk::slot(chunk, i), base.add(i));
            }
            Chunk::release(chunk);
        }
    }

    #[test]
    fn zero_sized_elements_allocate_and_release() {
        let chunk = Chunk::<(), 16>::allocate();
        assert!(!chunk.is_null());

        unsafe {
            Chunk::slot(chunk, 3).write(());
            Chunk::release(chunk);
        }
    }

    #[test]
    fn dropping_a_released_chunk_runs_no_element_destructors() {
        // A chunk never owns its contents; releasing one with slots that were
        // written but moved out must not touch them.
        let chunk = Chunk::<String, 2>::allocate();

        unsafe {
            Chunk::slot(chunk, 0).write(String::from("moved out"));
            let value = Chunk::slot(chunk, 0).read();
            assert_eq!(value, "moved out");
            Chunk::release(chunk);
        }
    }
}
