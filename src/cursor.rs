use crate::chunk::{Chunk, ChunkPtr};

/// A position within the two-level storage: a map slot plus an offset into
/// the chunk that slot points at.
///
/// Navigation (`advance`, `retreat`, `offset`) is plain pointer arithmetic on
/// the map and never touches chunk memory, so it is safe even when the cursor
/// is parked on an unallocated slot or a sentinel. Only [`element`]
/// dereferences, and it states its requirements.
///
/// While a cursor is parked on a chunk its `index` stays in `0..N`; the
/// one-past-the-chunk position is normalized to index `0` of the next map
/// slot.
///
/// [`element`]: RawCursor::element
pub(crate) struct RawCursor<T, const N: usize> {
    /// Slot in the chunk map holding the pointer to the current chunk.
    pub(crate) outer: *mut ChunkPtr<T, N>,
    /// Offset within the current chunk, in `0..N`.
    pub(crate) index: usize,
}

impl<T, const N: usize> RawCursor<T, N> {
    #[inline]
    pub(crate) fn at(outer: *mut ChunkPtr<T, N>, index: usize) -> Self {
        debug_assert!(index < N);
        Self { outer, index }
    }

    /// A cursor parked at the first slot of map position `outer`, used for
    /// the two addressable edges of the map. Unlike [`at`](RawCursor::at),
    /// no chunk is implied to exist there.
    #[inline]
    pub(crate) fn at_edge(outer: *mut ChunkPtr<T, N>) -> Self {
        Self { outer, index: 0 }
    }

    /// Pointer to the element slot under the cursor.
    ///
    /// # Safety
    /// `outer` must point into a live chunk map and the slot it addresses
    /// must hold an allocated chunk.
    #[inline]
    pub(crate) unsafe fn element(&self) -> *mut T {
        Chunk::slot(*self.outer, self.index)
    }

    /// Moves to the first slot of the next chunk.
    #[inline]
    pub(crate) fn to_next_chunk(&mut self) {
        self.outer = self.outer.wrapping_add(1);
        self.index = 0;
    }

    /// Steps one element forward, crossing the chunk boundary if needed.
    #[inline]
    pub(crate) fn advance(&mut self) {
        self.index += 1;
        if self.index == N {
            self.to_next_chunk();
        }
    }

    /// Steps one element backward, crossing the chunk boundary if needed.
    #[inline]
    pub(crate) fn retreat(&mut self) {
        if self.index == 0 {
            self.outer = self.outer.wrapping_sub(1);
            self.index = N - 1;
        } else {
            self.index -= 1;
        }
    }

    /// The cursor `delta` elements away. Floored division keeps negative
    /// deltas landing in the right chunk.
    pub(crate) fn offset(&self, delta: isize) -> Self {
        let total = self.index as isize + delta;
        let chunks = total.div_euclid(N as isize);
        let index = total.rem_euclid(N as isize) as usize;
        Self {
            outer: self.outer.wrapping_offset(chunks),
            index,
        }
    }

    /// Number of element positions from `origin` up to `self`; negative when
    /// `self` lies before `origin`.
    ///
    /// # Safety
    /// Both cursors must point into the same chunk map.
    pub(crate) unsafe fn distance_from(&self, origin: &Self) -> isize {
        self.outer.offset_from(origin.outer) * N as isize + self.index as isize
            - origin.index as isize
    }
}

impl<T, const N: usize> Clone for RawCursor<T, N> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const N: usize> Copy for RawCursor<T, N> {}

impl<T, const N: usize> PartialEq for RawCursor<T, N> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.outer == other.outer && self.index == other.index
    }
}

impl<T, const N: usize> Eq for RawCursor<T, N> {}

#[cfg(test)]
mod tests {
    use super::RawCursor;
    use crate::chunk::{Chunk, ChunkPtr};

    fn with_map<const N: usize>(chunks: usize, test: impl FnOnce(*mut ChunkPtr<u32, N>)) {
        let mut map: Vec<ChunkPtr<u32, N>> = (0..chunks).map(|_| Chunk::allocate()).collect();
        test(map.as_mut_ptr());
        for chunk in map {
            unsafe { Chunk::release(chunk) };
        }
    }

    #[test]
    fn advance_and_retreat_cross_chunk_boundaries() {
        with_map::<3>(2, |map| {
            let mut sut: RawCursor<u32, 3> = RawCursor::at(map, 2);

            sut.advance();
            assert_eq!(sut.outer, map.wrapping_add(1));
            assert_eq!(sut.index, 0);

            sut.retreat();
            assert_eq!(sut.outer, map);
            assert_eq!(sut.index, 2);
        });
    }

    #[test]
    fn offset_uses_floored_chunk_arithmetic() {
        with_map::<4>(4, |map| {
            let sut: RawCursor<u32, 4> = RawCursor::at(map.wrapping_add(1), 1);

            let forward = sut.offset(7);
            assert_eq!(forward.outer, map.wrapping_add(3));
            assert_eq!(forward.index, 0);

            let backward = sut.offset(-2);
            assert_eq!(backward.outer, map);
            assert_eq!(backward.index, 3);

            let same = sut.offset(0);
            assert!(same == sut);
        });
    }

    #[test]
    fn distance_is_the_inverse_of_offset() {
        with_map::<5>(3, |map| {
            let origin: RawCursor<u32, 5> = RawCursor::at(map.wrapping_add(1), 3);

            for delta in -8..=11 {
                let moved = origin.offset(delta);
                assert_eq!(unsafe { moved.distance_from(&origin) }, delta);
            }
        });
    }

    #[test]
    fn element_addresses_the_expected_slot() {
        with_map::<4>(1, |map| {
            let sut: RawCursor<u32, 4> = RawCursor::at(map, 2);

            unsafe {
                assert_eq!(sut.element(), Chunk::slot(*map, 2));
                sut.element().write(99);
                assert_eq!(sut.element().read(), 99);
            }
        });
    }
}
