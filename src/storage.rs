//! Storage engine for [`ChunkDeque`]: chunk-map bookkeeping, growth and
//! rebalancing at either end, gap reservation for interior insertion, the
//! chunk-aware bulk mover, and map compaction.
//!
//! The map is a heap array of chunk pointers with one permanently-null
//! sentinel slot on each side. Between the sentinels, `[begin_chunk,
//! end_chunk)` is the allocated sub-range; every slot outside it is null.
//! Growth prefers rebalancing chunk pointers inside the existing map and
//! only reallocates the map when the active span exceeds a third of it,
//! which keeps alternating front/back growth from thrashing the allocator.

use std::alloc::{self, Layout};
use std::ptr;

use crate::chunk::{Chunk, ChunkPtr};
use crate::cursor::RawCursor;
use crate::{ChunkDeque, CHUNK_PADDING};

fn map_layout<T, const N: usize>(slots: usize) -> Layout {
    match Layout::array::<ChunkPtr<T, N>>(slots) {
        Ok(layout) => layout,
        Err(_) => panic!("chunk map capacity overflow"),
    }
}

/// Allocates a chunk map of `slots` pointer slots, all null.
pub(crate) fn allocate_map<T, const N: usize>(slots: usize) -> *mut ChunkPtr<T, N> {
    let layout = map_layout::<T, N>(slots);
    // SAFETY: `slots` always counts at least the two sentinels, so the
    // layout is never zero-sized.
    let map = unsafe { alloc::alloc_zeroed(layout) };
    if map.is_null() {
        alloc::handle_alloc_error(layout);
    }
    map.cast()
}

/// Releases a map previously returned by [`allocate_map`] for `slots` slots.
///
/// # Safety
/// `map` must come from `allocate_map` with the same `slots`.
pub(crate) unsafe fn release_map<T, const N: usize>(map: *mut ChunkPtr<T, N>, slots: usize) {
    alloc::dealloc(map.cast(), map_layout::<T, N>(slots));
}

/// Copies the slot range `[first, last)` to `dest`; the ranges must not
/// overlap. Returns one past the last written slot.
unsafe fn copy_slots<T, const N: usize>(
    first: *mut ChunkPtr<T, N>,
    last: *mut ChunkPtr<T, N>,
    dest: *mut ChunkPtr<T, N>,
) -> *mut ChunkPtr<T, N> {
    let count = last.offset_from(first) as usize;
    ptr::copy_nonoverlapping(first, dest, count);
    dest.add(count)
}

/// Swaps `[first, last)` with the same-length range starting at `dest`,
/// walking front to back; overlapping ranges slide toward lower addresses.
/// Returns one past the last written destination slot.
unsafe fn swap_slots<T, const N: usize>(
    mut first: *mut ChunkPtr<T, N>,
    last: *mut ChunkPtr<T, N>,
    mut dest: *mut ChunkPtr<T, N>,
) -> *mut ChunkPtr<T, N> {
    while first < last {
        ptr::swap(first, dest);
        first = first.add(1);
        dest = dest.add(1);
    }
    dest
}

/// Swaps `[first, last)` with the same-length range ending at `dest_last`,
/// walking back to front; overlapping ranges slide toward higher addresses.
/// Returns the first written destination slot.
unsafe fn swap_slots_backward<T, const N: usize>(
    first: *mut ChunkPtr<T, N>,
    mut last: *mut ChunkPtr<T, N>,
    mut dest_last: *mut ChunkPtr<T, N>,
) -> *mut ChunkPtr<T, N> {
    while last > first {
        last = last.sub(1);
        dest_last = dest_last.sub(1);
        ptr::swap(last, dest_last);
    }
    dest_last
}

/// Relocates the elements in `[first, last)` so they start at `dest`,
/// walking front to back. Sources become logically uninitialized.
///
/// Correct for moves toward lower positions (`dest <= first`) and for
/// disjoint destinations.
///
/// # Safety
/// All three cursors must lie within one live map, every position touched
/// must be backed by an allocated chunk, and `[first, last)` must hold
/// initialized elements.
pub(crate) unsafe fn move_range<T, const N: usize>(
    mut first: RawCursor<T, N>,
    last: RawCursor<T, N>,
    mut dest: RawCursor<T, N>,
) {
    let mut remaining = last.distance_from(&first) as usize;
    while remaining > 0 {
        // The run is bounded by whichever of the two chunks ends first.
        let run = remaining.min(N - first.index).min(N - dest.index);
        ptr::copy(first.element(), dest.element(), run);
        first = first.offset(run as isize);
        dest = dest.offset(run as isize);
        remaining -= run;
    }
}

/// Relocates the elements in `[first, last)` so they end at `dest_last`,
/// walking back to front. Sources become logically uninitialized.
///
/// Correct for moves toward higher positions and for disjoint destinations.
///
/// # Safety
/// As for [`move_range`].
pub(crate) unsafe fn move_range_backward<T, const N: usize>(
    first: RawCursor<T, N>,
    mut last: RawCursor<T, N>,
    mut dest_last: RawCursor<T, N>,
) {
    let mut remaining = last.distance_from(&first) as usize;
    while remaining > 0 {
        // Exclusive end positions: index 0 means the run ends at the
        // boundary of the previous chunk, which has N slots to offer.
        let src_room = if last.index == 0 { N } else { last.index };
        let dst_room = if dest_last.index == 0 { N } else { dest_last.index };
        let run = remaining.min(src_room).min(dst_room);
        let src = last.offset(-(run as isize));
        let dst = dest_last.offset(-(run as isize));
        ptr::copy(src.element(), dst.element(), run);
        last = src;
        dest_last = dst;
        remaining -= run;
    }
}

/// Drops every element in `[first, last)` in place.
///
/// # Safety
/// The range must hold initialized elements backed by allocated chunks, and
/// must not be read again afterwards.
pub(crate) unsafe fn drop_range<T, const N: usize>(
    mut first: RawCursor<T, N>,
    last: RawCursor<T, N>,
) {
    while first != last {
        let run = if first.outer == last.outer {
            last.index - first.index
        } else {
            N - first.index
        };
        ptr::drop_in_place(ptr::slice_from_raw_parts_mut(first.element(), run));
        first = first.offset(run as isize);
    }
}

impl<T, const N: usize> ChunkDeque<T, N> {
    /// Re-parks the back cursor after it ran off the end of its chunk.
    /// Reuses allocated slack, installs a fresh chunk into a free map slot,
    /// or makes room at the map level when the map itself is exhausted.
    ///
    /// # Safety
    /// Must only be called by a back-growth path that just normalized the
    /// back cursor past a chunk boundary (`index == N` before the call).
    pub(crate) unsafe fn grow_back_slot(&mut self) {
        self.tail.to_next_chunk();
        if self.tail.outer == self.data.add(self.num_chunks) {
            self.make_room_back(1);
        } else if (*self.tail.outer).is_null() {
            // The slot right after the allocated range; extend it by one.
            *self.tail.outer = Chunk::allocate();
            self.end_chunk = self.end_chunk.add(1);
        }
    }

    /// Re-parks the front cursor on the last slot of the chunk before it.
    /// The mirror of [`grow_back_slot`](Self::grow_back_slot).
    ///
    /// # Safety
    /// Must only be called by a front-growth path with the front cursor at
    /// index 0 of its chunk.
    pub(crate) unsafe fn grow_front_slot(&mut self) {
        if self.head.outer == self.data {
            self.make_room_front(1);
        } else if self.head.outer == self.begin_chunk {
            *self.head.outer.sub(1) = Chunk::allocate();
            self.begin_chunk = self.begin_chunk.sub(1);
        }
        self.head.outer = self.head.outer.wrapping_sub(1);
        self.head.index = N - 1;
    }

    /// Ensures `new_chunks` allocated chunks exist strictly after the chunk
    /// holding the last live element, growing the map if it cannot absorb
    /// them. Chunk pointers may move within the map; element addresses do
    /// not change unless the map is replaced, and even then chunks keep
    /// their identity.
    pub(crate) unsafe fn make_room_back(&mut self, new_chunks: usize) {
        let head_chunk = self.head.outer;
        let mut tail_chunk = self.tail.outer;
        // The back cursor may be parked on an unallocated slot while a push
        // is in flight; only count its chunk when it actually owns one.
        if !(*self.tail.outer).is_null() {
            tail_chunk = tail_chunk.add(1);
        }
        let active = tail_chunk.offset_from(head_chunk) as usize + new_chunks;
        if active <= self.num_chunks / 3 {
            self.rearrange_back(new_chunks, head_chunk, tail_chunk);
        } else {
            self.reallocate_back(new_chunks, head_chunk, tail_chunk);
        }
    }

    /// Ensures `new_chunks` allocated chunks exist strictly before the chunk
    /// holding the first live element. Mirror of
    /// [`make_room_back`](Self::make_room_back).
    pub(crate) unsafe fn make_room_front(&mut self, new_chunks: usize) {
        let head_chunk = self.head.outer;
        let tail_chunk = self.tail.outer.add(1);
        let active = tail_chunk.offset_from(head_chunk) as usize + new_chunks;
        if active <= self.num_chunks / 3 {
            self.rearrange_front(new_chunks, head_chunk, tail_chunk);
        } else {
            self.reallocate_front(new_chunks, head_chunk, tail_chunk);
        }
    }

    /// Recenters the live chunk span inside the existing map so that
    /// `new_chunks` allocated chunks follow it, reusing allocated slack
    /// wherever possible. `begin_chunk`/`end_chunk` are updated step by
    /// step, so the structure stays consistent throughout.
    unsafe fn rearrange_back(
        &mut self,
        new_chunks: usize,
        head_chunk: *mut ChunkPtr<T, N>,
        tail_chunk: *mut ChunkPtr<T, N>,
    ) {
        let num_elements = self.len();
        let active = tail_chunk.offset_from(head_chunk) as usize + new_chunks;
        let new_begin_chunk = self.data.add((self.num_chunks - active) / 2);
        let new_tail_chunk = swap_slots(head_chunk, tail_chunk, new_begin_chunk);
        self.head.outer = new_begin_chunk;
        self.tail = self.head.offset(num_elements as isize);
        if self.begin_chunk > new_begin_chunk {
            // Allocated slack was stranded around the old live span; pull it
            // into one contiguous run right after the moved live chunks.
            let fill_pos = if self.begin_chunk <= new_tail_chunk {
                // `[new_tail_chunk, head_chunk)` was already slack, so the
                // allocated run currently extends up to the old head slot.
                head_chunk
            } else {
                swap_slots(self.begin_chunk, head_chunk, new_tail_chunk)
            };
            let overlap = if self.begin_chunk <= new_tail_chunk {
                new_tail_chunk.offset_from(self.begin_chunk) as usize
            } else {
                0
            };
            // Slack swapped into the old live slots sits at their tail end.
            let src_begin = tail_chunk.sub(overlap);
            self.end_chunk = swap_slots(src_begin, self.end_chunk, fill_pos);
            self.begin_chunk = new_begin_chunk;
            let new_end_chunk = new_begin_chunk.add(active);
            let balanced = self.end_chunk <= new_end_chunk.add(1);
            while self.end_chunk < new_end_chunk {
                *self.end_chunk = Chunk::allocate();
                self.end_chunk = self.end_chunk.add(1);
            }
            if balanced {
                return;
            }
        }
        let left = new_begin_chunk.offset_from(self.begin_chunk);
        let right = self.end_chunk.offset_from(new_tail_chunk) - new_chunks as isize;
        self.center(left, right);
    }

    /// Mirror of [`rearrange_back`](Self::rearrange_back): recenters the
    /// live chunk span so that `new_chunks` allocated chunks precede it.
    unsafe fn rearrange_front(
        &mut self,
        new_chunks: usize,
        head_chunk: *mut ChunkPtr<T, N>,
        tail_chunk: *mut ChunkPtr<T, N>,
    ) {
        let num_elements = self.len();
        let live = tail_chunk.offset_from(head_chunk) as usize;
        let active = live + new_chunks;
        let new_begin_chunk = self.data.add((self.num_chunks - active) / 2);
        let new_head_chunk = new_begin_chunk.add(new_chunks);
        let new_tail_chunk = new_head_chunk.add(live);
        swap_slots_backward(head_chunk, tail_chunk, new_tail_chunk);
        self.head.outer = new_head_chunk;
        self.tail = self.head.offset(num_elements as isize);
        if self.end_chunk < new_tail_chunk {
            let fill_end = if self.end_chunk >= new_head_chunk {
                // `[tail_chunk, new_head_chunk)` was already slack, so the
                // allocated run currently extends down to the old tail slot.
                tail_chunk
            } else {
                swap_slots_backward(tail_chunk, self.end_chunk, new_head_chunk)
            };
            let overlap = if self.end_chunk >= new_head_chunk {
                self.end_chunk.offset_from(new_head_chunk) as usize
            } else {
                0
            };
            // Slack swapped into the old live slots sits at their head end.
            let src_end = head_chunk.add(overlap);
            self.begin_chunk = swap_slots_backward(self.begin_chunk, src_end, fill_end);
            self.end_chunk = new_tail_chunk;
            let balanced = self.begin_chunk >= new_begin_chunk.sub(1);
            while self.begin_chunk > new_begin_chunk {
                let slot = self.begin_chunk.sub(1);
                *slot = Chunk::allocate();
                self.begin_chunk = slot;
            }
            if balanced {
                return;
            }
        }
        let left = new_head_chunk.offset_from(self.begin_chunk) - new_chunks as isize;
        let right = self.end_chunk.offset_from(new_tail_chunk);
        self.center(left, right);
    }

    /// Replaces the map with one of `3 * active + 2` slots and recenters the
    /// live chunk span in it. Chunks themselves never move, so element
    /// addresses are stable across the swap. The old map is freed only after
    /// the new one is fully populated.
    unsafe fn reallocate_back(
        &mut self,
        new_chunks: usize,
        head_chunk: *mut ChunkPtr<T, N>,
        tail_chunk: *mut ChunkPtr<T, N>,
    ) {
        let num_elements = self.len();
        let active = tail_chunk.offset_from(head_chunk) as usize + new_chunks;
        let new_num_chunks = active * 3;
        let new_map = allocate_map::<T, N>(new_num_chunks + 2);
        let new_data = new_map.add(1);
        let new_begin_chunk = new_data.add(active);
        let new_end_chunk = new_begin_chunk.add(active);
        // The live chunks and the slack after them keep their order.
        let copied = copy_slots(head_chunk, self.end_chunk, new_begin_chunk);
        let needed = new_end_chunk.offset_from(copied);
        debug_assert!(needed > 0);
        let free_left = head_chunk.offset_from(self.begin_chunk);
        if needed <= free_left {
            // Enough slack before the old live span to cover the deficit;
            // recycle it, splitting the leftovers across both sides.
            let half = (free_left - needed) / 2;
            let remain = head_chunk.sub((needed + half) as usize);
            self.end_chunk = copy_slots(remain, head_chunk, copied);
            let keep_below = remain.offset_from(self.begin_chunk) as usize;
            let dest = new_begin_chunk.sub(keep_below);
            copy_slots(self.begin_chunk, remain, dest);
            self.begin_chunk = dest;
        } else {
            let fill = copy_slots(self.begin_chunk, head_chunk, copied);
            let mut slot = fill;
            while slot < new_end_chunk {
                *slot = Chunk::allocate();
                slot = slot.add(1);
            }
            self.begin_chunk = new_begin_chunk;
            self.end_chunk = new_end_chunk;
        }
        release_map(self.data.sub(1), self.num_chunks + 2);
        self.data = new_data;
        self.num_chunks = new_num_chunks;
        self.head.outer = new_begin_chunk;
        self.tail = self.head.offset(num_elements as isize);
    }

    /// Mirror of [`reallocate_back`](Self::reallocate_back).
    unsafe fn reallocate_front(
        &mut self,
        new_chunks: usize,
        head_chunk: *mut ChunkPtr<T, N>,
        tail_chunk: *mut ChunkPtr<T, N>,
    ) {
        let num_elements = self.len();
        let active = tail_chunk.offset_from(head_chunk) as usize + new_chunks;
        let new_num_chunks = active * 3;
        let new_map = allocate_map::<T, N>(new_num_chunks + 2);
        let new_data = new_map.add(1);
        let new_begin_chunk = new_data.add(active);
        let new_end_chunk = new_begin_chunk.add(active);
        // The slack before the live chunks and the live chunks keep their
        // order, aligned so the live tail lands at the centered end.
        let copied = tail_chunk.offset_from(self.begin_chunk) as usize;
        let missing_end = new_end_chunk.sub(copied);
        copy_slots(self.begin_chunk, tail_chunk, missing_end);
        let needed = missing_end.offset_from(new_begin_chunk);
        debug_assert!(needed > 0);
        let free_right = self.end_chunk.offset_from(tail_chunk);
        if needed <= free_right {
            let half = (free_right - needed) / 2;
            let remain = tail_chunk.add((needed + half) as usize);
            let taken = remain.offset_from(tail_chunk) as usize;
            let dest = missing_end.sub(taken);
            copy_slots(tail_chunk, remain, dest);
            self.begin_chunk = dest;
            self.end_chunk = copy_slots(remain, self.end_chunk, new_end_chunk);
        } else {
            let taken = self.end_chunk.offset_from(tail_chunk) as usize;
            let fill_end = missing_end.sub(taken);
            copy_slots(tail_chunk, self.end_chunk, fill_end);
            let mut slot = new_begin_chunk;
            while slot < fill_end {
                *slot = Chunk::allocate();
                slot = slot.add(1);
            }
            self.begin_chunk = new_begin_chunk;
            self.end_chunk = new_end_chunk;
        }
        release_map(self.data.sub(1), self.num_chunks + 2);
        self.data = new_data;
        self.num_chunks = new_num_chunks;
        self.head.outer = new_begin_chunk.add(new_chunks);
        self.tail = self.head.offset(num_elements as isize);
    }

    /// Evens out the allocated slack on the two sides of the live span by
    /// swapping `(right - left) / 2` chunk pointers across it.
    unsafe fn center(&mut self, left: isize, right: isize) {
        let donation = (right - left) / 2;
        if donation >= 0 {
            // Too many on the right.
            let donation = donation as usize;
            self.begin_chunk = self.begin_chunk.sub(donation);
            swap_slots(
                self.end_chunk.sub(donation),
                self.end_chunk,
                self.begin_chunk,
            );
            self.end_chunk = self.end_chunk.sub(donation);
        } else {
            // Too many on the left.
            let donation = (-donation) as usize;
            self.end_chunk = swap_slots(
                self.begin_chunk,
                self.begin_chunk.add(donation),
                self.end_chunk,
            );
            self.begin_chunk = self.begin_chunk.add(donation);
        }
    }

    /// Opens a gap of `amount` raw element slots before position `index`,
    /// relocating the suffix toward the back. Storage is secured first, so
    /// the relocation itself cannot fail. Returns the cursor of the first
    /// gap slot.
    ///
    /// The live-range cursors are *not* advanced; the caller fills the gap
    /// and then moves the back cursor (directly for infallible fills, via
    /// [`GapGuard`] when user code runs in between).
    ///
    /// # Safety
    /// `index <= len` and `amount > 0`.
    pub(crate) unsafe fn open_gap_back(&mut self, index: usize, amount: usize) -> RawCursor<T, N> {
        debug_assert!(amount > 0);
        let offset = self.len() - index;
        let map_end = RawCursor::<T, N>::at_edge(self.data.add(self.num_chunks));
        let remain = map_end.distance_from(&self.tail) as usize;
        // `<=` and not `<`: the back cursor itself must land inside an
        // allocated chunk after the shift.
        if remain <= amount {
            let origin = RawCursor::<T, N>::at_edge(self.data);
            let ghost_end = self.tail.distance_from(&origin) as usize + amount;
            let new_end_idx = ghost_end / N + 1;
            let tail_chunk_idx = self.tail.outer.offset_from(self.data) as usize + 1;
            self.make_room_back(new_end_idx - tail_chunk_idx);
        } else {
            let fill_end = self.tail.offset(amount as isize).outer.add(1);
            if self.end_chunk < fill_end {
                while self.end_chunk < fill_end {
                    *self.end_chunk = Chunk::allocate();
                    self.end_chunk = self.end_chunk.add(1);
                }
            }
        }
        let pos = self.tail.offset(-(offset as isize));
        if offset > 0 {
            move_range_backward(pos, self.tail, self.tail.offset(amount as isize));
        }
        pos
    }

    /// Mirror of [`open_gap_back`](Self::open_gap_back): opens the gap by
    /// relocating the prefix toward the front. Returns the cursor of the
    /// first gap slot; the caller moves the front cursor back by `amount`
    /// once the gap is filled.
    ///
    /// # Safety
    /// `index <= len` and `amount > 0`.
    pub(crate) unsafe fn open_gap_front(&mut self, index: usize, amount: usize) -> RawCursor<T, N> {
        debug_assert!(amount > 0);
        let origin = RawCursor::<T, N>::at_edge(self.data);
        let remain = self.head.distance_from(&origin);
        if remain < amount as isize {
            let ghost_begin = remain - amount as isize;
            let ghost_begin_chunk = ghost_begin.div_euclid(N as isize);
            let head_chunk_idx = self.head.outer.offset_from(self.data);
            self.make_room_front((head_chunk_idx - ghost_begin_chunk) as usize);
        } else {
            let fill_start = self.head.offset(-(amount as isize)).outer;
            if fill_start < self.begin_chunk {
                let mut slot = fill_start;
                while slot < self.begin_chunk {
                    *slot = Chunk::allocate();
                    slot = slot.add(1);
                }
                self.begin_chunk = fill_start;
            }
        }
        let pos = self.head.offset(index as isize);
        if index > 0 {
            move_range(self.head, pos, self.head.offset(-(amount as isize)));
        }
        pos.offset(-(amount as isize))
    }

    /// Closes the hole `[first, last)` left by a range removal. On entry the
    /// live range has been truncated to `[head, first)` with the detached
    /// suffix still sitting at `[last, old_tail)`; the cheaper side is
    /// relocated over the hole.
    ///
    /// # Safety
    /// `head <= first <= last <= old_tail` (in element positions), with the
    /// prefix and suffix initialized and the hole raw.
    pub(crate) unsafe fn close_gap(
        &mut self,
        first: RawCursor<T, N>,
        last: RawCursor<T, N>,
        old_tail: RawCursor<T, N>,
    ) {
        let hole = last.distance_from(&first);
        if hole == 0 {
            self.tail = old_tail;
            return;
        }
        let before = first.distance_from(&self.head);
        let after = old_tail.distance_from(&last);
        if before <= after {
            if before > 0 {
                move_range_backward(self.head, first, last);
            }
            self.head = self.head.offset(hole);
            self.tail = old_tail;
        } else {
            move_range(last, old_tail, first);
            self.tail = old_tail.offset(-hole);
        }
    }

    /// The compaction pass behind `shrink_to_fit`: slides the live range to
    /// the front of its first chunk, frees the chunks that no longer hold
    /// anything, and replaces the map with a tightly sized one. The new map
    /// is allocated before anything is freed.
    pub(crate) fn compact_storage(&mut self) {
        unsafe {
            let head_chunk = self.head.outer;
            let mut tail_chunk = self.tail.outer.add(1);
            let ghost_capacity = self.num_chunks * N;
            let minimum_capacity = CHUNK_PADDING * N;
            let num_elements = self.len();
            let needed_capacity = num_elements + 1;
            let occupied_capacity = tail_chunk.offset_from(head_chunk) as usize * N;
            if needed_capacity + N > occupied_capacity
                && (occupied_capacity == ghost_capacity || occupied_capacity <= minimum_capacity)
            {
                return;
            }
            if needed_capacity + N <= occupied_capacity {
                // At least one chunk can be reclaimed by sliding the live
                // range to the front of its first chunk.
                let new_head = RawCursor::at(head_chunk, 0);
                move_range(self.head, self.tail, new_head);
                self.head = new_head;
                self.tail = new_head.offset(num_elements as isize);
                tail_chunk = self.tail.outer.add(1);
            }
            let new_num_chunks = needed_capacity.div_ceil(N);
            let new_map = allocate_map::<T, N>(new_num_chunks + 2);
            let new_data = new_map.add(1);
            // Free spare chunks slot by slot so the bookkeeping never lies.
            while self.begin_chunk != head_chunk {
                Chunk::release(*self.begin_chunk);
                *self.begin_chunk = ptr::null_mut();
                self.begin_chunk = self.begin_chunk.add(1);
            }
            while self.end_chunk != tail_chunk {
                self.end_chunk = self.end_chunk.sub(1);
                Chunk::release(*self.end_chunk);
                *self.end_chunk = ptr::null_mut();
            }
            copy_slots(self.begin_chunk, self.end_chunk, new_data);
            release_map(self.data.sub(1), self.num_chunks + 2);
            let kept = self.end_chunk.offset_from(self.begin_chunk) as usize;
            debug_assert_eq!(kept, new_num_chunks);
            self.data = new_data;
            self.num_chunks = new_num_chunks;
            self.begin_chunk = new_data;
            self.end_chunk = new_data.add(kept);
            self.head = RawCursor::at(new_data, self.head.index);
            self.tail = self.head.offset(num_elements as isize);
        }
    }
}

/// Scope guard for filling a freshly opened gap with values produced by
/// user code (clones, closures). If that code panics mid-fill, the guard
/// drops whatever was already written and slides the displaced run back, so
/// the deque re-exits in exactly its pre-call state. On success, `commit`
/// publishes the gap by moving the corresponding live-range cursor.
pub(crate) struct GapGuard<'a, T, const N: usize> {
    deque: &'a mut ChunkDeque<T, N>,
    gap: RawCursor<T, N>,
    cursor: RawCursor<T, N>,
    amount: usize,
    filled: usize,
    at_back: bool,
}

impl<'a, T, const N: usize> GapGuard<'a, T, N> {
    pub(crate) fn back(
        deque: &'a mut ChunkDeque<T, N>,
        gap: RawCursor<T, N>,
        amount: usize,
    ) -> Self {
        Self {
            deque,
            gap,
            cursor: gap,
            amount,
            filled: 0,
            at_back: true,
        }
    }

    pub(crate) fn front(
        deque: &'a mut ChunkDeque<T, N>,
        gap: RawCursor<T, N>,
        amount: usize,
    ) -> Self {
        Self {
            deque,
            gap,
            cursor: gap,
            amount,
            filled: 0,
            at_back: false,
        }
    }

    /// Writes the next gap slot.
    pub(crate) fn push(&mut self, value: T) {
        debug_assert!(self.filled < self.amount);
        // SAFETY: the gap consists of `amount` raw slots in allocated
        // chunks; `cursor` has advanced `filled < amount` times.
        unsafe { ptr::write(self.cursor.element(), value) };
        self.cursor.advance();
        self.filled += 1;
    }

    /// Publishes the filled gap and defuses the guard.
    pub(crate) fn commit(self) {
        debug_assert_eq!(self.filled, self.amount);
        let amount = self.amount as isize;
        // SAFETY: every gap slot is initialized, so extending the live
        // range over it restores all invariants.
        unsafe {
            if self.at_back {
                self.deque.tail = self.deque.tail.offset(amount);
            } else {
                self.deque.head = self.deque.head.offset(-amount);
            }
        }
        std::mem::forget(self);
    }
}

impl<T, const N: usize> Drop for GapGuard<'_, T, N> {
    fn drop(&mut self) {
        let amount = self.amount as isize;
        // SAFETY: `[gap, gap + filled)` holds the values written so far;
        // the displaced run sits `amount` positions away from its original
        // location and moving it back restores the pre-call layout.
        unsafe {
            drop_range(self.gap, self.gap.offset(self.filled as isize));
            if self.at_back {
                move_range(
                    self.gap.offset(amount),
                    self.deque.tail.offset(amount),
                    self.gap,
                );
            } else {
                move_range_backward(
                    self.deque.head.offset(-amount),
                    self.gap,
                    self.gap.offset(amount),
                );
            }
        }
    }
}
