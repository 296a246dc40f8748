//! Fixed capacity single-producer/single-consumer block queue.
//!
//! Blocks are built in place at the head by the producer and consumed in place
//! at the tail by the step ticker; nothing is copied or allocated per move.
//! Each index is written by exactly one side. One slot is always left empty so
//! full and empty can be told apart without a shared counter.
//!
//! Besides the indices, the only state shared between the two contexts are the
//! per-slot `locked` and `ticking` flags:
//!
//! - the producer raises `locked`, then checks `ticking` before rewriting a
//!   committed block ([`Producer::with_block_mut`]);
//! - the consumer raises `ticking`, then checks `locked` before executing the
//!   tail ([`Consumer::try_acquire_tail`]).
//!
//! Both use sequentially consistent ordering, so at most one side wins. The
//! consumer never waits: it backs off and retries on the next tick.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::block::Block;

struct Slot {
    locked: AtomicBool,
    ticking: AtomicBool,
    block: UnsafeCell<Block>,
}

impl Slot {
    fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            ticking: AtomicBool::new(false),
            block: UnsafeCell::new(Block::new()),
        }
    }
}

/// Ring buffer of `N` preallocated blocks, `N - 1` of them usable.
pub struct MoveQueue<const N: usize> {
    slots: [Slot; N],
    read: AtomicUsize,
    write: AtomicUsize,
}

// SAFETY: block data is only reached through `Producer`/`Consumer`, which are
// unique per queue (`split` borrows mutably) and follow the slot protocol above.
unsafe impl<const N: usize> Sync for MoveQueue<N> {}

impl<const N: usize> Default for MoveQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MoveQueue<N> {
    /// Create an empty queue.
    ///
    /// # Panics
    ///
    /// Panics if `N < 2`; such a queue could never hold a block.
    pub fn new() -> Self {
        assert!(N >= 2, "move queue needs at least two slots");
        Self {
            slots: core::array::from_fn(|_| Slot::new()),
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    /// Number of blocks the queue can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Split into the producer, consumer and read-only status handles.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>, QueueStatus<'_, N>) {
        let queue: &MoveQueue<N> = self;
        let cursor = queue.write.load(Ordering::Relaxed);
        (
            Producer { queue, cursor },
            Consumer { queue },
            QueueStatus { queue },
        )
    }

    #[inline]
    const fn next(n: usize) -> usize {
        (n + 1) % N
    }

    #[inline]
    const fn prev(n: usize) -> usize {
        if n == 0 {
            N - 1
        } else {
            n - 1
        }
    }

    fn is_empty(&self) -> bool {
        self.read.load(Ordering::Acquire) == self.write.load(Ordering::Acquire)
    }

    fn is_full(&self) -> bool {
        Self::next(self.write.load(Ordering::Acquire)) == self.read.load(Ordering::Acquire)
    }

    fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        (write + N - read) % N
    }
}

/// Read-only view of the queue fill state, usable from either context.
#[derive(Clone, Copy)]
pub struct QueueStatus<'q, const N: usize> {
    queue: &'q MoveQueue<N>,
}

impl<'q, const N: usize> QueueStatus<'q, N> {
    /// No committed blocks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// No room for another commit.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Number of committed blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Usable capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Producer side: builds blocks at the head and replans committed ones.
pub struct Producer<'q, const N: usize> {
    queue: &'q MoveQueue<N>,
    cursor: usize,
}

impl<'q, const N: usize> Producer<'q, N> {
    /// No committed blocks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// No room for another commit.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Slot index of the head (the block being built).
    #[inline]
    pub fn head_index(&self) -> usize {
        self.queue.write.load(Ordering::Relaxed)
    }

    /// The block being built. Always available; it is not visible to the
    /// consumer until [`commit_head`](Self::commit_head) succeeds.
    pub fn head(&mut self) -> &mut Block {
        let idx = self.head_index();
        // SAFETY: the consumer never reads the slot at the write index, and
        // `&mut self` rules out any other producer reference.
        unsafe { &mut *self.queue.slots[idx].block.get() }
    }

    /// Publish the head block. Returns `false` (and changes nothing) when full.
    pub fn commit_head(&mut self) -> bool {
        if self.queue.is_full() {
            return false;
        }
        let next = MoveQueue::<N>::next(self.head_index());
        self.queue.write.store(next, Ordering::Release);
        true
    }

    /// Read a block by slot index.
    ///
    /// Intended for the head and committed blocks; the consumer never writes
    /// block memory so shared reads are always coherent.
    pub fn block(&self, idx: usize) -> &Block {
        // SAFETY: only the producer writes blocks, and it needs `&mut self` to do so.
        unsafe { &*self.queue.slots[idx % N].block.get() }
    }

    /// Rewrite a block unless the consumer is executing it.
    ///
    /// Returns `None` without calling `f` when the block is ticking.
    pub fn with_block_mut<R>(&mut self, idx: usize, f: impl FnOnce(&mut Block) -> R) -> Option<R> {
        let slot = &self.queue.slots[idx % N];
        slot.locked.store(true, Ordering::SeqCst);
        if slot.ticking.load(Ordering::SeqCst) {
            slot.locked.store(false, Ordering::SeqCst);
            return None;
        }
        // SAFETY: `locked` is raised and `ticking` was clear, so the consumer
        // will not acquire this slot until `locked` drops again.
        let result = f(unsafe { &mut *slot.block.get() });
        slot.locked.store(false, Ordering::SeqCst);
        Some(result)
    }

    /// `true` if the consumer is currently executing the block.
    #[inline]
    pub fn is_ticking(&self, idx: usize) -> bool {
        self.queue.slots[idx % N].ticking.load(Ordering::SeqCst)
    }

    /// Place the iteration cursor at the head.
    #[inline]
    pub fn start_iteration(&mut self) {
        self.cursor = self.head_index();
    }

    /// Slot index under the cursor.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor one block toward the tail and return its slot index.
    ///
    /// The cursor never moves past the tail.
    pub fn step_toward_tail(&mut self) -> usize {
        if !self.at_tail() {
            self.cursor = MoveQueue::<N>::prev(self.cursor);
        }
        self.cursor
    }

    /// Move the cursor one block toward the head and return its slot index.
    pub fn step_toward_head(&mut self) -> usize {
        if !self.at_head() {
            self.cursor = MoveQueue::<N>::next(self.cursor);
        }
        self.cursor
    }

    /// `true` when the cursor is on the tail.
    ///
    /// A cursor the consumer has released blocks past also counts as being at
    /// the tail.
    pub fn at_tail(&self) -> bool {
        let read = self.queue.read.load(Ordering::Acquire);
        let live = (self.head_index() + N - read) % N;
        let offset = (self.cursor + N - read) % N;
        offset == 0 || offset > live
    }

    /// `true` when the cursor is on the head.
    #[inline]
    pub fn at_head(&self) -> bool {
        self.cursor == self.head_index()
    }
}

/// Consumer side: executes and releases blocks at the tail.
pub struct Consumer<'q, const N: usize> {
    queue: &'q MoveQueue<N>,
}

impl<'q, const N: usize> Consumer<'q, N> {
    /// No committed blocks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Slot index of the oldest committed block, if any.
    pub fn tail(&self) -> Option<usize> {
        if self.queue.is_empty() {
            None
        } else {
            Some(self.queue.read.load(Ordering::Relaxed))
        }
    }

    /// Claim the tail for execution.
    ///
    /// Returns `None` if the queue is empty or the producer is rewriting the
    /// tail right now; the caller should simply try again later.
    pub fn try_acquire_tail(&mut self) -> Option<usize> {
        let idx = self.tail()?;
        let slot = &self.queue.slots[idx];
        slot.ticking.store(true, Ordering::SeqCst);
        if slot.locked.load(Ordering::SeqCst) {
            slot.ticking.store(false, Ordering::SeqCst);
            return None;
        }
        Some(idx)
    }

    /// Read the claimed tail block.
    ///
    /// Returns `None` unless `idx` is the tail and was claimed with
    /// [`try_acquire_tail`](Self::try_acquire_tail).
    pub fn block(&self, idx: usize) -> Option<&Block> {
        let slot = self.queue.slots.get(idx)?;
        if self.tail() != Some(idx) || !slot.ticking.load(Ordering::SeqCst) {
            return None;
        }
        // SAFETY: the tail is never the head slot, and the producer leaves
        // ticking slots alone. `ticking` only rises in `try_acquire_tail`,
        // which needs `&mut self`, so it cannot change under this borrow.
        Some(unsafe { &*slot.block.get() })
    }

    /// Release the tail so the slot can be reused. No-op when empty.
    pub fn release_tail(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let idx = self.queue.read.load(Ordering::Relaxed);
        self.queue.slots[idx].ticking.store(false, Ordering::SeqCst);
        self.queue
            .read
            .store(MoveQueue::<N>::next(idx), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_length_minus_one() {
        let mut queue: MoveQueue<10> = MoveQueue::new();
        let (mut producer, mut consumer, status) = queue.split();

        assert!(status.is_empty());
        assert!(!status.is_full());

        for i in 1..=9 {
            assert!(producer.commit_head(), "commit {} should succeed", i);
            assert_eq!(status.is_full(), i == 9);
        }

        // 10th commit fails without moving anything
        let head = producer.head_index();
        assert!(!producer.commit_head());
        assert_eq!(producer.head_index(), head);
        assert_eq!(status.len(), 9);

        for _ in 0..9 {
            assert!(consumer.tail().is_some());
            consumer.release_tail();
            assert!(!status.is_full());
        }

        assert!(status.is_empty());
        assert!(consumer.tail().is_none());

        // releasing an empty queue is a no-op
        consumer.release_tail();
        assert!(status.is_empty());
    }

    #[test]
    fn test_fifo_order() {
        let mut queue: MoveQueue<8> = MoveQueue::new();
        let (mut producer, mut consumer, _) = queue.split();

        for tag in 1..=5u32 {
            producer.head().steps_event_count = tag;
            assert!(producer.commit_head());
        }

        for tag in 1..=5u32 {
            let idx = consumer.try_acquire_tail().unwrap();
            assert_eq!(consumer.block(idx).unwrap().steps_event_count, tag);
            consumer.release_tail();
        }
    }

    #[test]
    fn test_consumer_reads_only_claimed_tail() {
        let mut queue: MoveQueue<4> = MoveQueue::new();
        let (mut producer, mut consumer, _) = queue.split();

        producer.head().steps_event_count = 1;
        assert!(producer.commit_head());
        producer.head().steps_event_count = 2;
        assert!(producer.commit_head());

        let tail = consumer.tail().unwrap();
        let head = producer.head_index();

        // not claimed yet
        assert!(consumer.block(tail).is_none());
        // the producer owns the head slot
        assert!(consumer.block(head).is_none());
        assert!(consumer.block(17).is_none());

        assert_eq!(consumer.try_acquire_tail(), Some(tail));
        assert_eq!(consumer.block(tail).unwrap().steps_event_count, 1);
        // committed but behind the tail
        assert!(consumer.block(MoveQueue::<4>::next(tail)).is_none());

        consumer.release_tail();
        assert!(consumer.block(tail).is_none());
    }

    #[test]
    fn test_iteration() {
        let mut queue: MoveQueue<10> = MoveQueue::new();
        let (mut producer, _, _) = queue.split();

        for i in 1..=4u32 {
            producer.head().steps_event_count = i;
            assert!(producer.commit_head());
        }

        producer.start_iteration();
        assert!(producer.at_head());
        assert!(!producer.at_tail());

        for expected in (1..=4u32).rev() {
            let idx = producer.step_toward_tail();
            assert_eq!(producer.block(idx).steps_event_count, expected);
            assert!(!producer.at_head());
            assert_eq!(producer.at_tail(), expected == 1);
        }

        // cannot walk past the tail
        let idx = producer.step_toward_tail();
        assert_eq!(producer.block(idx).steps_event_count, 1);

        for expected in 2..=4u32 {
            let idx = producer.step_toward_head();
            assert_eq!(producer.block(idx).steps_event_count, expected);
            assert!(!producer.at_head());
        }

        producer.step_toward_head();
        assert!(producer.at_head());
    }

    #[test]
    fn test_cursor_stops_when_consumer_releases() {
        let mut queue: MoveQueue<10> = MoveQueue::new();
        let (mut producer, mut consumer, _) = queue.split();

        for _ in 0..4 {
            assert!(producer.commit_head());
        }

        producer.start_iteration();
        producer.step_toward_tail();
        producer.step_toward_tail();
        assert!(!producer.at_tail());

        // consumer drains everything behind the cursor and the cursor block
        for _ in 0..3 {
            consumer.release_tail();
        }
        assert!(producer.at_tail());
    }

    #[test]
    fn test_ticking_block_is_not_rewritten() {
        let mut queue: MoveQueue<4> = MoveQueue::new();
        let (mut producer, mut consumer, _) = queue.split();

        producer.head().entry_speed = 1.0;
        assert!(producer.commit_head());

        let idx = consumer.try_acquire_tail().unwrap();
        assert!(producer.is_ticking(idx));
        assert!(producer.with_block_mut(idx, |b| b.entry_speed = 2.0).is_none());
        assert_eq!(consumer.block(idx).unwrap().entry_speed, 1.0);

        consumer.release_tail();
        assert!(!producer.is_ticking(idx));
        assert!(producer.with_block_mut(idx, |b| b.entry_speed = 2.0).is_some());
    }

    #[test]
    fn test_locked_block_is_skipped_by_consumer() {
        let mut queue: MoveQueue<4> = MoveQueue::new();
        let (mut producer, mut consumer, _) = queue.split();
        assert!(producer.commit_head());
        let idx = consumer.tail().unwrap();

        // simulate the producer being interrupted mid-rewrite
        queue_slot_locked(&producer, idx, true);
        assert!(consumer.try_acquire_tail().is_none());
        assert!(!producer.is_ticking(idx));

        queue_slot_locked(&producer, idx, false);
        assert_eq!(consumer.try_acquire_tail(), Some(idx));
    }

    fn queue_slot_locked<const N: usize>(producer: &Producer<'_, N>, idx: usize, locked: bool) {
        producer.queue.slots[idx].locked.store(locked, Ordering::SeqCst);
    }
}
