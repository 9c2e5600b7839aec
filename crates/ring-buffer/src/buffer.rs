//! Lock-Free Ring Buffer Implementation

use crate::BufferError;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Lock-free SPSC ring buffer of bytes
///
/// Both indices increase monotonically and wrap on overflow; a slot is addressed by
/// masking the index with `N - 1`, so `N` must be a power of two. Occupancy is always
/// `write_index - read_index` in wrapping arithmetic and never exceeds `N`.
///
/// The buffer itself exposes no mutating operations. Call [`RingBuffer::split`] to obtain
/// the single [`Producer`] and the single [`Consumer`] handle.
pub struct RingBuffer<const N: usize> {
    /// Pre-allocated storage
    storage: UnsafeCell<[u8; N]>,
    /// Next slot to write, only advanced by the producer
    write_index: AtomicUsize,
    /// Next slot to read, only advanced by the consumer
    read_index: AtomicUsize,
}

impl<const N: usize> RingBuffer<N> {
    const CAPACITY_IS_POWER_OF_TWO: () = assert!(
        N != 0 && N.is_power_of_two(),
        "ring buffer capacity must be a non-zero power of two"
    );

    const MASK: usize = N - 1;

    /// Create an empty ring buffer
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_IS_POWER_OF_TWO;
        Self {
            storage: UnsafeCell::new([0; N]),
            write_index: AtomicUsize::new(0),
            read_index: AtomicUsize::new(0),
        }
    }

    /// Split the buffer into its producer and consumer halves
    ///
    /// The exclusive borrow guarantees that at most one handle of each kind exists.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let buffer: &Self = self;
        (
            Producer {
                buffer,
                _not_sync: PhantomData,
            },
            Consumer {
                buffer,
                _not_sync: PhantomData,
            },
        )
    }

    /// Get the buffer capacity
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Get the number of bytes currently queued
    pub fn len(&self) -> usize {
        let write = self.write_index.load(Ordering::Acquire);
        let read = self.read_index.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.len() >= N
    }

    fn slot(&self, index: usize) -> *mut u8 {
        // SAFETY: the mask keeps the offset inside the array
        unsafe { (self.storage.get() as *mut u8).add(index & Self::MASK) }
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: a slot is written only by the producer while it is outside the readable range
// and read only by the consumer while it is inside it. The Release store of an index
// publishes the slot access that preceded it to the other side's Acquire load.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

/// Writing half of a [`RingBuffer`]
pub struct Producer<'a, const N: usize> {
    buffer: &'a RingBuffer<N>,
    _not_sync: PhantomData<std::cell::Cell<()>>,
}

impl<'a, const N: usize> Producer<'a, N> {
    /// Append a byte
    ///
    /// Fails with [`BufferError::Full`] without touching the queued bytes.
    pub fn write(&mut self, byte: u8) -> Result<(), BufferError> {
        let write = self.buffer.write_index.load(Ordering::Relaxed);
        let read = self.buffer.read_index.load(Ordering::Acquire);
        if write.wrapping_sub(read) >= N {
            return Err(BufferError::Full);
        }

        // SAFETY: the slot is outside the readable range until the index store below
        unsafe { self.buffer.slot(write).write(byte) };
        self.buffer
            .write_index
            .store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Get the number of bytes currently queued
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Get the buffer capacity
    pub const fn capacity(&self) -> usize {
        N
    }
}

/// Reading half of a [`RingBuffer`]
pub struct Consumer<'a, const N: usize> {
    buffer: &'a RingBuffer<N>,
    _not_sync: PhantomData<std::cell::Cell<()>>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// Remove and return the oldest byte
    pub fn read(&mut self) -> Result<u8, BufferError> {
        let read = self.buffer.read_index.load(Ordering::Relaxed);
        let byte = self.front(read)?;
        self.buffer
            .read_index
            .store(read.wrapping_add(1), Ordering::Release);
        Ok(byte)
    }

    /// Return the oldest byte without removing it
    pub fn peek(&self) -> Result<u8, BufferError> {
        let read = self.buffer.read_index.load(Ordering::Relaxed);
        self.front(read)
    }

    fn front(&self, read: usize) -> Result<u8, BufferError> {
        let write = self.buffer.write_index.load(Ordering::Acquire);
        if write == read {
            return Err(BufferError::Empty);
        }
        // SAFETY: the slot is inside the readable range, the producer will not touch it
        Ok(unsafe { self.buffer.slot(read).read() })
    }

    /// Get the number of bytes currently queued
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if buffer is full
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Get the buffer capacity
    pub const fn capacity(&self) -> usize {
        N
    }
}
