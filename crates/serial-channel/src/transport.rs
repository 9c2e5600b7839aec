//! Byte transports and foreground byte streams

use crate::channel::WriteStatus;

/// A byte-at-a-time serial peripheral
///
/// Both methods are only called by the interrupt side of a channel and must not block.
pub trait Transport {
    /// Take the next received byte, if the peripheral holds one
    fn poll_receive(&mut self) -> Option<u8>;

    /// Hand a byte to the peripheral, returning `false` if it cannot accept one right now
    fn try_transmit(&mut self, byte: u8) -> bool;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn poll_receive(&mut self) -> Option<u8> {
        (**self).poll_receive()
    }

    fn try_transmit(&mut self, byte: u8) -> bool {
        (**self).try_transmit(byte)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn poll_receive(&mut self) -> Option<u8> {
        (**self).poll_receive()
    }

    fn try_transmit(&mut self, byte: u8) -> bool {
        (**self).try_transmit(byte)
    }
}

/// Foreground byte stream consumed by protocol devices
///
/// Neither method blocks. Writes may queue only a prefix of `buf`.
pub trait ByteChannel {
    /// Take the next received byte, if any
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for transmission, returning how many were queued
    fn write_bytes(&mut self, buf: &[u8]) -> (WriteStatus, usize);

    /// Bytes that can currently be queued without a partial write
    fn tx_free(&self) -> usize;
}

impl<C: ByteChannel + ?Sized> ByteChannel for &mut C {
    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn write_bytes(&mut self, buf: &[u8]) -> (WriteStatus, usize) {
        (**self).write_bytes(buf)
    }

    fn tx_free(&self) -> usize {
        (**self).tx_free()
    }
}
