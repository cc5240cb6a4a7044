//! Pre-allocated preview buffer pool (pixel mode).

use bytes::BytesMut;
use tracing::trace;

/// Fixed-size pool of preview callback buffers.
///
/// Every buffer is `frame_size` bytes. Buffers are taken at open and lent
/// to the driver; a released frame posts its buffer back to the camera
/// thread, which re-queues it only while the session is running.
pub struct BufferPool {
    frame_size: usize,
    free: Vec<BytesMut>,
    capacity: usize,
}

impl BufferPool {
    /// Allocate `count` zeroed buffers of `frame_size` bytes.
    pub fn new(frame_size: usize, count: usize) -> Self {
        let free = (0..count)
            .map(|_| BytesMut::zeroed(frame_size))
            .collect();
        Self {
            frame_size,
            free,
            capacity: count,
        }
    }

    /// Take a free buffer, if any.
    pub fn take(&mut self) -> Option<BytesMut> {
        self.free.pop()
    }

    /// Return a buffer to the pool.
    ///
    /// Buffers whose length no longer matches the frame size are discarded;
    /// the driver contract is one full frame per buffer.
    pub fn put_back(&mut self, buffer: BytesMut) {
        if buffer.len() != self.frame_size {
            trace!(
                len = buffer.len(),
                expected = self.frame_size,
                "Discarding resized buffer"
            );
            return;
        }
        if self.free.len() < self.capacity {
            self.free.push(buffer);
        }
    }

    /// Byte size of each buffer.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of free buffers.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Total buffers owned by the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_allocates_sized_buffers() {
        let mut pool = BufferPool::new(16, 3);
        assert_eq!(pool.free_count(), 3);
        let buffer = pool.take().unwrap();
        assert_eq!(buffer.len(), 16);
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_pool_recycles() {
        let mut pool = BufferPool::new(8, 2);
        let a = pool.take().unwrap();
        let _b = pool.take().unwrap();
        assert_eq!(pool.take(), None);
        pool.put_back(a);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_pool_discards_resized_buffers() {
        let mut pool = BufferPool::new(8, 1);
        let mut buffer = pool.take().unwrap();
        buffer.truncate(4);
        pool.put_back(buffer);
        assert_eq!(pool.free_count(), 0);
    }
}
