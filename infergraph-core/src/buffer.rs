//! Single-owner byte buffers with pool-accounted allocation

use std::fmt;
use std::mem::size_of;
use std::sync::Arc;

use bytemuck::{AnyBitPattern, NoUninit};

use crate::error::{Error, Result};
use crate::memory::MemoryPool;

/// An owned block of bytes representing one unit of payload in flight
///
/// The length always equals the allocated size; a buffer is never partially
/// valid. Exactly one owner is live at any instant: handing a buffer to the
/// routing layer moves it, so the sender can neither read nor release it
/// afterwards. Dropping the final owner returns any pool reservation.
pub struct Buffer {
    /// The owned bytes
    data: Vec<u8>,

    /// Pool charged for this allocation, if any
    pool: Option<Arc<MemoryPool>>,
}

impl Buffer {
    /// Allocate a zeroed buffer of `len` bytes charged against `pool`
    ///
    /// Fails with [`Error::AllocationFailed`] when the pool is exhausted;
    /// allocation never blocks waiting for capacity.
    pub fn allocate(len: usize, pool: &Arc<MemoryPool>) -> Result<Self> {
        pool.reserve(len)?;

        Ok(Self {
            data: vec![0; len],
            pool: Some(Arc::clone(pool)),
        })
    }

    /// Wrap an existing byte vector without pool accounting
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, pool: None }
    }

    /// Copy a typed slice into a new unpooled buffer
    pub fn from_typed<T: NoUninit>(data: &[T]) -> Self {
        Self::from_vec(bytemuck::cast_slice(data).to_vec())
    }

    /// Length of the buffer in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Borrow the bytes mutably
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer, returning its bytes
    ///
    /// The pool reservation, if any, is released on return.
    pub fn into_vec(mut self) -> Vec<u8> {
        if let Some(pool) = self.pool.take() {
            pool.release(self.data.len());
        }
        std::mem::take(&mut self.data)
    }

    /// Decode the payload as a vector of `T`
    ///
    /// Fails with [`Error::Layout`] when the element size does not divide
    /// the buffer length.
    pub fn to_typed_vec<T: AnyBitPattern + NoUninit>(&self) -> Result<Vec<T>> {
        if size_of::<T>() == 0 || self.data.len() % size_of::<T>() != 0 {
            return Err(Error::Layout(format!(
                "buffer of {} bytes does not hold whole {}-byte elements",
                self.data.len(),
                size_of::<T>()
            )));
        }

        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }

    /// Overwrite the buffer with the bytes of a typed slice
    ///
    /// Fails with [`Error::Layout`] when the encoded length differs from
    /// the buffer length; the buffer is never partially written.
    pub fn copy_from_typed<T: NoUninit>(&mut self, data: &[T]) -> Result<()> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() != self.data.len() {
            return Err(Error::Layout(format!(
                "source of {} bytes does not fill buffer of {} bytes",
                bytes.len(),
                self.data.len()
            )));
        }

        self.data.copy_from_slice(bytes);
        Ok(())
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(self.data.len());
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.data.len())
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_charges_pool() {
        let pool = Arc::new(MemoryPool::new(1024));

        let buffer = Buffer::allocate(256, &pool).unwrap();
        assert_eq!(buffer.len(), 256);
        assert!(buffer.as_slice().iter().all(|&b| b == 0));
        assert_eq!(pool.usage(), 256);

        drop(buffer);
        assert_eq!(pool.usage(), 0);
    }

    #[test]
    fn test_allocate_fails_on_exhausted_pool() {
        let pool = Arc::new(MemoryPool::new(100));
        let _held = Buffer::allocate(90, &pool).unwrap();

        let err = Buffer::allocate(20, &pool).unwrap_err();
        assert!(matches!(
            err,
            Error::AllocationFailed {
                requested: 20,
                available: 10,
            }
        ));
    }

    #[test]
    fn test_typed_round_trip() {
        let values = [1.5f32, -2.0, 0.25];
        let buffer = Buffer::from_typed(&values);

        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.to_typed_vec::<f32>().unwrap(), values);
    }

    #[test]
    fn test_typed_view_rejects_ragged_length() {
        let buffer = Buffer::from_vec(vec![0u8; 7]);
        assert!(matches!(
            buffer.to_typed_vec::<f32>(),
            Err(Error::Layout(_))
        ));
    }

    #[test]
    fn test_copy_from_typed_requires_exact_fit() {
        let pool = Arc::new(MemoryPool::unbounded());
        let mut buffer = Buffer::allocate(8, &pool).unwrap();

        buffer.copy_from_typed(&[1.0f32, 2.0]).unwrap();
        assert_eq!(buffer.to_typed_vec::<f32>().unwrap(), vec![1.0, 2.0]);

        assert!(matches!(
            buffer.copy_from_typed(&[1.0f32]),
            Err(Error::Layout(_))
        ));
    }

    #[test]
    fn test_into_vec_releases_reservation() {
        let pool = Arc::new(MemoryPool::new(64));
        let buffer = Buffer::allocate(32, &pool).unwrap();

        let bytes = buffer.into_vec();
        assert_eq!(bytes.len(), 32);
        assert_eq!(pool.usage(), 0);
    }
}
