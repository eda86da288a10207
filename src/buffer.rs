//! Borrowed buffer views
//!
//! Zero-copy views over caller memory handed to native calls. A view only
//! lives for the synchronous call it is passed to; operations that need the
//! data longer (asynchronous conversion) take owned [`bytes::Bytes`] instead.

use bytes::Bytes;
use std::ops::Deref;

/// Read-only view over caller-supplied bytes
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a> {
    data: &'a [u8],
}

impl<'a> BufferView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }
}

impl Deref for BufferView<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data
    }
}

impl<'a> From<&'a [u8]> for BufferView<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for BufferView<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a Vec<u8>> for BufferView<'a> {
    fn from(data: &'a Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a Bytes> for BufferView<'a> {
    fn from(data: &'a Bytes) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a str> for BufferView<'a> {
    fn from(data: &'a str) -> Self {
        Self::new(data.as_bytes())
    }
}

/// Read-write view over caller memory that tracks how much has been filled
#[derive(Debug)]
pub struct BufferViewMut<'a> {
    data: &'a mut [u8],
    filled: usize,
}

impl<'a> BufferViewMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, filled: 0 }
    }

    /// Total size of the underlying memory
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes written into the view so far
    pub fn filled_len(&self) -> usize {
        self.filled
    }

    /// Remaining room after the filled region
    pub fn remaining(&self) -> usize {
        self.data.len() - self.filled
    }

    pub fn filled(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    pub fn unfilled_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.filled..]
    }

    /// Mark `n` more bytes of the unfilled region as filled
    pub fn advance(&mut self, n: usize) {
        self.filled = (self.filled + n).min(self.data.len());
    }

    pub fn clear(&mut self) {
        self.filled = 0;
    }
}

impl<'a> From<&'a mut [u8]> for BufferViewMut<'a> {
    fn from(data: &'a mut [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a mut [u8; N]> for BufferViewMut<'a> {
    fn from(data: &'a mut [u8; N]) -> Self {
        Self::new(data)
    }
}

impl<'a> From<&'a mut Vec<u8>> for BufferViewMut<'a> {
    fn from(data: &'a mut Vec<u8>) -> Self {
        Self::new(data.as_mut_slice())
    }
}
