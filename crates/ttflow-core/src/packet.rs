//! In-place packet buffer with headroom for link-layer header surgery.
//!
//! A [`PacketBuf`] is a contiguous byte buffer holding one Ethernet frame,
//! with spare headroom in front of the link header so a shim can be pushed
//! without copying the whole packet. The shim codec only needs four
//! operations beyond plain byte access: `headroom`, `grow_head`,
//! `shrink_head` and `ensure_writable`.

use crate::error::{Error, Result};

/// Ethernet header length without VLAN tags.
pub const ETH_HLEN: usize = 14;

/// Headroom reserved by [`PacketBuf::from_frame`], enough for one shim push
/// without reallocation.
pub const DEFAULT_HEADROOM: usize = 16;

/// One Ethernet frame in a contiguous buffer with headroom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBuf {
    buf: Vec<u8>,
    /// Offset of the link header inside `buf`.
    head: usize,
    /// One past the last frame byte inside `buf`.
    tail: usize,
    mac_len: usize,
}

impl PacketBuf {
    /// Wrap a raw frame, reserving [`DEFAULT_HEADROOM`] in front of it.
    pub fn from_frame(frame: &[u8]) -> Self {
        Self::with_headroom(frame, DEFAULT_HEADROOM)
    }

    /// Wrap a raw frame with an explicit headroom reservation. Zero is
    /// valid; a later `grow_head` will reallocate.
    pub fn with_headroom(frame: &[u8], headroom: usize) -> Self {
        let mut buf = Vec::with_capacity(headroom + frame.len());
        buf.resize(headroom, 0);
        buf.extend_from_slice(frame);
        Self {
            head: headroom,
            tail: buf.len(),
            buf,
            mac_len: ETH_HLEN,
        }
    }

    /// Frame length in bytes.
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    /// True when the frame holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.tail == self.head
    }

    /// Spare bytes in front of the link header.
    pub fn headroom(&self) -> usize {
        self.head
    }

    /// Link header length.
    pub fn mac_len(&self) -> usize {
        self.mac_len
    }

    /// The frame bytes, link header first.
    pub fn frame(&self) -> &[u8] {
        &self.buf[self.head..self.tail]
    }

    /// Mutable view of the frame bytes.
    pub fn frame_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.head..self.tail]
    }

    /// Extend the frame by `n` bytes at the front, reallocating when the
    /// headroom is short. The new bytes are uninitialized from the frame's
    /// point of view; callers overwrite them immediately.
    pub fn grow_head(&mut self, n: usize) {
        if self.head < n {
            let mut buf = Vec::with_capacity(DEFAULT_HEADROOM + n + self.len());
            buf.resize(DEFAULT_HEADROOM + n, 0);
            buf.extend_from_slice(self.frame());
            self.head = DEFAULT_HEADROOM + n;
            self.tail = buf.len();
            self.buf = buf;
        }
        self.head -= n;
    }

    /// Drop `n` bytes from the front of the frame, returning them to the
    /// headroom.
    pub fn shrink_head(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.head += n;
    }

    /// Check that the first `n` frame bytes exist and can be rewritten in
    /// place.
    pub fn ensure_writable(&self, n: usize) -> Result<()> {
        if n > self.len() {
            return Err(Error::Truncated {
                needed: n,
                len: self.len(),
            });
        }
        Ok(())
    }
}
