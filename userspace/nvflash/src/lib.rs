// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Flash device and bounded-region abstractions for firmware storage
//! OWNERS: @runtime
//! STATUS: Functional (host-first)
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests here + integration coverage via tests/fwtrust_host
//!
//! PUBLIC API:
//!   - FlashDevice: byte-addressed NV device with erase-to-ones semantics
//!   - MemFlash: in-memory device for host tests
//!   - Region: bounds-checked window over a device
//!   - FlashError: error codes

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

/// Erased flash reads back as all-ones.
pub const ERASED_BYTE: u8 = 0xFF;

/// Native word granularity for emptiness checks.
pub const WORD_SIZE: usize = 4;

/// Flash device error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Access outside the device or region bounds.
    OutOfRange,
    /// Underlying read/write/erase failed.
    IoError,
}

/// Abstract byte-addressed non-volatile device.
///
/// Erase fills the given range with [`ERASED_BYTE`]; writes may only clear
/// bits, but host-test devices are allowed to be more permissive.
pub trait FlashDevice {
    /// Total device size in bytes.
    fn size(&self) -> usize;

    /// Read `buf.len()` bytes starting at `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Write `buf` starting at `offset`.
    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<(), FlashError>;

    /// Erase `len` bytes starting at `offset`.
    fn erase(&mut self, offset: usize, len: usize) -> Result<(), FlashError>;
}

/// In-memory flash device for host testing.
pub struct MemFlash {
    bytes: Vec<u8>,
}

impl MemFlash {
    /// Create a device of `size` bytes, fully erased.
    pub fn new(size: usize) -> Self {
        Self { bytes: vec![ERASED_BYTE; size] }
    }

    /// Raw access to storage (for corruption tests and fixtures).
    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Raw read-only view of storage.
    pub fn raw(&self) -> &[u8] {
        &self.bytes
    }
}

impl FlashDevice for MemFlash {
    fn size(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        let end = offset.checked_add(buf.len()).ok_or(FlashError::OutOfRange)?;
        if end > self.bytes.len() {
            return Err(FlashError::OutOfRange);
        }
        buf.copy_from_slice(&self.bytes[offset..end]);
        Ok(())
    }

    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<(), FlashError> {
        let end = offset.checked_add(buf.len()).ok_or(FlashError::OutOfRange)?;
        if end > self.bytes.len() {
            return Err(FlashError::OutOfRange);
        }
        self.bytes[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn erase(&mut self, offset: usize, len: usize) -> Result<(), FlashError> {
        let end = offset.checked_add(len).ok_or(FlashError::OutOfRange)?;
        if end > self.bytes.len() {
            return Err(FlashError::OutOfRange);
        }
        for b in &mut self.bytes[offset..end] {
            *b = ERASED_BYTE;
        }
        Ok(())
    }
}

/// A fixed window over a device.
///
/// Every store in the trust core accesses flash exclusively through a
/// `Region`; offsets are region-relative and validated against `len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    offset: usize,
    len: usize,
}

impl Region {
    /// Create a region at `offset` spanning `len` bytes.
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// Region start offset on the device.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Region length in bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if the region spans zero bytes.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One-past-the-end device offset.
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// True if this region overlaps `other` on the same device.
    pub const fn overlaps(&self, other: &Region) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }

    /// Derive a narrower window; fails if it would escape this region.
    pub fn subregion(&self, offset: usize, len: usize) -> Result<Region, FlashError> {
        let end = offset.checked_add(len).ok_or(FlashError::OutOfRange)?;
        if end > self.len {
            return Err(FlashError::OutOfRange);
        }
        Ok(Region::new(self.offset + offset, len))
    }

    /// Validate that the region fits on `device`.
    pub fn check_on<D: FlashDevice>(&self, device: &D) -> Result<(), FlashError> {
        let end = self.offset.checked_add(self.len).ok_or(FlashError::OutOfRange)?;
        if end > device.size() {
            return Err(FlashError::OutOfRange);
        }
        Ok(())
    }

    /// Read `buf.len()` bytes at a region-relative offset.
    pub fn read<D: FlashDevice>(
        &self,
        device: &D,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), FlashError> {
        self.bounds(offset, buf.len())?;
        device.read(self.offset + offset, buf)
    }

    /// Read the entire region into a freshly allocated buffer.
    pub fn read_all<D: FlashDevice>(&self, device: &D) -> Result<Vec<u8>, FlashError> {
        let mut buf = vec![0u8; self.len];
        self.read(device, 0, &mut buf)?;
        Ok(buf)
    }

    /// Write `buf` at a region-relative offset.
    pub fn write<D: FlashDevice>(
        &self,
        device: &mut D,
        offset: usize,
        buf: &[u8],
    ) -> Result<(), FlashError> {
        self.bounds(offset, buf.len())?;
        device.write(self.offset + offset, buf)
    }

    /// Erase `len` bytes at a region-relative offset.
    pub fn erase<D: FlashDevice>(
        &self,
        device: &mut D,
        offset: usize,
        len: usize,
    ) -> Result<(), FlashError> {
        self.bounds(offset, len)?;
        device.erase(self.offset + offset, len)
    }

    /// Erase the whole region.
    pub fn erase_all<D: FlashDevice>(&self, device: &mut D) -> Result<(), FlashError> {
        device.erase(self.offset, self.len)
    }

    /// Scan the region at word granularity against the erase sentinel.
    pub fn is_erased<D: FlashDevice>(&self, device: &D) -> Result<bool, FlashError> {
        let mut word = [0u8; WORD_SIZE];
        let words = self.len / WORD_SIZE;
        for i in 0..words {
            self.read(device, i * WORD_SIZE, &mut word)?;
            if word != [ERASED_BYTE; WORD_SIZE] {
                return Ok(false);
            }
        }
        // Trailing partial word, if the region is not word-aligned.
        let tail = self.len % WORD_SIZE;
        if tail != 0 {
            let mut rest = [0u8; WORD_SIZE];
            self.read(device, words * WORD_SIZE, &mut rest[..tail])?;
            if rest[..tail].iter().any(|b| *b != ERASED_BYTE) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn bounds(&self, offset: usize, len: usize) -> Result<(), FlashError> {
        let end = offset.checked_add(len).ok_or(FlashError::OutOfRange)?;
        if end > self.len {
            return Err(FlashError::OutOfRange);
        }
        Ok(())
    }
}
