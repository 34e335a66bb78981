// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Single-slot update candidate store
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Via tests/fwtrust_host (candidate flow + overlap rejection)
//!
//! Record layout: magic(4) + offset(4) + len(4) + crc32(4), little-endian.
//! An erased or unreadable slot means "no candidate pending".

use nvflash::{FlashDevice, Region};

use crate::error::FwtrustError;
use crate::storage::StorageLayout;

/// Candidate record magic: "NXUC" (Nexus Update Candidate).
const CAND_MAGIC: u32 = 0x4E58_5543;

const RECORD_LEN: usize = 16;

/// Reference to a staged update payload on the shared device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateInfo {
    pub offset: usize,
    pub len: usize,
}

pub fn set<D: FlashDevice>(
    device: &mut D,
    layout: &StorageLayout,
    info: CandidateInfo,
) -> Result<(), FwtrustError> {
    let staged = Region::new(info.offset, info.len);
    staged.check_on(device)?;
    if layout.protected_regions().iter().any(|r| r.overlaps(&staged)) {
        return Err(FwtrustError::Authorization("candidate region overlaps protected storage"));
    }

    let mut record = [0u8; RECORD_LEN];
    record[0..4].copy_from_slice(&CAND_MAGIC.to_le_bytes());
    record[4..8].copy_from_slice(&(info.offset as u32).to_le_bytes());
    record[8..12].copy_from_slice(&(info.len as u32).to_le_bytes());
    let crc = crc32fast::hash(&record[..12]);
    record[12..16].copy_from_slice(&crc.to_le_bytes());

    let slot = layout.candidate;
    slot.erase_all(device)?;
    slot.write(device, 0, &record)?;
    Ok(())
}

pub fn get<D: FlashDevice>(
    device: &D,
    slot: Region,
) -> Result<Option<CandidateInfo>, FwtrustError> {
    let mut record = [0u8; RECORD_LEN];
    slot.read(device, 0, &mut record)?;

    let magic = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
    if magic != CAND_MAGIC {
        return Ok(None);
    }
    let crc = u32::from_le_bytes([record[12], record[13], record[14], record[15]]);
    if crc != crc32fast::hash(&record[..12]) {
        return Ok(None);
    }

    let offset = u32::from_le_bytes([record[4], record[5], record[6], record[7]]) as usize;
    let len = u32::from_le_bytes([record[8], record[9], record[10], record[11]]) as usize;
    Ok(Some(CandidateInfo { offset, len }))
}

pub fn clear<D: FlashDevice>(device: &mut D, slot: Region) -> Result<(), FwtrustError> {
    slot.erase_all(device)?;
    Ok(())
}
