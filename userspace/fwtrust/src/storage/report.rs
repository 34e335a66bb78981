// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot report store (emergency flag + optional diagnostics)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Via tests/fwtrust_host (boot mode selection + consumption)
//!
//! Record layout: magic(4) + flags(1) + diag_len(2) + diag + crc32(4).
//! Written by whatever detects a terminal boot failure; read exactly once
//! by the execution-mode selector and cleared after consumption.

use alloc::vec::Vec;

use nvflash::{FlashDevice, Region};

use crate::error::FwtrustError;

/// Boot report magic: "NXBR" (Nexus Boot Report).
const REPORT_MAGIC: u32 = 0x4E58_4252;

const HEADER_LEN: usize = 7;
const CRC_LEN: usize = 4;

const FLAG_RECOVERY: u8 = 0x01;

/// Outcome of the previous boot, persisted across the reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// True when the previous boot failed terminally.
    pub recovery: bool,
    /// Optional diagnostic blob attached by the failure handler.
    pub diagnostic: Vec<u8>,
}

pub fn save<D: FlashDevice>(
    device: &mut D,
    slot: Region,
    report: &BootReport,
) -> Result<(), FwtrustError> {
    let max_diag = slot.len().saturating_sub(HEADER_LEN + CRC_LEN);
    if report.diagnostic.len() > max_diag {
        return Err(FwtrustError::Size { actual: report.diagnostic.len(), max: max_diag });
    }

    let mut record = Vec::with_capacity(HEADER_LEN + report.diagnostic.len() + CRC_LEN);
    record.extend_from_slice(&REPORT_MAGIC.to_le_bytes());
    record.push(if report.recovery { FLAG_RECOVERY } else { 0 });
    record.extend_from_slice(&(report.diagnostic.len() as u16).to_le_bytes());
    record.extend_from_slice(&report.diagnostic);
    let crc = crc32fast::hash(&record);
    record.extend_from_slice(&crc.to_le_bytes());

    slot.erase_all(device)?;
    slot.write(device, 0, &record)?;
    Ok(())
}

pub fn read<D: FlashDevice>(device: &D, slot: Region) -> Result<BootReport, FwtrustError> {
    let image = slot.read_all(device)?;
    if image.len() < HEADER_LEN + CRC_LEN {
        return Err(FwtrustError::NotFound);
    }

    let magic = u32::from_le_bytes([image[0], image[1], image[2], image[3]]);
    if magic != REPORT_MAGIC {
        return Err(FwtrustError::NotFound);
    }

    let flags = image[4];
    let diag_len = u16::from_le_bytes([image[5], image[6]]) as usize;
    let crc_start = HEADER_LEN + diag_len;
    if crc_start + CRC_LEN > image.len() {
        return Err(FwtrustError::Decode("boot report length out of range"));
    }
    let crc = u32::from_le_bytes([
        image[crc_start],
        image[crc_start + 1],
        image[crc_start + 2],
        image[crc_start + 3],
    ]);
    if crc != crc32fast::hash(&image[..crc_start]) {
        return Err(FwtrustError::Decode("boot report checksum mismatch"));
    }

    Ok(BootReport {
        recovery: flags & FLAG_RECOVERY != 0,
        diagnostic: image[HEADER_LEN..crc_start].to_vec(),
    })
}

pub fn clear<D: FlashDevice>(device: &mut D, slot: Region) -> Result<(), FwtrustError> {
    slot.erase_all(device)?;
    Ok(())
}
