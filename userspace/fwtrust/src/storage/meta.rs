// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Digest-protected metadata areas with backup/restore
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Via storage init tests in tests/fwtrust_host
//!
//! Each protected area stores its payload followed by a SHA-256 digest and
//! has a same-sized backup area. Validation repairs whichever copy is stale
//! or corrupt; only a double corruption is unrecoverable.

use sha2::{Digest, Sha256};

use nvflash::{FlashDevice, Region};

use crate::error::FwtrustError;

/// Trailing digest width inside every protected area.
pub const DIGEST_LEN: usize = 32;

fn sha256(bytes: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&digest);
    out
}

/// Split a protected area into (payload, stored digest).
fn split(image: &[u8]) -> Result<(&[u8], &[u8]), FwtrustError> {
    if image.len() <= DIGEST_LEN {
        return Err(FwtrustError::Corruption("protected area too small"));
    }
    Ok(image.split_at(image.len() - DIGEST_LEN))
}

fn digest_ok(image: &[u8]) -> Result<bool, FwtrustError> {
    let (payload, stored) = split(image)?;
    Ok(sha256(payload) == stored)
}

fn copy_area<D: FlashDevice>(
    device: &mut D,
    from: Region,
    to: Region,
) -> Result<(), FwtrustError> {
    let image = from.read_all(device)?;
    to.erase_all(device)?;
    to.write(device, 0, &image)?;
    Ok(())
}

/// True if both copies read back fully erased (factory-fresh device).
pub fn pair_erased<D: FlashDevice>(
    device: &D,
    area: Region,
    backup: Region,
) -> Result<bool, FwtrustError> {
    Ok(area.is_erased(device)? && backup.is_erased(device)?)
}

/// Validate an area against its backup and repair whichever side is broken.
///
/// Intact area + intact matching backup is a no-op. An intact area with a
/// missing or differing backup refreshes the backup. A corrupt area with an
/// intact backup is restored from it. Both sides corrupt is fatal.
pub fn validate_pair<D: FlashDevice>(
    device: &mut D,
    area: Region,
    backup: Region,
) -> Result<(), FwtrustError> {
    let area_image = area.read_all(device)?;
    let backup_image = backup.read_all(device)?;
    let area_ok = digest_ok(&area_image)?;
    let backup_ok = digest_ok(&backup_image)?;

    if area_ok {
        if backup_ok && area_image == backup_image {
            return Ok(());
        }
        return copy_area(device, area, backup);
    }
    if backup_ok {
        return copy_area(device, backup, area);
    }
    Err(FwtrustError::Corruption("area and backup both failed digest verification"))
}

/// Recompute the area digest after a payload change, then refresh the backup.
pub fn commit<D: FlashDevice>(
    device: &mut D,
    area: Region,
    backup: Region,
) -> Result<(), FwtrustError> {
    let payload_len = area.len().checked_sub(DIGEST_LEN).ok_or(FwtrustError::Io)?;
    let mut payload = alloc::vec![0u8; payload_len];
    area.read(device, 0, &mut payload)?;
    let digest = sha256(&payload);

    area.erase(device, payload_len, DIGEST_LEN)?;
    area.write(device, payload_len, &digest)?;

    validate_pair(device, area, backup)
}
