// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Error taxonomy for the firmware trust core
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)

use nvflash::FlashError;

/// Errors surfaced by the trust core.
///
/// `Authorization` and `UnsupportedComponent` are expected during normal
/// update processing and never escalate; `Io` and `Corruption` are the only
/// variants that justify entering an emergency state. `Corruption` is
/// returned exclusively by store initialization and is fatal to the whole
/// subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwtrustError {
    /// Envelope or component framing could not be decoded.
    Decode(&'static str),
    /// Requested envelope, report, candidate or variable does not exist.
    NotFound,
    /// Value or payload exceeds the destination bounds.
    Size { actual: usize, max: usize },
    /// Destination component kind is not part of the supported set.
    UnsupportedComponent(&'static str),
    /// Sequence-number or policy gate rejected the request.
    Authorization(&'static str),
    /// Flash primitive failed.
    Io,
    /// Metadata area and its backup both failed digest verification.
    Corruption(&'static str),
}

impl From<FlashError> for FwtrustError {
    fn from(_: FlashError) -> Self {
        FwtrustError::Io
    }
}
