// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Persistent trust stores over fixed flash partitions
//! OWNERS: @runtime
//! STATUS: Functional (host-first)
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below + tests/fwtrust_host
//!   - init with backup restore and double-corruption failure
//!   - envelope install/lookup atomicity
//!   - candidate and boot-report slots
//!   - manifest variable tiers
//!
//! One `FwStorage` object owns the device and every partition; it is
//! constructed once at startup and passed by reference into all operations.

pub mod candidate;
pub mod meta;
pub mod report;
pub mod vars;

use alloc::vec::Vec;

use nvflash::{FlashDevice, Region, WORD_SIZE};

use crate::envelope::{locate_envelope, EnvelopeHeader, MIN_ENVELOPE_LEN};
use crate::error::FwtrustError;
use crate::registry::{
    ClassEntry, DowngradePolicy, ManifestClassId, ManifestRole, StaticClassRegistry,
};

pub use candidate::CandidateInfo;
pub use report::BootReport;
pub use vars::{VarTier, VARS_PER_TIER};

const ENTRY_LEN: usize = 32;
const ENTRY_VERSION: u8 = 1;
const ENTRY_UNPROVISIONED: u8 = 0xFF;

/// Disjoint fixed partitions of the trust storage device.
///
/// Offsets are device-absolute and configured at deployment time; the
/// standard layout below matches the reserved trust partition on current
/// targets.
#[derive(Debug, Clone, Copy)]
pub struct StorageLayout {
    pub metadata: Region,
    pub metadata_backup: Region,
    pub vars: Region,
    pub vars_backup: Region,
    pub report: Region,
    pub candidate: Region,
    pub root_slot: Region,
    pub recovery_slot: Region,
    pub application_slot: Region,
    pub companion_slot: Region,
}

impl StorageLayout {
    /// Standard fixed-offset layout (7 KiB of metadata + envelope slots).
    pub const fn standard() -> Self {
        Self {
            metadata: Region::new(0, ManifestRole::ALL.len() * ENTRY_LEN + meta::DIGEST_LEN),
            metadata_backup: Region::new(160, 160),
            vars: Region::new(320, 64),
            vars_backup: Region::new(384, 64),
            report: Region::new(448, 256),
            candidate: Region::new(704, 32),
            root_slot: Region::new(1024, 2048),
            recovery_slot: Region::new(3072, 2048),
            application_slot: Region::new(5120, 1024),
            companion_slot: Region::new(6144, 1024),
        }
    }

    /// Envelope slot owned by `role`.
    pub fn slot(&self, role: ManifestRole) -> Region {
        match role {
            ManifestRole::Root => self.root_slot,
            ManifestRole::Recovery => self.recovery_slot,
            ManifestRole::Application => self.application_slot,
            ManifestRole::Companion => self.companion_slot,
        }
    }

    /// Every partition owned by the trust subsystem, in layout order.
    pub fn protected_regions(&self) -> [Region; 10] {
        [
            self.metadata,
            self.metadata_backup,
            self.vars,
            self.vars_backup,
            self.report,
            self.candidate,
            self.root_slot,
            self.recovery_slot,
            self.application_slot,
            self.companion_slot,
        ]
    }

    /// Check partition fit and pairwise disjointness on `device`.
    pub fn validate<D: FlashDevice>(&self, device: &D) -> Result<(), FwtrustError> {
        let regions = self.protected_regions();
        for region in &regions {
            region.check_on(device)?;
        }
        for (i, a) in regions.iter().enumerate() {
            for b in regions.iter().skip(i + 1) {
                if a.overlaps(b) {
                    return Err(FwtrustError::Corruption("storage partitions overlap"));
                }
            }
        }
        if self.metadata.len() != self.metadata_backup.len()
            || self.vars.len() != self.vars_backup.len()
        {
            return Err(FwtrustError::Corruption("backup partition size mismatch"));
        }
        Ok(())
    }
}

/// An envelope committed to the manifest store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEnvelope {
    pub class_id: ManifestClassId,
    pub role: ManifestRole,
    pub sequence_number: u64,
    pub bytes: Vec<u8>,
}

/// Manifest, candidate, boot-report and variable stores over one device.
pub struct FwStorage<D: FlashDevice> {
    device: D,
    layout: StorageLayout,
    classes: Vec<ClassEntry>,
    platform_vars: [u32; VARS_PER_TIER],
    manifest_vars: [u32; VARS_PER_TIER],
}

impl<D: FlashDevice> FwStorage<D> {
    /// Initialize all stores. Runs once per boot, before any other
    /// operation.
    ///
    /// Verifies the class-metadata area against its backup and repairs from
    /// whichever copy is intact; fails with `Corruption` when both are
    /// broken. The durable-variable area uses the same scheme, except a
    /// double corruption there is recovered by re-initializing defaults.
    pub fn init(device: D, layout: StorageLayout) -> Result<Self, FwtrustError> {
        let mut device = device;
        layout.validate(&device)?;

        let classes = if meta::pair_erased(&device, layout.metadata, layout.metadata_backup)? {
            // Factory-fresh device: nothing provisioned yet.
            Vec::new()
        } else {
            meta::validate_pair(&mut device, layout.metadata, layout.metadata_backup)?;
            load_class_entries(&device, layout.metadata)?
        };

        if meta::pair_erased(&device, layout.vars, layout.vars_backup)? {
            init_vars_defaults(&mut device, &layout)?;
        } else {
            match meta::validate_pair(&mut device, layout.vars, layout.vars_backup) {
                Ok(()) => {}
                // Variables are advisory state; unlike class metadata a
                // double corruption falls back to defaults instead of
                // refusing to boot.
                Err(FwtrustError::Corruption(_)) => init_vars_defaults(&mut device, &layout)?,
                Err(err) => return Err(err),
            }
        }

        Ok(Self {
            device,
            layout,
            classes,
            platform_vars: [0; VARS_PER_TIER],
            manifest_vars: [0; VARS_PER_TIER],
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub(crate) fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Consume the store, returning the device (host-test reboot cycles).
    pub fn into_device(self) -> D {
        self.device
    }

    /// Snapshot of the provisioned class table.
    pub fn registry(&self) -> StaticClassRegistry {
        StaticClassRegistry::new(self.classes.clone())
    }

    /// Write the class table into the metadata area and create its backup.
    ///
    /// Deployment-time operation; regular boots only read the table.
    pub fn provision_classes(&mut self, entries: &[ClassEntry]) -> Result<(), FwtrustError> {
        let payload_len = self.layout.metadata.len() - meta::DIGEST_LEN;
        let mut payload = alloc::vec![0xFFu8; payload_len];
        for entry in entries {
            let index = role_index(entry.role);
            let out = &mut payload[index * ENTRY_LEN..(index + 1) * ENTRY_LEN];
            out[0] = ENTRY_VERSION;
            out[1] = role_code(entry.role);
            out[2] = match entry.policy {
                DowngradePolicy::Disabled => 0,
                DowngradePolicy::Enabled => 1,
            };
            out[4..20].copy_from_slice(entry.class_id.as_bytes());
        }

        self.layout.metadata.erase_all(&mut self.device)?;
        self.layout.metadata.write(&mut self.device, 0, &payload)?;
        meta::commit(&mut self.device, self.layout.metadata, self.layout.metadata_backup)?;
        self.classes = entries.to_vec();
        Ok(())
    }

    fn slot_for_class(
        &self,
        class_id: &ManifestClassId,
    ) -> Result<(ManifestRole, Region), FwtrustError> {
        let entry = self
            .classes
            .iter()
            .find(|e| e.class_id == *class_id)
            .ok_or(FwtrustError::NotFound)?;
        Ok((entry.role, self.layout.slot(entry.role)))
    }

    /// Commit a new envelope for `class_id`.
    ///
    /// The slot is erased first and the first word is written last, so a
    /// torn install leaves the slot reporting empty; lookups never observe
    /// a partial envelope.
    pub fn install_envelope(
        &mut self,
        class_id: &ManifestClassId,
        bytes: &[u8],
    ) -> Result<(), FwtrustError> {
        let (_, slot) = self.slot_for_class(class_id)?;
        if bytes.len() < MIN_ENVELOPE_LEN {
            return Err(FwtrustError::Decode("envelope too short"));
        }
        if bytes.len() > slot.len() {
            return Err(FwtrustError::Size { actual: bytes.len(), max: slot.len() });
        }
        let framed = locate_envelope(bytes)?.ok_or(FwtrustError::Decode("erased envelope image"))?;
        if framed != bytes.len() {
            return Err(FwtrustError::Decode("trailing bytes after envelope framing"));
        }
        let header = EnvelopeHeader::decode(bytes)?;
        if header.class_id != *class_id {
            return Err(FwtrustError::Decode("envelope class id mismatch"));
        }

        slot.erase_all(&mut self.device)?;
        slot.write(&mut self.device, WORD_SIZE, &bytes[WORD_SIZE..])?;
        // Commit word goes in last.
        slot.write(&mut self.device, 0, &bytes[..WORD_SIZE])?;
        Ok(())
    }

    /// Fetch the committed envelope for `class_id`, or `NotFound`.
    pub fn installed_envelope(
        &self,
        class_id: &ManifestClassId,
    ) -> Result<StoredEnvelope, FwtrustError> {
        let (role, slot) = self.slot_for_class(class_id)?;
        let image = slot.read_all(&self.device)?;
        let len = locate_envelope(&image)?.ok_or(FwtrustError::NotFound)?;
        let header = EnvelopeHeader::decode(&image[..len])?;
        if header.class_id != *class_id {
            return Err(FwtrustError::Decode("stored envelope class id mismatch"));
        }
        Ok(StoredEnvelope {
            class_id: *class_id,
            role,
            sequence_number: header.sequence_number,
            bytes: image[..len].to_vec(),
        })
    }

    /// Word-granularity emptiness scan of a role's envelope slot.
    pub fn slot_is_empty(&self, role: ManifestRole) -> Result<bool, FwtrustError> {
        Ok(self.layout.slot(role).is_erased(&self.device)?)
    }

    // ------------------------------------------------------------------
    // Candidate store
    // ------------------------------------------------------------------

    /// Stage an update candidate. Fails if the referenced region overlaps
    /// any protected partition.
    pub fn candidate_set(&mut self, info: CandidateInfo) -> Result<(), FwtrustError> {
        candidate::set(&mut self.device, &self.layout, info)
    }

    pub fn candidate_get(&self) -> Result<Option<CandidateInfo>, FwtrustError> {
        candidate::get(&self.device, self.layout.candidate)
    }

    pub fn candidate_clear(&mut self) -> Result<(), FwtrustError> {
        candidate::clear(&mut self.device, self.layout.candidate)
    }

    // ------------------------------------------------------------------
    // Boot report store
    // ------------------------------------------------------------------

    pub fn report_save(&mut self, boot_report: &BootReport) -> Result<(), FwtrustError> {
        report::save(&mut self.device, self.layout.report, boot_report)
    }

    pub fn report_read(&self) -> Result<BootReport, FwtrustError> {
        report::read(&self.device, self.layout.report)
    }

    pub fn report_clear(&mut self) -> Result<(), FwtrustError> {
        report::clear(&mut self.device, self.layout.report)
    }

    // ------------------------------------------------------------------
    // Manifest variables
    // ------------------------------------------------------------------

    pub fn var_get(&self, id: u32) -> Result<u32, FwtrustError> {
        let (spec, index) = vars::resolve(id).ok_or(FwtrustError::NotFound)?;
        match spec.tier {
            VarTier::Durable => {
                let mut value = [0u8; 1];
                self.layout.vars.read(&self.device, index, &mut value)?;
                Ok(u32::from(value[0]))
            }
            VarTier::PlatformVolatile => Ok(self.platform_vars[index]),
            VarTier::ManifestVolatile => Ok(self.manifest_vars[index]),
        }
    }

    pub fn var_set(&mut self, id: u32, value: u32) -> Result<(), FwtrustError> {
        let (spec, index) = vars::resolve(id).ok_or(FwtrustError::NotFound)?;
        if value > spec.max_value {
            return Err(FwtrustError::Size {
                actual: value as usize,
                max: spec.max_value as usize,
            });
        }
        match spec.tier {
            VarTier::Durable => {
                let payload_len = self.layout.vars.len() - meta::DIGEST_LEN;
                let mut payload = alloc::vec![0u8; payload_len];
                self.layout.vars.read(&self.device, 0, &mut payload)?;
                payload[index] = value as u8;
                self.layout.vars.erase_all(&mut self.device)?;
                self.layout.vars.write(&mut self.device, 0, &payload)?;
                meta::commit(&mut self.device, self.layout.vars, self.layout.vars_backup)
            }
            VarTier::PlatformVolatile => {
                self.platform_vars[index] = value;
                Ok(())
            }
            VarTier::ManifestVolatile => {
                self.manifest_vars[index] = value;
                Ok(())
            }
        }
    }

    /// Tier-wide access mask for `id`.
    pub fn var_access_mask(&self, id: u32) -> Result<u32, FwtrustError> {
        let (spec, _) = vars::resolve(id).ok_or(FwtrustError::NotFound)?;
        Ok(spec.access_mask)
    }

    /// Reset the manifest-volatile tier at the start of a processing
    /// session.
    pub fn reset_manifest_vars(&mut self) {
        self.manifest_vars = [0; VARS_PER_TIER];
    }
}

fn role_code(role: ManifestRole) -> u8 {
    match role {
        ManifestRole::Root => 1,
        ManifestRole::Recovery => 2,
        ManifestRole::Application => 3,
        ManifestRole::Companion => 4,
    }
}

fn role_from_code(code: u8) -> Option<ManifestRole> {
    match code {
        1 => Some(ManifestRole::Root),
        2 => Some(ManifestRole::Recovery),
        3 => Some(ManifestRole::Application),
        4 => Some(ManifestRole::Companion),
        _ => None,
    }
}

fn role_index(role: ManifestRole) -> usize {
    (role_code(role) - 1) as usize
}

fn load_class_entries<D: FlashDevice>(
    device: &D,
    metadata: Region,
) -> Result<Vec<ClassEntry>, FwtrustError> {
    let payload_len = metadata.len() - meta::DIGEST_LEN;
    let mut payload = alloc::vec![0u8; payload_len];
    metadata.read(device, 0, &mut payload)?;

    let mut entries = Vec::new();
    for chunk in payload.chunks_exact(ENTRY_LEN) {
        if chunk[0] == ENTRY_UNPROVISIONED {
            continue;
        }
        if chunk[0] != ENTRY_VERSION {
            return Err(FwtrustError::Decode("unsupported metadata entry version"));
        }
        let role = role_from_code(chunk[1]).ok_or(FwtrustError::Decode("unknown role code"))?;
        let policy = match chunk[2] {
            0 => DowngradePolicy::Disabled,
            1 => DowngradePolicy::Enabled,
            _ => return Err(FwtrustError::Decode("unknown downgrade policy code")),
        };
        let mut id = [0u8; 16];
        id.copy_from_slice(&chunk[4..20]);
        entries.push(ClassEntry { class_id: ManifestClassId::new(id), role, policy });
    }
    Ok(entries)
}

fn init_vars_defaults<D: FlashDevice>(
    device: &mut D,
    layout: &StorageLayout,
) -> Result<(), FwtrustError> {
    let payload_len = layout.vars.len() - meta::DIGEST_LEN;
    layout.vars.erase_all(device)?;
    layout.vars.write(device, 0, &alloc::vec![0u8; payload_len])?;
    layout.vars_backup.erase_all(device)?;
    meta::commit(device, layout.vars, layout.vars_backup)
}
