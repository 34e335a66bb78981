// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Boot-time orchestration and interpreter-facing hooks
//! OWNERS: @runtime
//! STATUS: Functional (host-first)
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests below + full flows in tests/fwtrust_host
//!
//! The orchestrator is constructed once per boot. Construction initializes
//! the stores, consumes the boot report and fixes the execution mode; the
//! manifest interpreter then drives everything else through the hooks.

use alloc::boxed::Box;
use alloc::vec::Vec;

use nvflash::FlashDevice;

use crate::authorize::{authorize_sequence_number, SequencePhase};
use crate::error::FwtrustError;
use crate::exec_mode::ExecutionMode;
use crate::registry::{ClassRegistry, ManifestClassId, ManifestRole, StaticClassRegistry};
use crate::sink::{select_sink, MemPtrTable, RamBank, SinkDescriptor, SocFirmwareChannel, StreamSink};
use crate::storage::{BootReport, CandidateInfo, FwStorage, StorageLayout};

/// Streaming chunk size for write orchestration.
const WRITE_CHUNK: usize = 512;

/// Sink resources handed to the orchestrator at construction.
pub struct SinkConfig {
    /// RAM ranges firmware may be loaded into.
    pub ram_banks: Vec<RamBank>,
    /// Number of in-memory staging slots.
    pub staging_slots: usize,
    /// Per-slot staging capacity in bytes.
    pub staging_max_len: usize,
    /// SoC-specific firmware channel, when the platform has one.
    pub soc_channel: Option<Box<dyn SocFirmwareChannel>>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            ram_banks: Vec::new(),
            staging_slots: 4,
            staging_max_len: 8 * 1024,
            soc_channel: None,
        }
    }
}

/// Firmware-update orchestration and trust engine over one storage device.
pub struct Orchestrator<D: FlashDevice> {
    storage: FwStorage<D>,
    registry: StaticClassRegistry,
    mode: ExecutionMode,
    boot_report: Option<BootReport>,
    banks: Vec<RamBank>,
    memptr: MemPtrTable,
    soc: Option<Box<dyn SocFirmwareChannel>>,
}

impl<D: FlashDevice> Orchestrator<D> {
    /// Initialize the stores and fix this boot's execution mode.
    ///
    /// The boot report is consumed here: it is read, cleared from flash, and
    /// kept in memory for diagnostics. An unreadable report record counts as
    /// absent so a scribbled slot cannot wedge the device in emergency mode.
    pub fn init(device: D, layout: StorageLayout, sinks: SinkConfig) -> Result<Self, FwtrustError> {
        let mut storage = FwStorage::init(device, layout)?;

        let boot_report = match storage.report_read() {
            Ok(report) => Some(report),
            Err(FwtrustError::NotFound) | Err(FwtrustError::Decode(_)) => None,
            Err(err) => return Err(err),
        };
        if boot_report.is_some() {
            storage.report_clear()?;
        }

        let candidate_pending = storage.candidate_get()?.is_some();
        let emergency = boot_report.as_ref().map(|r| r.recovery).unwrap_or(false);
        let mode = ExecutionMode::select(candidate_pending, emergency);

        let registry = storage.registry();
        Ok(Self {
            storage,
            registry,
            mode,
            boot_report,
            banks: sinks.ram_banks,
            memptr: MemPtrTable::new(sinks.staging_slots, sinks.staging_max_len),
            soc: sinks.soc_channel,
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Report consumed at init, if the previous boot left one.
    pub fn boot_report(&self) -> Option<&BootReport> {
        self.boot_report.as_ref()
    }

    pub fn storage(&self) -> &FwStorage<D> {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut FwStorage<D> {
        &mut self.storage
    }

    pub fn staging(&self) -> &MemPtrTable {
        &self.memptr
    }

    /// Tear down, returning the device (host-test reboot cycles).
    pub fn into_device(self) -> D {
        self.storage.into_device()
    }

    /// Stage a delivered candidate for the next boot.
    pub fn stage_candidate(&mut self, info: CandidateInfo) -> Result<(), FwtrustError> {
        self.storage.candidate_set(info)
    }

    /// Persist a terminal boot failure for the next boot's mode selection.
    pub fn report_boot_failure(&mut self, diagnostic: &[u8]) -> Result<(), FwtrustError> {
        self.storage.report_save(&BootReport { recovery: true, diagnostic: diagnostic.to_vec() })
    }

    /// Anti-rollback gate; see [`authorize_sequence_number`].
    pub fn authorize_sequence_number(
        &self,
        phase: SequencePhase,
        class_id: &ManifestClassId,
        sequence_number: u64,
    ) -> Result<(), FwtrustError> {
        authorize_sequence_number(&self.storage, &self.registry, phase, class_id, sequence_number)
    }

    /// Hook called after a processing phase ran to completion.
    ///
    /// A completed install commits the staged envelope and clears the
    /// candidate record, in that order; a reset between the two re-runs a
    /// now-redundant install instead of losing the committed envelope.
    pub fn sequence_completed(
        &mut self,
        phase: SequencePhase,
        class_id: &ManifestClassId,
        envelope: Option<&[u8]>,
    ) -> Result<(), FwtrustError> {
        match phase {
            SequencePhase::Install => {
                let bytes =
                    envelope.ok_or(FwtrustError::Decode("completed install carries no envelope"))?;
                self.storage.install_envelope(class_id, bytes)?;
                self.storage.candidate_clear()
            }
            SequencePhase::Validate | SequencePhase::Load | SequencePhase::Invoke => Ok(()),
        }
    }

    /// Reset per-session state before a manifest-processing run.
    pub fn begin_manifest_session(&mut self) {
        self.storage.reset_manifest_vars();
        self.memptr.reset();
    }

    /// Stream `payload` into the destination named by `component`.
    ///
    /// Selection authorizes the destination, destinations that need it are
    /// erased first, and the payload is streamed in fixed-size chunks before
    /// the sink is finalized.
    pub fn write(&mut self, component: &[u8], payload: &[u8]) -> Result<(), FwtrustError> {
        let descriptor = SinkDescriptor::decode(component)?;
        let layout = *self.storage.layout();
        let mut sink = select_sink(
            &descriptor,
            &layout,
            self.storage.device_mut(),
            &mut self.banks,
            &mut self.memptr,
            self.soc.as_deref_mut(),
        )?;

        if sink.supports_erase() {
            sink.erase()?;
        }
        let mut offset = 0;
        for chunk in payload.chunks(WRITE_CHUNK) {
            sink.write(offset, chunk)?;
            offset += chunk.len();
        }
        sink.finalize()
    }

    /// Dry-run of [`Orchestrator::write`]: authorize the destination without
    /// touching it.
    pub fn check_write(&mut self, component: &[u8]) -> Result<(), FwtrustError> {
        let descriptor = SinkDescriptor::decode(component)?;
        if let SinkDescriptor::SocFirmware { .. } = descriptor {
            // Selection would open the channel; existence is enough here.
            return if self.soc.is_some() {
                Ok(())
            } else {
                Err(FwtrustError::UnsupportedComponent("no SoC firmware channel wired"))
            };
        }
        let layout = *self.storage.layout();
        select_sink(
            &descriptor,
            &layout,
            self.storage.device_mut(),
            &mut self.banks,
            &mut self.memptr,
            self.soc.as_deref_mut(),
        )
        .map(|_| ())
    }

    /// Classes to invoke for this boot, in fallback order.
    ///
    /// Regular modes boot the root chain. Emergency modes boot the recovery
    /// chain first and fall back to root when no recovery class is
    /// provisioned, so a device without a dedicated recovery manifest still
    /// comes up.
    pub fn invoke_order(&self) -> Vec<ManifestClassId> {
        let mut order = Vec::new();
        if self.mode.is_emergency() {
            if let Some(recovery) = self.registry.class_for_role(ManifestRole::Recovery) {
                order.push(recovery);
            }
        }
        if let Some(root) = self.registry.class_for_role(ManifestRole::Root) {
            order.push(root);
        }
        order
    }
}
