// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Host integration fixtures for the firmware trust core
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Stable
//! TEST_COVERAGE: Fixtures only; tests live in tests/
//!
//! Shared helpers: a provisioned in-memory device, well-known class ids,
//! a fault-injecting flash wrapper and raw corruption utilities.

use std::cell::RefCell;
use std::rc::Rc;

use fwtrust::{
    ClassEntry, DowngradePolicy, FwStorage, FwtrustError, ManifestClassId, ManifestRole,
    Orchestrator, SinkConfig, SocFirmwareChannel, StorageLayout,
};
use nvflash::{FlashDevice, FlashError, MemFlash};

pub const ROOT: ManifestClassId = ManifestClassId::new([0x01; 16]);
pub const RECOVERY: ManifestClassId = ManifestClassId::new([0x02; 16]);
pub const APP: ManifestClassId = ManifestClassId::new([0xA1; 16]);

pub const DEVICE_SIZE: usize = 64 * 1024;

/// Device offset safe for staging candidate payloads in tests.
pub const STAGING_OFFSET: usize = 0x8000;

/// Fresh device with root, recovery and application classes provisioned.
/// Downgrade prevention is enabled for all three.
pub fn provisioned_device() -> MemFlash {
    provisioned_with(&[
        ClassEntry { class_id: ROOT, role: ManifestRole::Root, policy: DowngradePolicy::Enabled },
        ClassEntry {
            class_id: RECOVERY,
            role: ManifestRole::Recovery,
            policy: DowngradePolicy::Enabled,
        },
        ClassEntry {
            class_id: APP,
            role: ManifestRole::Application,
            policy: DowngradePolicy::Enabled,
        },
    ])
}

pub fn provisioned_with(entries: &[ClassEntry]) -> MemFlash {
    let mut storage =
        FwStorage::init(MemFlash::new(DEVICE_SIZE), StorageLayout::standard()).unwrap();
    storage.provision_classes(entries).unwrap();
    storage.into_device()
}

/// Boot the orchestrator on `device` with default sink resources.
pub fn boot(device: MemFlash) -> Orchestrator<MemFlash> {
    Orchestrator::init(device, StorageLayout::standard(), SinkConfig::default()).unwrap()
}

pub fn boot_with(device: MemFlash, sinks: SinkConfig) -> Orchestrator<MemFlash> {
    Orchestrator::init(device, StorageLayout::standard(), sinks).unwrap()
}

/// Flip one stored byte, breaking whatever digest or checksum covers it.
pub fn corrupt_byte(device: &mut MemFlash, offset: usize) {
    device.raw_mut()[offset] ^= 0x55;
}

/// Flash wrapper that fails every mutating operation after a budget of
/// successful ones. Reads always succeed.
pub struct FlakyFlash {
    inner: MemFlash,
    writes_left: usize,
}

impl FlakyFlash {
    pub fn new(inner: MemFlash, writes_left: usize) -> Self {
        Self { inner, writes_left }
    }

    fn consume(&mut self) -> Result<(), FlashError> {
        if self.writes_left == 0 {
            return Err(FlashError::IoError);
        }
        self.writes_left -= 1;
        Ok(())
    }
}

impl FlashDevice for FlakyFlash {
    fn size(&self) -> usize {
        self.inner.size()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        self.inner.read(offset, buf)
    }

    fn write(&mut self, offset: usize, buf: &[u8]) -> Result<(), FlashError> {
        self.consume()?;
        self.inner.write(offset, buf)
    }

    fn erase(&mut self, offset: usize, len: usize) -> Result<(), FlashError> {
        self.consume()?;
        self.inner.erase(offset, len)
    }
}

/// Recording SoC firmware channel; clone the handle to inspect it after the
/// orchestrator takes ownership of the boxed writer.
#[derive(Default)]
pub struct SocRecorder {
    pub begun: Option<u32>,
    pub data: Vec<u8>,
    pub committed: bool,
}

#[derive(Clone, Default)]
pub struct SocHandle(pub Rc<RefCell<SocRecorder>>);

impl SocFirmwareChannel for SocHandle {
    fn begin(&mut self, channel: u32) -> Result<(), FwtrustError> {
        self.0.borrow_mut().begun = Some(channel);
        Ok(())
    }

    fn push(&mut self, data: &[u8]) -> Result<(), FwtrustError> {
        self.0.borrow_mut().data.extend_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), FwtrustError> {
        self.0.borrow_mut().committed = true;
        Ok(())
    }
}
