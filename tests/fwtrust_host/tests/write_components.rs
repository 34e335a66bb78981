// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Integration tests for component writes through the orchestrator
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 7 tests
//!
//! TEST_SCOPE:
//!   - Flash destination erase + chunked streaming
//!   - Protected-partition write rejection
//!   - check_write as a pure dry run
//!   - In-memory staging slots feeding an install
//!   - SoC channel streaming and commit
//!
//! TEST_SCENARIOS:
//!   - test_flash_write_streams_and_erases(): stale bytes gone, payload in
//!   - test_flash_write_into_protected_area_rejected(): layout guard
//!   - test_check_write_authorizes_without_mutating(): dry run
//!   - test_staged_envelope_feeds_install(): CAND_IMG slot to manifest store
//!   - test_failed_staging_stream_records_nothing(): aborted stream, no size
//!   - test_soc_firmware_channel_round_trip(): begin/push/commit order
//!   - test_unknown_component_kind_rejected(): decode guard

use fwtrust::{
    encode_envelope, FwtrustError, SequencePhase, SinkConfig, SinkDescriptor,
};
use fwtrust_host::{
    boot, boot_with, provisioned_device, SocHandle, APP, STAGING_OFFSET,
};
use nvflash::FlashDevice;

#[test]
fn test_flash_write_streams_and_erases() {
    let mut device = provisioned_device();
    // Stale bytes from a previous payload.
    device.raw_mut()[STAGING_OFFSET..STAGING_OFFSET + 0x1000].fill(0x11);

    let mut orch = boot(device);
    let component = SinkDescriptor::Flash { offset: STAGING_OFFSET, size: 0x1000 }.encode();
    let payload: Vec<u8> = (0..1800u32).map(|i| (i % 251) as u8).collect();
    orch.write(&component, &payload).unwrap();

    let device = orch.into_device();
    let mut read_back = vec![0u8; 1800];
    device.read(STAGING_OFFSET, &mut read_back).unwrap();
    assert_eq!(read_back, payload);
    // Beyond the payload the destination was erased, not left stale.
    let mut tail = [0u8; 4];
    device.read(STAGING_OFFSET + 1800, &mut tail).unwrap();
    assert_eq!(tail, [0xFF; 4]);
}

#[test]
fn test_flash_write_into_protected_area_rejected() {
    let mut orch = boot(provisioned_device());
    let root_slot = orch.storage().layout().root_slot;
    let component =
        SinkDescriptor::Flash { offset: root_slot.offset() + 16, size: 32 }.encode();

    assert!(matches!(
        orch.write(&component, &[0u8; 32]),
        Err(FwtrustError::Authorization(_))
    ));
    // Nothing reached the slot.
    assert!(orch.storage().slot_is_empty(fwtrust::ManifestRole::Root).unwrap());
}

#[test]
fn test_check_write_authorizes_without_mutating() {
    let mut orch = boot(provisioned_device());
    let before = orch.into_device().raw().to_vec();

    let mut orch = boot(provisioned_device());
    let ok = SinkDescriptor::Flash { offset: STAGING_OFFSET, size: 64 }.encode();
    orch.check_write(&ok).unwrap();

    let vars = orch.storage().layout().vars;
    let bad = SinkDescriptor::Flash { offset: vars.offset(), size: 8 }.encode();
    assert!(matches!(orch.check_write(&bad), Err(FwtrustError::Authorization(_))));

    assert_eq!(orch.into_device().raw().to_vec(), before);
}

#[test]
fn test_staged_envelope_feeds_install() {
    let mut orch = boot(provisioned_device());
    orch.begin_manifest_session();

    let envelope = encode_envelope(&APP, 2, &[0x33; 300]);
    let component = SinkDescriptor::MemPointer { index: 0 }.encode();
    orch.write(&component, &envelope).unwrap();

    let staged = orch.staging().get(0).unwrap().to_vec();
    assert_eq!(staged, envelope);

    orch.authorize_sequence_number(SequencePhase::Install, &APP, 2).unwrap();
    orch.sequence_completed(SequencePhase::Install, &APP, Some(&staged)).unwrap();
    assert_eq!(orch.storage().installed_envelope(&APP).unwrap().sequence_number, 2);

    // Session reset drops the staged copy, not the committed envelope.
    orch.begin_manifest_session();
    assert_eq!(orch.staging().get(0), None);
    assert!(orch.storage().installed_envelope(&APP).is_ok());
}

#[test]
fn test_failed_staging_stream_records_nothing() {
    let sinks = SinkConfig { staging_max_len: 1024, ..SinkConfig::default() };
    let mut orch = boot_with(provisioned_device(), sinks);

    let component = SinkDescriptor::MemPointer { index: 0 }.encode();
    let payload = vec![0x7Eu8; 1500];
    assert!(matches!(orch.write(&component, &payload), Err(FwtrustError::Size { .. })));
    // The sink was never finalized, so the aborted stream must not record
    // anything in the slot.
    assert_eq!(orch.staging().get(0), None);
}

#[test]
fn test_soc_firmware_channel_round_trip() {
    let handle = SocHandle::default();
    let sinks = SinkConfig {
        soc_channel: Some(Box::new(handle.clone())),
        ..SinkConfig::default()
    };
    let mut orch = boot_with(provisioned_device(), sinks);

    let component = SinkDescriptor::SocFirmware { channel: 3 }.encode();
    let payload: Vec<u8> = (0..700u32).map(|i| i as u8).collect();
    orch.write(&component, &payload).unwrap();

    let recorder = handle.0.borrow();
    assert_eq!(recorder.begun, Some(3));
    assert_eq!(recorder.data, payload);
    assert!(recorder.committed);
}

#[test]
fn test_unknown_component_kind_rejected() {
    let mut orch = boot(provisioned_device());
    // array(1) [ bstr "XIP" ]
    let component = [0x81, 0x43, b'X', b'I', b'P'];
    assert_eq!(
        orch.check_write(&component),
        Err(FwtrustError::UnsupportedComponent("unknown component kind"))
    );
}
