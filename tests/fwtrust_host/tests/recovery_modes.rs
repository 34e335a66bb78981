// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Integration tests for boot reports and emergency mode selection
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 5 tests
//!
//! TEST_SCOPE:
//!   - Execution-mode table over candidate + report combinations
//!   - Boot-report consumption semantics
//!   - Recovery-first invoke order with root fallback
//!   - Scribbled report records
//!
//! TEST_SCENARIOS:
//!   - test_boot_failure_enters_emergency(): report flips the mode once
//!   - test_candidate_and_report_enter_emergency_update(): combined state
//!   - test_invoke_order_recovery_then_root(): fallback chain
//!   - test_invoke_order_without_recovery_class(): root-only fallback
//!   - test_scribbled_report_counts_as_absent(): corrupt record ignored

use fwtrust::{CandidateInfo, ClassEntry, DowngradePolicy, ExecutionMode, ManifestRole};
use fwtrust_host::{
    boot, corrupt_byte, provisioned_device, provisioned_with, RECOVERY, ROOT, STAGING_OFFSET,
};

#[test]
fn test_boot_failure_enters_emergency() {
    let mut orch = boot(provisioned_device());
    orch.report_boot_failure(b"watchdog reset in stage 2").unwrap();

    let orch = boot(orch.into_device());
    assert_eq!(orch.mode(), ExecutionMode::EmergencyBoot);
    let report = orch.boot_report().unwrap();
    assert!(report.recovery);
    assert_eq!(report.diagnostic, b"watchdog reset in stage 2");

    // The report is consumed at init; one failure costs one boot.
    let orch = boot(orch.into_device());
    assert_eq!(orch.mode(), ExecutionMode::RegularBoot);
    assert!(orch.boot_report().is_none());
}

#[test]
fn test_candidate_and_report_enter_emergency_update() {
    let mut orch = boot(provisioned_device());
    orch.stage_candidate(CandidateInfo { offset: STAGING_OFFSET, len: 0x200 }).unwrap();
    orch.report_boot_failure(b"").unwrap();

    let orch = boot(orch.into_device());
    assert_eq!(orch.mode(), ExecutionMode::EmergencyUpdate);
    assert!(orch.mode().is_emergency());
    assert!(orch.mode().is_update());
    // Candidate stays staged; only the report is consumed.
    assert!(orch.storage().candidate_get().unwrap().is_some());
}

#[test]
fn test_invoke_order_recovery_then_root() {
    let mut orch = boot(provisioned_device());
    assert_eq!(orch.invoke_order(), vec![ROOT]);

    orch.report_boot_failure(b"").unwrap();
    let orch = boot(orch.into_device());
    assert_eq!(orch.invoke_order(), vec![RECOVERY, ROOT]);
}

#[test]
fn test_invoke_order_without_recovery_class() {
    let device = provisioned_with(&[ClassEntry {
        class_id: ROOT,
        role: ManifestRole::Root,
        policy: DowngradePolicy::Enabled,
    }]);
    let mut orch = boot(device);
    orch.report_boot_failure(b"").unwrap();

    let orch = boot(orch.into_device());
    assert_eq!(orch.mode(), ExecutionMode::EmergencyBoot);
    assert_eq!(orch.invoke_order(), vec![ROOT]);
}

#[test]
fn test_scribbled_report_counts_as_absent() {
    let mut orch = boot(provisioned_device());
    orch.report_boot_failure(b"real failure").unwrap();

    let mut device = orch.into_device();
    let report_offset = fwtrust::StorageLayout::standard().report.offset();
    corrupt_byte(&mut device, report_offset + 4); // flags byte, breaks the crc

    // A record that fails its checksum must not wedge the device in
    // emergency mode.
    let orch = boot(device);
    assert_eq!(orch.mode(), ExecutionMode::RegularBoot);
    assert!(orch.boot_report().is_none());
}
