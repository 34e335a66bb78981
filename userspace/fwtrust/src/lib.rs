// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Firmware-update orchestration and trust core
//! OWNERS: @runtime
//! STATUS: Functional (host-first)
//! API_STABILITY: Stable (v1.0)
//! TEST_COVERAGE: Unit tests per module + integration tests (via tests/fwtrust_host)
//!   - envelope locator framing and erased-slot detection
//!   - manifest store install/lookup atomicity
//!   - sequence authorization and downgrade policy
//!   - execution-mode selection table
//!   - sink selection and write orchestration
//!
//! PUBLIC API:
//!   - Orchestrator: boot-time mode selection + interpreter-facing hooks
//!   - FwStorage: manifest/candidate/report/variable stores over flash
//!   - authorize_sequence_number: anti-rollback gate
//!   - SinkDescriptor + StreamSink: write-destination abstraction
//!
//! DEPENDENCIES:
//!   - nvflash: bounded flash regions
//!   - sha2: metadata area digests
//!   - crc32fast: candidate/report record integrity

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod authorize;
pub mod decode;
pub mod envelope;
pub mod error;
pub mod exec_mode;
pub mod orchestrator;
pub mod registry;
pub mod sink;
pub mod storage;

pub use authorize::{authorize_sequence_number, SequencePhase};
pub use envelope::{encode_envelope, locate_envelope, EnvelopeHeader, ENVELOPE_TAG};
pub use error::FwtrustError;
pub use exec_mode::ExecutionMode;
pub use orchestrator::{Orchestrator, SinkConfig};
pub use registry::{
    ClassEntry, ClassRegistry, DowngradePolicy, ManifestClassId, ManifestRole,
    StaticClassRegistry,
};
pub use sink::{MemPtrTable, RamBank, SinkDescriptor, SocFirmwareChannel, StreamSink};
pub use storage::{BootReport, CandidateInfo, FwStorage, StorageLayout, StoredEnvelope};
