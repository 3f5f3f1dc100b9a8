//! PermitGate Core — transport-agnostic authorization gate library.
//!
//! This library provides the full gate pipeline shared by any embedder:
//! canonical hashing, the hash-chained audit ledger, the policy engine,
//! explain validation, the permit lifecycle, the reasoning-agent and
//! notarization seams, notifications, storage, configuration, and the
//! orchestrator driving submit/execute. The CLI wrapper (`permitgate`) is
//! one thin consumer; HTTP transports and real model or registry backends
//! plug in behind the same traits.
//!
//! # Traceability
//! - Implements: REQ-HASH-001 (Canonical Hashing)
//! - Implements: REQ-STORE-001 (Durable Append-Only Storage)
//! - Implements: REQ-AUD-001 (Audit Ledger)
//! - Implements: REQ-POL-001 (Policy Engine)
//! - Implements: REQ-VAL-001 (Explain Validation)
//! - Implements: REQ-PRM-001 (Permit Lifecycle)
//! - Implements: REQ-AGT-001 (Reasoning Agent Seam)
//! - Implements: REQ-NOT-001 (Notarization Seam)
//! - Implements: REQ-NFY-001 (Notification Seam)
//! - Implements: REQ-ORCH-001 (Orchestrator)
//! - Implements: REQ-CFG-001 (Configuration)

pub mod agent;
pub mod audit;
pub mod config;
pub mod context;
pub mod error;
pub mod explain;
pub mod gate;
pub mod hashing;
pub mod notarize;
pub mod notify;
pub mod permit;
pub mod policy;
pub mod risk;
pub mod storage;

pub use config::GateConfig;
pub use context::RequestContext;
pub use error::GateError;
pub use gate::{ExecuteOutcome, Gate, Status, SubmitOutcome, ToolKind};
pub use risk::RiskLevel;
