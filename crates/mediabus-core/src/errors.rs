//! Domain-level outcomes. These are returned, never thrown: a Runtime method
//! never panics or propagates an error for an expected branch like "expired"
//! or "not found" — callers match on the result type.

use crate::types::DeviceId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatusOutcome {
    Pending { expires_at_ms: u64 },
    Approved { device_id: DeviceId },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApproveError {
    Expired,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateSessionOutcome {
    Created(String),
    MaxClients,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Valid(DeviceId),
    Invalid,
}
