//! Scan result state machine.
//!
//! ```text
//! Idle -> Validated -> Processing -> Success -> Idle
//!            |                   \-> Error   -> Idle
//!            \-> Idle (reset)
//! ```
//!
//! Each variant after `Idle` owns the scan result it is about, so a success or
//! error without employee data cannot be constructed.

use tokio::time::Instant;

use super::submission::SubmissionFailure;
use crate::client::attendance::models::RosterEntry;
use crate::error::InvalidTransition;

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub employee_id: String,
    pub name: String,
    pub nomor_lambung: Option<String>,
    pub display_time: String,
    pub roster: Option<RosterEntry>,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Validated,
    Processing,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScanState {
    #[default]
    Idle,
    Validated(ScanResult),
    Processing(ScanResult),
    Success {
        result: ScanResult,
        until: Instant,
    },
    Error {
        result: ScanResult,
        failure: SubmissionFailure,
        until: Instant,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Validated(ScanResult),
    SubmitStarted,
    Submitted { until: Instant },
    SubmitFailed { failure: SubmissionFailure, until: Instant },
    /// Clock tick; leaves `Success`/`Error` once their display delay is over.
    Tick(Instant),
    /// User cancel or retry.
    Reset,
}

impl ScanEvent {
    fn name(&self) -> &'static str {
        match self {
            ScanEvent::Validated(_) => "Validated",
            ScanEvent::SubmitStarted => "SubmitStarted",
            ScanEvent::Submitted { .. } => "Submitted",
            ScanEvent::SubmitFailed { .. } => "SubmitFailed",
            ScanEvent::Tick(_) => "Tick",
            ScanEvent::Reset => "Reset",
        }
    }
}

impl ScanState {
    pub fn phase(&self) -> ScanPhase {
        match self {
            ScanState::Idle => ScanPhase::Idle,
            ScanState::Validated(_) => ScanPhase::Validated,
            ScanState::Processing(_) => ScanPhase::Processing,
            ScanState::Success { .. } => ScanPhase::Success,
            ScanState::Error { .. } => ScanPhase::Error,
        }
    }

    /// The camera may only sample while idle.
    pub fn scanning_allowed(&self) -> bool {
        matches!(self, ScanState::Idle)
    }

    pub fn result(&self) -> Option<&ScanResult> {
        match self {
            ScanState::Idle => None,
            ScanState::Validated(result) | ScanState::Processing(result) => Some(result),
            ScanState::Success { result, .. } | ScanState::Error { result, .. } => Some(result),
        }
    }

    pub fn apply(self, event: ScanEvent) -> Result<ScanState, InvalidTransition> {
        let from = self.phase();
        let name = event.name();

        match (self, event) {
            (ScanState::Idle, ScanEvent::Validated(result)) => Ok(ScanState::Validated(result)),
            (ScanState::Validated(result), ScanEvent::SubmitStarted) => Ok(ScanState::Processing(result)),
            (ScanState::Processing(result), ScanEvent::Submitted { until }) => Ok(ScanState::Success { result, until }),
            (ScanState::Processing(result), ScanEvent::SubmitFailed { failure, until }) => {
                Ok(ScanState::Error { result, failure, until })
            }
            (ScanState::Success { until, .. } | ScanState::Error { until, .. }, ScanEvent::Tick(now)) if now >= until => {
                Ok(ScanState::Idle)
            }
            (state, ScanEvent::Tick(_)) => Ok(state),
            (ScanState::Validated(_) | ScanState::Error { .. }, ScanEvent::Reset) => Ok(ScanState::Idle),
            (ScanState::Idle, ScanEvent::Reset) => Ok(ScanState::Idle),
            _ => Err(InvalidTransition { from, event: name }),
        }
    }
}
