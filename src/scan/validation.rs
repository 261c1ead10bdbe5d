use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveTime;
use tracing::{info, warn};

use super::state::ScanResult;
use crate::client::attendance::AttendanceApi;
use crate::client::attendance::models::{EmployeeSummary, RosterEntry, ValidateQrRequest};
use crate::config::KioskConfiguration;
use crate::error::{ApiError, ValidationError};

/// Server verdict for a scanned badge, reduced to what the kiosk shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub employee: EmployeeSummary,
    pub roster: Option<RosterEntry>,
    pub time_validation_warning: Option<String>,
}

impl ValidationOutcome {
    /// Builds the scan result shown while the form is filled in. With a roster
    /// the display is the shift window, otherwise the scan time and the shift
    /// inferred from it.
    pub fn into_scan_result(self, now: NaiveTime, kiosk: &KioskConfiguration) -> ScanResult {
        let display_time = match &self.roster {
            Some(roster) => format!("{} - {} ({})", roster.start_time, roster.end_time, roster.shift),
            None => {
                let clock = now.format("%H:%M");
                match kiosk.infer_shift(now) {
                    Some(shift) => format!("{clock} ({shift})"),
                    None => clock.to_string(),
                }
            }
        };

        ScanResult {
            employee_id: self.employee.id,
            name: self.employee.name,
            nomor_lambung: self.employee.nomor_lambung,
            display_time,
            roster: self.roster,
            warning: self.time_validation_warning,
        }
    }
}

/// Asks the server whether a badge is valid. Only one request may be in flight.
pub struct ValidationClient<A> {
    api: Arc<A>,
    pending: AtomicBool,
}

struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: AttendanceApi> ValidationClient<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            pending: AtomicBool::new(false),
        }
    }

    pub async fn validate(&self, employee_id: &str, token: &str) -> Result<ValidationOutcome, ValidationError> {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ValidationError::InFlight);
        }
        let _guard = PendingGuard(&self.pending);

        let request = ValidateQrRequest {
            employee_id: employee_id.to_string(),
            token: token.to_string(),
        };

        let response = match self.api.validate_qr(&request).await {
            Ok(response) => response,
            Err(ApiError::Rejected { message, .. }) => return Err(ValidationError::Invalid(message)),
            Err(e) => return Err(ValidationError::Network(e)),
        };

        if !response.valid {
            let message = response.message.unwrap_or_else(|| "QR code tidak valid".to_string());
            warn!("validation refused for {}: {}", employee_id, message);
            return Err(ValidationError::Invalid(message));
        }

        let Some(employee) = response.employee else {
            return Err(ValidationError::Invalid("Data karyawan tidak tersedia".to_string()));
        };

        let time_validation_warning = response
            .time_validation
            .filter(|tv| !tv.is_valid)
            .and_then(|tv| tv.message);

        info!(
            "validated {} ({}), roster: {}",
            employee.id,
            employee.name,
            response.roster.as_ref().map_or("none", |r| r.shift.as_str())
        );

        Ok(ValidationOutcome {
            employee,
            roster: response.roster,
            time_validation_warning,
        })
    }
}
