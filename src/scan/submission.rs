use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{info, warn};

use super::cache::{CacheKey, ReadSideCache};
use super::state::ScanResult;
use crate::client::attendance::AttendanceApi;
use crate::client::attendance::models::{AttendanceAck, AttendanceRecord};
use crate::error::SubmitError;

const ATTENDANCE_STATUS: &str = "present";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepHours {
    Four,
    Five,
    Six,
    Seven,
    Eight,
    MoreThanEight,
}

impl SleepHours {
    pub const ALL: [SleepHours; 6] = [
        SleepHours::Four,
        SleepHours::Five,
        SleepHours::Six,
        SleepHours::Seven,
        SleepHours::Eight,
        SleepHours::MoreThanEight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SleepHours::Four => "4",
            SleepHours::Five => "5",
            SleepHours::Six => "6",
            SleepHours::Seven => "7",
            SleepHours::Eight => "8",
            SleepHours::MoreThanEight => "8+",
        }
    }
}

impl FromStr for SleepHours {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|h| h.as_str() == s.trim()).ok_or(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fitness {
    FitToWork,
    UnfitToWork,
}

impl Fitness {
    pub const ALL: [Fitness; 2] = [Fitness::FitToWork, Fitness::UnfitToWork];

    pub fn as_str(&self) -> &'static str {
        match self {
            Fitness::FitToWork => "Fit To Work",
            Fitness::UnfitToWork => "Unfit To Work",
        }
    }
}

impl FromStr for Fitness {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Raw form input as typed at the kiosk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceForm {
    pub jam_tidur: String,
    pub fit_to_work: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedForm {
    pub sleep_hours: SleepHours,
    pub fitness: Fitness,
}

impl AttendanceForm {
    pub fn new(jam_tidur: impl Into<String>, fit_to_work: impl Into<String>) -> Self {
        Self {
            jam_tidur: jam_tidur.into(),
            fit_to_work: fit_to_work.into(),
        }
    }

    /// Both fields are required before anything is sent.
    pub fn complete(&self) -> Result<CompletedForm, SubmitError> {
        if self.jam_tidur.trim().is_empty() {
            return Err(SubmitError::MissingField("jamTidur"));
        }
        if self.fit_to_work.trim().is_empty() {
            return Err(SubmitError::MissingField("fitToWork"));
        }
        let sleep_hours = self.jam_tidur.parse().map_err(|_| SubmitError::InvalidField {
            field: "jamTidur",
            value: self.jam_tidur.clone(),
        })?;
        let fitness = self.fit_to_work.parse().map_err(|_| SubmitError::InvalidField {
            field: "fitToWork",
            value: self.fit_to_work.clone(),
        })?;
        Ok(CompletedForm { sleep_hours, fitness })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    AlreadySubmitted,
    NotScheduled,
    EmployeeNotFound,
    ShiftMismatch,
    Generic,
}

impl FailureCategory {
    /// Matched against the lowercased server message; first hit wins.
    const PATTERNS: [(&'static str, FailureCategory); 5] = [
        ("sudah melakukan absensi", FailureCategory::AlreadySubmitted),
        ("tidak dijadwalkan", FailureCategory::NotScheduled),
        ("tidak ditemukan", FailureCategory::EmployeeNotFound),
        ("di luar jam", FailureCategory::ShiftMismatch),
        ("shift", FailureCategory::ShiftMismatch),
    ];

    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        Self::PATTERNS
            .iter()
            .find(|(needle, _)| message.contains(needle))
            .map_or(FailureCategory::Generic, |(_, category)| *category)
    }

    pub fn title(&self) -> &'static str {
        match self {
            FailureCategory::AlreadySubmitted => "Sudah Absen Hari Ini",
            FailureCategory::NotScheduled => "Tidak Dijadwalkan",
            FailureCategory::EmployeeNotFound => "Karyawan Tidak Ditemukan",
            FailureCategory::ShiftMismatch => "Di Luar Jam Shift",
            FailureCategory::Generic => "Gagal Menyimpan Absensi",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    pub category: FailureCategory,
    pub message: String,
}

impl SubmissionFailure {
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            category: FailureCategory::classify(&message),
            message,
        }
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category.title(), self.message)
    }
}

/// Posts attendance records and refreshes the views that depend on them.
pub struct SubmissionClient<A> {
    api: Arc<A>,
    cache: ReadSideCache,
}

impl<A: AttendanceApi> SubmissionClient<A> {
    pub fn new(api: Arc<A>, cache: ReadSideCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &ReadSideCache {
        &self.cache
    }

    pub fn record_for(result: &ScanResult, form: &CompletedForm, at: DateTime<Tz>) -> AttendanceRecord {
        AttendanceRecord {
            employee_id: result.employee_id.clone(),
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            jam_tidur: form.sleep_hours.as_str().to_string(),
            fit_to_work: form.fitness.as_str().to_string(),
            status: ATTENDANCE_STATUS.to_string(),
        }
    }

    pub async fn submit(
        &self,
        result: &ScanResult,
        form: &AttendanceForm,
        at: DateTime<Tz>,
    ) -> Result<AttendanceAck, SubmitError> {
        let completed = form.complete()?;
        let record = Self::record_for(result, &completed, at);

        match self.api.create_attendance(&record).await {
            Ok(ack) => {
                info!("attendance recorded for {} at {} {}", record.employee_id, record.date, record.time);
                self.cache.invalidate(&CacheKey::AFTER_ATTENDANCE);
                Ok(ack)
            }
            Err(e) => {
                let failure = SubmissionFailure::classify(e.user_message());
                warn!("attendance for {} failed: {}", record.employee_id, failure);
                Err(SubmitError::Rejected(failure))
            }
        }
    }
}
