//! The scan session ties camera, codec, server calls and state together in a
//! single cooperative task.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info};

use super::cache::ReadSideCache;
use super::camera::{CameraDevice, FrameSampler};
use super::codec::{QrCodec, QrReader};
use super::debounce::Debouncer;
use super::notice::{Notice, NoticeLevel};
use super::state::{ScanEvent, ScanPhase, ScanResult, ScanState};
use super::submission::{AttendanceForm, SubmissionClient, SubmissionFailure};
use super::validation::ValidationClient;
use crate::client::attendance::AttendanceApi;
use crate::config::KioskConfiguration;
use crate::error::{CameraError, InvalidTransition, SubmitError, ValidationError};

/// What one sampling iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// Not idle, or the camera is stopped.
    Inactive,
    NoFrame,
    DecodeMiss,
    /// A QR code that is not an attendance badge.
    Foreign,
    Debounced,
    Busy,
    Validated,
    Rejected,
}

/// The person operating the kiosk.
#[async_trait]
pub trait Operator: Send {
    /// Collects the attendance form; `None` cancels the scan.
    async fn fill_form(&mut self, result: &ScanResult) -> Option<AttendanceForm>;

    /// Waits until scanning should restart; `false` ends the session.
    async fn wait_for_restart(&mut self) -> bool;
}

type Clock = Box<dyn Fn() -> DateTime<Tz> + Send + Sync>;

pub struct ScanSession<A> {
    sampler: FrameSampler,
    codec: QrCodec,
    scan_debouncer: Debouncer,
    foreign_notices: Debouncer,
    validator: ValidationClient<A>,
    submitter: SubmissionClient<A>,
    kiosk: KioskConfiguration,
    clock: Clock,
    state: ScanState,
    notices: mpsc::UnboundedSender<Notice>,
}

impl<A: AttendanceApi> ScanSession<A> {
    pub fn new(
        api: Arc<A>,
        camera: impl CameraDevice + 'static,
        reader: impl QrReader + 'static,
        cache: ReadSideCache,
        kiosk: KioskConfiguration,
        timezone: Tz,
    ) -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            sampler: FrameSampler::new(camera, kiosk.frame_interval(), kiosk.max_frame_dimension)
                .with_facing(kiosk.camera_facing),
            codec: QrCodec::new(reader),
            scan_debouncer: Debouncer::new(kiosk.scan_cooldown()),
            foreign_notices: Debouncer::new(kiosk.scan_cooldown()),
            validator: ValidationClient::new(api.clone()),
            submitter: SubmissionClient::new(api, cache),
            kiosk,
            clock: Box::new(move || Utc::now().with_timezone(&timezone)),
            state: ScanState::Idle,
            notices: tx,
        };
        (session, rx)
    }

    /// Replaces the wall clock used for display and record timestamps.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Tz> + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn phase(&self) -> ScanPhase {
        self.state.phase()
    }

    pub fn is_scanning(&self) -> bool {
        self.sampler.is_active()
    }

    pub fn cache(&self) -> &ReadSideCache {
        self.submitter.cache()
    }

    /// When the current success/error display ends.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            ScanState::Success { until, .. } | ScanState::Error { until, .. } => Some(*until),
            _ => None,
        }
    }

    fn notify(&self, level: NoticeLevel, title: &str, message: impl Into<String>) {
        let notice = Notice::new(level, title, message);
        debug!("notice: {:?}", notice);
        // the receiver may be gone during shutdown
        let _ = self.notices.send(notice);
    }

    pub fn start_scanning(&mut self) -> Result<(), CameraError> {
        if !self.state.scanning_allowed() {
            return Ok(());
        }
        self.sampler.start().inspect_err(|e| {
            self.notify(NoticeLevel::Error, "Kamera Tidak Tersedia", e.to_string());
        })?;
        Ok(())
    }

    pub fn stop_scanning(&mut self) {
        self.sampler.stop();
    }

    fn transition(&mut self, event: ScanEvent) -> Result<(), InvalidTransition> {
        let was_idle = self.state.scanning_allowed();
        self.state = self.state.clone().apply(event)?;

        match (was_idle, self.state.scanning_allowed()) {
            (true, false) => self.sampler.stop(),
            (false, true) => {
                info!("scan finished, resuming camera");
                // failures are already reported as a notice
                let _ = self.start_scanning();
            }
            _ => {}
        }
        Ok(())
    }

    /// One iteration of the sampling loop.
    pub async fn poll_frame(&mut self) -> ScanStep {
        if !self.state.scanning_allowed() || !self.sampler.is_active() {
            return ScanStep::Inactive;
        }

        let Some(frame) = self.sampler.next_frame().await else {
            if !self.sampler.is_active() {
                self.notify(NoticeLevel::Error, "Kamera Terputus", "Mulai ulang scan untuk melanjutkan");
                return ScanStep::Inactive;
            }
            return ScanStep::NoFrame;
        };
        let Some(raw) = self.codec.read(&frame) else {
            return ScanStep::DecodeMiss;
        };

        let now = Instant::now();
        let Some(payload) = QrCodec::validate(&raw) else {
            if self.foreign_notices.should_accept(now) {
                self.notify(
                    NoticeLevel::Warning,
                    "QR Code Tidak Dikenali",
                    "QR code ini bukan QR code absensi karyawan",
                );
            }
            return ScanStep::Foreign;
        };

        if !self.scan_debouncer.should_accept(now) {
            return ScanStep::Debounced;
        }

        self.sampler.stop();
        let outcome = match self.validator.validate(&payload.employee_id, &payload.token).await {
            Ok(outcome) => outcome,
            Err(ValidationError::InFlight) => {
                let _ = self.start_scanning();
                return ScanStep::Busy;
            }
            Err(e) => {
                let message = match e {
                    ValidationError::Invalid(message) => message,
                    other => other.to_string(),
                };
                self.notify(NoticeLevel::Error, "Validasi Gagal", message);
                return ScanStep::Rejected;
            }
        };

        if outcome.roster.is_none() {
            self.notify(
                NoticeLevel::Warning,
                "Tidak Ada Jadwal",
                format!("{} tidak memiliki jadwal roster untuk hari ini", outcome.employee.name),
            );
        }
        if let Some(warning) = &outcome.time_validation_warning {
            self.notify(NoticeLevel::Warning, "Peringatan Waktu", warning.clone());
        }

        let result = outcome.into_scan_result((self.clock)().time(), &self.kiosk);
        self.notify(
            NoticeLevel::Success,
            "QR Code Valid",
            format!("{} ({})", result.name, result.display_time),
        );

        match self.transition(ScanEvent::Validated(result)) {
            Ok(()) => ScanStep::Validated,
            Err(e) => {
                debug!("dropping validated scan: {}", e);
                ScanStep::Busy
            }
        }
    }

    /// Submits the form for the validated scan. A missing or invalid field is
    /// rejected before any request and leaves the scan validated.
    pub async fn submit(&mut self, form: &AttendanceForm) -> Result<(), SubmitError> {
        let ScanState::Validated(result) = &self.state else {
            return Err(SubmitError::NotReady(self.phase()));
        };
        let result = result.clone();

        if let Err(e) = form.complete() {
            self.notify(NoticeLevel::Warning, "Data Belum Lengkap", e.to_string());
            return Err(e);
        }

        self.transition(ScanEvent::SubmitStarted)?;
        let at = (self.clock)();

        match self.submitter.submit(&result, form, at).await {
            Ok(_) => {
                self.notify(
                    NoticeLevel::Success,
                    "Absensi Berhasil",
                    format!("Absensi {} tercatat pukul {}", result.name, at.format("%H:%M")),
                );
                let until = Instant::now() + self.kiosk.success_delay();
                self.transition(ScanEvent::Submitted { until })?;
                Ok(())
            }
            Err(e) => {
                let failure = match e {
                    SubmitError::Rejected(failure) => failure,
                    other => SubmissionFailure::classify(other.to_string()),
                };
                self.notify(NoticeLevel::Error, failure.category.title(), failure.message.clone());
                let until = Instant::now() + self.kiosk.error_delay();
                self.transition(ScanEvent::SubmitFailed {
                    failure: failure.clone(),
                    until,
                })?;
                Err(SubmitError::Rejected(failure))
            }
        }
    }

    /// Ends an expired success/error display, re-arming the camera.
    pub fn tick(&mut self, now: Instant) {
        let _ = self.transition(ScanEvent::Tick(now));
    }

    /// User cancel/retry.
    pub fn reset(&mut self) -> Result<(), InvalidTransition> {
        self.transition(ScanEvent::Reset)
    }

    /// Drives the session until the operator quits.
    pub async fn run(&mut self, operator: &mut impl Operator) {
        loop {
            match self.phase() {
                ScanPhase::Idle if self.sampler.is_active() => {
                    self.poll_frame().await;
                }
                ScanPhase::Idle => {
                    if !operator.wait_for_restart().await {
                        break;
                    }
                    let _ = self.start_scanning();
                }
                ScanPhase::Validated => {
                    let Some(result) = self.state.result().cloned() else {
                        continue;
                    };
                    match operator.fill_form(&result).await {
                        Some(form) => {
                            let _ = self.submit(&form).await;
                        }
                        None => {
                            let _ = self.reset();
                        }
                    }
                }
                ScanPhase::Success | ScanPhase::Error => {
                    if let Some(deadline) = self.deadline() {
                        tokio::time::sleep_until(deadline).await;
                    }
                    self.tick(Instant::now());
                }
                // only observable inside `submit`
                ScanPhase::Processing => tokio::task::yield_now().await,
            }
        }
        self.stop_scanning();
        info!("scan session ended");
    }
}
