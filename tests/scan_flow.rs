use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;
use chrono_tz::Asia::Jakarta;
use reqwest::StatusCode;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use qr_attendance_kiosk::client::attendance::AttendanceApi;
use qr_attendance_kiosk::client::attendance::models::{
    AttendanceAck, AttendanceRecord, EmployeeSummary, RosterEntry, ValidateQrRequest, ValidateQrResponse,
};
use qr_attendance_kiosk::config::KioskConfiguration;
use qr_attendance_kiosk::error::{ApiError, CameraError, SubmitError};
use qr_attendance_kiosk::scan::{
    AttendanceForm, CacheKey, CameraDevice, Facing, FailureCategory, Frame, FrameStream, Notice, NoticeLevel,
    Operator, QrReader, ReadSideCache, ScanPhase, ScanResult, ScanSession, ScanState, ScanStep,
};

/// Frames carry their QR text directly as pixel bytes; a leading zero byte
/// means "no QR code in view".
struct TextReader;

impl QrReader for TextReader {
    fn read(&self, frame: &Frame) -> Option<String> {
        match frame.luma().first() {
            None | Some(0) => None,
            Some(_) => String::from_utf8(frame.luma().to_vec()).ok(),
        }
    }
}

fn qr_frame(text: &str) -> Frame {
    Frame::from_luma(text.len() as u32, 1, text.as_bytes().to_vec()).unwrap()
}

fn empty_frame() -> Frame {
    Frame::from_luma(4, 1, vec![0; 4]).unwrap()
}

#[derive(Clone, Default)]
struct FakeCamera {
    frames: Arc<Mutex<VecDeque<Frame>>>,
    opened: Arc<AtomicUsize>,
    unplug_when_empty: Arc<AtomicBool>,
}

impl FakeCamera {
    fn show(&self, frame: Frame) {
        self.frames.lock().unwrap().push_back(frame);
    }

    /// Once the shown frames are used up the stream reports a disconnect.
    fn unplugging(self) -> Self {
        self.unplug_when_empty.store(true, Ordering::SeqCst);
        self
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

struct FakeStream {
    frames: Arc<Mutex<VecDeque<Frame>>>,
    unplug_when_empty: Arc<AtomicBool>,
}

impl CameraDevice for FakeCamera {
    fn open(&mut self, facing: Facing) -> Result<Box<dyn FrameStream>, CameraError> {
        assert_eq!(facing, Facing::Environment);
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            frames: self.frames.clone(),
            unplug_when_empty: self.unplug_when_empty.clone(),
        }))
    }
}

impl FrameStream for FakeStream {
    fn grab(&mut self) -> Result<Option<Frame>, CameraError> {
        match self.frames.lock().unwrap().pop_front() {
            None if self.unplug_when_empty.load(Ordering::SeqCst) => Err(CameraError::Disconnected),
            frame => Ok(frame),
        }
    }
}

#[derive(Default)]
struct FakeApi {
    validation: Mutex<Option<Result<ValidateQrResponse, ApiError>>>,
    attendance: Mutex<Option<Result<AttendanceAck, ApiError>>>,
    validate_calls: AtomicUsize,
    records: Mutex<Vec<AttendanceRecord>>,
}

impl FakeApi {
    fn validating(response: ValidateQrResponse) -> Self {
        Self {
            validation: Mutex::new(Some(Ok(response))),
            ..Default::default()
        }
    }

    fn then_attendance(self, result: Result<AttendanceAck, ApiError>) -> Self {
        *self.attendance.lock().unwrap() = Some(result);
        self
    }

    fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    fn records(&self) -> Vec<AttendanceRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AttendanceApi for FakeApi {
    async fn validate_qr(&self, request: &ValidateQrRequest) -> Result<ValidateQrResponse, ApiError> {
        assert_eq!(request.employee_id, "C-0001");
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validation.lock().unwrap().take().expect("unexpected validation call")
    }

    async fn create_attendance(&self, record: &AttendanceRecord) -> Result<AttendanceAck, ApiError> {
        self.records.lock().unwrap().push(record.clone());
        self.attendance.lock().unwrap().take().expect("unexpected attendance call")
    }
}

/// Answers form prompts and restart prompts from a script. An exhausted
/// restart script quits the session.
#[derive(Default)]
struct ScriptedOperator {
    forms: VecDeque<Option<AttendanceForm>>,
    restarts: VecDeque<bool>,
    prompted: Vec<String>,
    restart_prompts: usize,
}

impl ScriptedOperator {
    fn filling(forms: impl IntoIterator<Item = Option<AttendanceForm>>) -> Self {
        Self {
            forms: forms.into_iter().collect(),
            ..Default::default()
        }
    }

    fn restarting(mut self, restarts: impl IntoIterator<Item = bool>) -> Self {
        self.restarts = restarts.into_iter().collect();
        self
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    async fn fill_form(&mut self, result: &ScanResult) -> Option<AttendanceForm> {
        self.prompted.push(result.employee_id.clone());
        self.forms.pop_front().expect("unexpected form prompt")
    }

    async fn wait_for_restart(&mut self) -> bool {
        self.restart_prompts += 1;
        self.restarts.pop_front().unwrap_or(false)
    }
}

fn jane() -> EmployeeSummary {
    EmployeeSummary {
        id: "C-0001".to_string(),
        name: "Jane".to_string(),
        nomor_lambung: None,
    }
}

fn shift_one() -> RosterEntry {
    RosterEntry {
        shift: "Shift 1".to_string(),
        start_time: "06:00".to_string(),
        end_time: "16:00".to_string(),
    }
}

fn valid_with_roster() -> ValidateQrResponse {
    ValidateQrResponse {
        valid: true,
        employee: Some(jane()),
        roster: Some(shift_one()),
        ..Default::default()
    }
}

fn session(api: Arc<FakeApi>, camera: FakeCamera) -> (ScanSession<FakeApi>, UnboundedReceiver<Notice>) {
    let (session, notices) = ScanSession::new(
        api,
        camera,
        TextReader,
        ReadSideCache::new(),
        KioskConfiguration::default(),
        Jakarta,
    );
    let session = session.with_clock(|| Jakarta.with_ymd_and_hms(2026, 10, 17, 7, 15, 30).unwrap());
    (session, notices)
}

fn drain(notices: &mut UnboundedReceiver<Notice>) -> Vec<Notice> {
    let mut all = Vec::new();
    while let Ok(notice) = notices.try_recv() {
        all.push(notice);
    }
    all
}

async fn validated_session(api: Arc<FakeApi>) -> (ScanSession<FakeApi>, UnboundedReceiver<Notice>, FakeCamera) {
    let camera = FakeCamera::default();
    let (mut session, notices) = session(api, camera.clone());
    session.start_scanning().unwrap();
    camera.show(qr_frame("C-0001|abc"));
    assert_eq!(session.poll_frame().await, ScanStep::Validated);
    (session, notices, camera)
}

#[tokio::test(start_paused = true)]
async fn valid_badge_with_roster_shows_the_shift_window() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()));
    let (session, _notices, camera) = validated_session(api.clone()).await;

    match session.state() {
        ScanState::Validated(result) => {
            assert_eq!(result.employee_id, "C-0001");
            assert_eq!(result.name, "Jane");
            assert_eq!(result.display_time, "06:00 - 16:00 (Shift 1)");
        }
        other => panic!("expected validated, got {other:?}"),
    }
    assert!(!session.is_scanning());
    assert_eq!(api.validate_calls(), 1);
    assert_eq!(camera.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn frames_without_a_qr_code_change_nothing() {
    let api = Arc::new(FakeApi::default());
    let camera = FakeCamera::default();
    let (mut session, mut notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();

    camera.show(empty_frame());
    assert_eq!(session.poll_frame().await, ScanStep::DecodeMiss);
    assert_eq!(session.poll_frame().await, ScanStep::NoFrame);

    assert_eq!(session.phase(), ScanPhase::Idle);
    assert!(session.is_scanning());
    assert_eq!(api.validate_calls(), 0);
    assert!(drain(&mut notices).is_empty());
}

#[tokio::test(start_paused = true)]
async fn foreign_codes_are_reported_once_per_cooldown() {
    let api = Arc::new(FakeApi::default());
    let camera = FakeCamera::default();
    let (mut session, mut notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();

    for _ in 0..5 {
        camera.show(qr_frame("https://example.com/menu"));
        assert_eq!(session.poll_frame().await, ScanStep::Foreign);
    }

    let shown = drain(&mut notices);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].level, NoticeLevel::Warning);
    assert_eq!(api.validate_calls(), 0);
    assert!(session.is_scanning());

    tokio::time::advance(Duration::from_millis(500)).await;
    camera.show(qr_frame("https://example.com/menu"));
    assert_eq!(session.poll_frame().await, ScanStep::Foreign);
    assert_eq!(drain(&mut notices).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_roster_warns_and_falls_back_to_the_clock() {
    let api = Arc::new(FakeApi::validating(ValidateQrResponse {
        valid: true,
        employee: Some(jane()),
        ..Default::default()
    }));
    let (session, mut notices, _camera) = validated_session(api).await;

    let result = session.state().result().unwrap();
    assert!(result.roster.is_none());
    assert_eq!(result.display_time, "07:15 (Shift 1)");

    let shown = drain(&mut notices);
    assert!(shown.iter().any(|n| n.level == NoticeLevel::Warning && n.title == "Tidak Ada Jadwal"));
}

#[tokio::test(start_paused = true)]
async fn empty_sleep_hours_are_rejected_before_any_request() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()));
    let (mut session, _notices, _camera) = validated_session(api.clone()).await;

    let err = session.submit(&AttendanceForm::new("", "Fit To Work")).await.unwrap_err();

    assert!(matches!(err, SubmitError::MissingField("jamTidur")));
    assert_eq!(session.phase(), ScanPhase::Validated);
    assert!(api.records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_employee_error_is_classified_and_scanning_resumes() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()).then_attendance(Err(ApiError::Rejected {
        status: StatusCode::NOT_FOUND,
        message: "Karyawan tidak ditemukan".to_string(),
    })));
    let (mut session, _notices, camera) = validated_session(api.clone()).await;

    let err = session.submit(&AttendanceForm::new("7", "Fit To Work")).await.unwrap_err();

    match (&err, session.state()) {
        (SubmitError::Rejected(failure), ScanState::Error { failure: shown, .. }) => {
            assert_eq!(failure.category, FailureCategory::EmployeeNotFound);
            assert_eq!(shown.category.title(), "Karyawan Tidak Ditemukan");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(!session.is_scanning());

    session.tick(Instant::now() + Duration::from_secs(1));
    assert_eq!(session.phase(), ScanPhase::Error);

    tokio::time::advance(Duration::from_millis(2500)).await;
    session.tick(Instant::now());
    assert_eq!(session.phase(), ScanPhase::Idle);
    assert!(session.is_scanning());
    assert_eq!(camera.opened.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn successful_submission_refreshes_views_and_rearms_the_camera() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()).then_attendance(Ok(AttendanceAck {
        success: Some(true),
        message: None,
    })));
    let (mut session, _notices, _camera) = validated_session(api.clone()).await;
    let mut invalidations = session.cache().subscribe();

    session.submit(&AttendanceForm::new("8+", "Fit To Work")).await.unwrap();

    assert_eq!(session.phase(), ScanPhase::Success);
    let records = api.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].employee_id, "C-0001");
    assert_eq!(records[0].date, "2026-10-17");
    assert_eq!(records[0].time, "07:15:30");
    assert_eq!(records[0].jam_tidur, "8+");
    assert_eq!(records[0].fit_to_work, "Fit To Work");

    let mut keys = Vec::new();
    while let Ok(key) = invalidations.try_recv() {
        keys.push(key);
    }
    assert_eq!(keys, CacheKey::AFTER_ATTENDANCE);

    let deadline = session.deadline().unwrap();
    assert_eq!(deadline - Instant::now(), Duration::from_secs(3));
    tokio::time::advance(Duration::from_secs(3)).await;
    session.tick(Instant::now());

    assert_eq!(session.phase(), ScanPhase::Idle);
    assert!(session.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn rejected_badge_leaves_the_camera_stopped() {
    let api = Arc::new(FakeApi::validating(ValidateQrResponse {
        valid: false,
        message: Some("QR code tidak valid".to_string()),
        ..Default::default()
    }));
    let camera = FakeCamera::default();
    let (mut session, mut notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();

    camera.show(qr_frame("C-0001|abc"));
    assert_eq!(session.poll_frame().await, ScanStep::Rejected);

    assert_eq!(session.phase(), ScanPhase::Idle);
    assert!(!session.is_scanning());
    assert_eq!(session.poll_frame().await, ScanStep::Inactive);

    let shown = drain(&mut notices);
    assert_eq!(shown.last().unwrap().title, "Validasi Gagal");
    assert_eq!(shown.last().unwrap().message, "QR code tidak valid");
}

#[tokio::test(start_paused = true)]
async fn repeated_decodes_inside_the_cooldown_are_dropped() {
    let api = Arc::new(FakeApi::validating(ValidateQrResponse {
        valid: false,
        ..Default::default()
    }));
    let camera = FakeCamera::default();
    let (mut session, _notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();

    camera.show(qr_frame("C-0001|abc"));
    assert_eq!(session.poll_frame().await, ScanStep::Rejected);

    // operator restarts right away while the badge is still in view
    session.start_scanning().unwrap();
    camera.show(qr_frame("C-0001|abc"));
    assert_eq!(session.poll_frame().await, ScanStep::Debounced);
    assert_eq!(api.validate_calls(), 1);
    assert!(session.is_scanning());
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_form_goes_back_to_scanning() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()));
    let (mut session, _notices, _camera) = validated_session(api).await;

    session.reset().unwrap();

    assert_eq!(session.phase(), ScanPhase::Idle);
    assert!(session.is_scanning());
    assert!(matches!(
        session.submit(&AttendanceForm::new("7", "Fit To Work")).await,
        Err(SubmitError::NotReady(ScanPhase::Idle))
    ));
}

#[tokio::test(start_paused = true)]
async fn stuck_view_refresh_does_not_hold_up_the_submission() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()).then_attendance(Ok(AttendanceAck {
        success: Some(true),
        message: None,
    })));
    let (mut session, _notices, _camera) = validated_session(api.clone()).await;

    // one view hangs in its refetch, another never reads at all
    let mut hanging = session.cache().subscribe();
    let refetch = tokio::spawn(async move {
        let _ = hanging.recv().await;
        std::future::pending::<()>().await
    });
    let _idle_view = session.cache().subscribe();

    let submitted = tokio::time::timeout(
        Duration::from_secs(60),
        session.submit(&AttendanceForm::new("8+", "Fit To Work")),
    )
    .await;

    assert!(matches!(submitted, Ok(Ok(()))));
    assert_eq!(session.phase(), ScanPhase::Success);
    assert_eq!(api.records().len(), 1);
    assert!(!refetch.is_finished());
    refetch.abort();
}

#[tokio::test(start_paused = true)]
async fn run_submits_the_form_and_resumes_after_the_success_display() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()).then_attendance(Ok(AttendanceAck {
        success: Some(true),
        message: None,
    })));
    let camera = FakeCamera::default().unplugging();
    let (mut session, mut notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();
    camera.show(qr_frame("C-0001|abc"));

    let mut operator = ScriptedOperator::filling([Some(AttendanceForm::new("8+", "Fit To Work"))]);
    session.run(&mut operator).await;

    assert_eq!(operator.prompted, ["C-0001"]);
    assert_eq!(operator.restart_prompts, 1);
    assert_eq!(api.records().len(), 1);
    // opened once for the badge, once more after the success display
    assert_eq!(camera.opened(), 2);
    assert_eq!(session.phase(), ScanPhase::Idle);
    assert!(!session.is_scanning());

    let titles: Vec<String> = drain(&mut notices).into_iter().map(|n| n.title).collect();
    assert!(titles.contains(&"Absensi Berhasil".to_string()));
    assert_eq!(titles.last().map(String::as_str), Some("Kamera Terputus"));
}

#[tokio::test(start_paused = true)]
async fn run_prompts_again_after_an_incomplete_form_and_honours_cancel() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()));
    let camera = FakeCamera::default().unplugging();
    let (mut session, mut notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();
    camera.show(qr_frame("C-0001|abc"));

    let mut operator = ScriptedOperator::filling([Some(AttendanceForm::new("", "Fit To Work")), None]);
    session.run(&mut operator).await;

    assert_eq!(operator.prompted.len(), 2);
    assert!(api.records().is_empty());
    assert_eq!(camera.opened(), 2);
    assert_eq!(session.phase(), ScanPhase::Idle);

    let shown = drain(&mut notices);
    assert!(shown.iter().any(|n| n.level == NoticeLevel::Warning && n.title == "Data Belum Lengkap"));
}

#[tokio::test(start_paused = true)]
async fn run_waits_for_the_operator_after_a_rejected_badge() {
    let api = Arc::new(FakeApi::validating(ValidateQrResponse {
        valid: false,
        message: Some("QR code tidak valid".to_string()),
        ..Default::default()
    }));
    let camera = FakeCamera::default().unplugging();
    let (mut session, mut notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();
    camera.show(qr_frame("C-0001|abc"));

    let mut operator = ScriptedOperator::default().restarting([true, false]);
    session.run(&mut operator).await;

    assert!(operator.prompted.is_empty());
    assert_eq!(operator.restart_prompts, 2);
    assert_eq!(api.validate_calls(), 1);
    assert_eq!(camera.opened(), 2);
    assert!(!session.is_scanning());

    let titles: Vec<String> = drain(&mut notices).into_iter().map(|n| n.title).collect();
    assert_eq!(titles, ["Validasi Gagal", "Kamera Terputus"]);
}

#[tokio::test(start_paused = true)]
async fn run_shows_a_duplicate_attendance_and_resumes_after_the_error_display() {
    let api = Arc::new(FakeApi::validating(valid_with_roster()).then_attendance(Err(ApiError::Rejected {
        status: StatusCode::CONFLICT,
        message: "Karyawan sudah melakukan absensi hari ini".to_string(),
    })));
    let camera = FakeCamera::default().unplugging();
    let (mut session, mut notices) = session(api.clone(), camera.clone());
    session.start_scanning().unwrap();
    camera.show(qr_frame("C-0001|abc"));

    let started = Instant::now();
    let mut operator = ScriptedOperator::filling([Some(AttendanceForm::new("7", "Fit To Work"))]);
    session.run(&mut operator).await;

    assert!(Instant::now() - started >= Duration::from_millis(2500));
    assert_eq!(api.records().len(), 1);
    assert_eq!(camera.opened(), 2);
    assert_eq!(operator.restart_prompts, 1);
    assert_eq!(session.phase(), ScanPhase::Idle);

    let shown = drain(&mut notices);
    assert!(shown.iter().any(|n| n.level == NoticeLevel::Error && n.title == "Sudah Absen Hari Ini"));
}
