pub mod cache;
pub mod camera;
pub mod codec;
pub mod debounce;
pub mod frame;
pub mod notice;
pub mod session;
pub mod state;
pub mod submission;
pub mod validation;

pub use cache::{CacheKey, ReadSideCache};
pub use camera::{CameraDevice, DirectoryCamera, Facing, FrameSampler, FrameStream};
pub use codec::{QrCodec, QrPayload, QrReader, QrTokenSigner, RqrrReader};
pub use debounce::Debouncer;
pub use frame::Frame;
pub use notice::{Notice, NoticeLevel};
pub use session::{Operator, ScanSession, ScanStep};
pub use state::{ScanEvent, ScanPhase, ScanResult, ScanState};
pub use submission::{AttendanceForm, FailureCategory, Fitness, SleepHours, SubmissionClient, SubmissionFailure};
pub use validation::{ValidationClient, ValidationOutcome};
