pub mod models;
pub mod services;

use async_trait::async_trait;

use crate::error::ApiError;
use models::{AttendanceAck, AttendanceRecord, ValidateQrRequest, ValidateQrResponse};

pub use services::HttpAttendanceApi;

/// Server endpoints the scan workflow depends on.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn validate_qr(&self, request: &ValidateQrRequest) -> Result<ValidateQrResponse, ApiError>;

    async fn create_attendance(&self, record: &AttendanceRecord) -> Result<AttendanceAck, ApiError>;
}
