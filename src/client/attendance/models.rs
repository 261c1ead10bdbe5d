use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQrRequest {
    pub employee_id: String,
    pub token: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQrResponse {
    pub valid: bool,
    pub message: Option<String>,
    pub employee: Option<EmployeeSummary>,
    pub roster: Option<RosterEntry>,
    pub time_validation: Option<TimeValidation>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeSummary {
    pub id: String,
    pub name: String,
    pub nomor_lambung: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub shift: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeValidation {
    #[serde(default = "default_true")]
    pub is_valid: bool,
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub employee_id: String,
    pub date: String,
    pub time: String,
    pub jam_tidur: String,
    pub fit_to_work: String,
    pub status: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AttendanceAck {
    pub success: Option<bool>,
    pub message: Option<String>,
}

/// Error body returned with non-2xx responses. The server uses either key.
#[derive(Deserialize, Debug, Default)]
pub struct ApiErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
}

impl ApiErrorBody {
    pub fn into_message(self) -> Option<String> {
        self.message.or(self.error)
    }
}
