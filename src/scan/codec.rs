//! QR payload codec.
//!
//! Badge payloads have the form `<employeeId>|<token>`. The codec turns camera
//! frames into raw QR text, and raw text into a checked [`QrPayload`] before
//! anything is sent to the server.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use super::frame::Frame;

pub const PAYLOAD_DELIMITER: char = '|';
const MAX_EMPLOYEE_ID_LEN: usize = 32;
const MAX_TOKEN_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QrPayload {
    pub employee_id: String,
    pub token: String,
}

/// Extracts raw QR text from a frame.
pub trait QrReader: Send {
    fn read(&self, frame: &Frame) -> Option<String>;
}

/// Production reader backed by `rqrr`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrReader;

impl QrReader for RqrrReader {
    fn read(&self, frame: &Frame) -> Option<String> {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            frame.width() as usize,
            frame.height() as usize,
            |x, y| frame.pixel(x, y),
        );

        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_, content)) => return Some(content),
                Err(e) => debug!("QR grid decode failed: {:?}", e),
            }
        }
        None
    }
}

pub struct QrCodec {
    reader: Box<dyn QrReader>,
}

impl QrCodec {
    pub fn new(reader: impl QrReader + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    /// Raw QR text found in the frame, if any.
    pub fn read(&self, frame: &Frame) -> Option<String> {
        self.reader.read(frame)
    }

    /// Reads and validates in one step. Frames without a QR code, or with a
    /// QR code that is not a badge payload, both yield `None`.
    pub fn decode(&self, frame: &Frame) -> Option<QrPayload> {
        self.read(frame).and_then(|raw| Self::validate(&raw))
    }

    pub fn validate(raw: &str) -> Option<QrPayload> {
        let (employee_id, token) = raw.trim().split_once(PAYLOAD_DELIMITER)?;

        if employee_id.is_empty() || employee_id.len() > MAX_EMPLOYEE_ID_LEN || !employee_id.chars().all(is_id_char) {
            return None;
        }
        if token.is_empty() || token.len() > MAX_TOKEN_LEN || !token.chars().all(is_token_char) {
            return None;
        }

        Some(QrPayload {
            employee_id: employee_id.to_string(),
            token: token.to_string(),
        })
    }

    pub fn encode(employee_id: &str, token: &str) -> String {
        format!("{employee_id}{PAYLOAD_DELIMITER}{token}")
    }
}

impl Default for QrCodec {
    fn default() -> Self {
        Self::new(RqrrReader)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks badge tokens: HMAC-SHA256 of the employee id, base64url.
#[derive(Clone)]
pub struct QrTokenSigner {
    keyed: HmacSha256,
}

impl QrTokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            keyed: HmacSha256::new_from_slice(secret.as_ref())?,
        })
    }

    fn mac(&self, employee_id: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(employee_id.as_bytes());
        mac
    }

    pub fn sign(&self, employee_id: &str) -> String {
        URL_SAFE_NO_PAD.encode(self.mac(employee_id).finalize().into_bytes())
    }

    pub fn verify(&self, employee_id: &str, token: &str) -> bool {
        match URL_SAFE_NO_PAD.decode(token) {
            Ok(bytes) => self.mac(employee_id).verify_slice(&bytes).is_ok(),
            Err(_) => false,
        }
    }

    /// Full payload text to print on the employee's badge.
    pub fn issue(&self, employee_id: &str) -> String {
        QrCodec::encode(employee_id, &self.sign(employee_id))
    }
}
