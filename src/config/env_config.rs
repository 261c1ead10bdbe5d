use std::env;
use std::path::PathBuf;

use aes::Aes128;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use block_modes::{BlockMode, Cbc};
use block_padding::Pkcs7;
use chrono_tz::Tz;

use crate::error::ConfigError;

type Aes128Cbc = Cbc<Aes128, Pkcs7>;

pub struct Config {
    pub api_base_url: String,
    pub api_key: String,
    pub kiosk_config_path: PathBuf,
    pub camera_dir: PathBuf,
    pub log_dir: PathBuf,
    pub timezone: Tz,
    pub qr_signing_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let api_base_url = var_or("API_BASE_URL", "http://localhost:3000");
        let kiosk_config_path = PathBuf::from(var_or("KIOSK_CONFIG_PATH", "kiosk_configuration.json"));
        let camera_dir = PathBuf::from(var_or("CAMERA_DIR", "camera"));
        let log_dir = PathBuf::from(var_or("LOG_DIR", "."));
        let qr_signing_secret = var_or("QR_SIGNING_SECRET", "");

        let timezone = parse_timezone(&var_or("TIMEZONE", "Asia/Jakarta"))?;

        let api_key = match (
            env::var("AES_KEY"),
            env::var("AES_IV"),
            env::var("API_KEY_ENC"),
        ) {
            (Ok(key_b64), Ok(iv_b64), Ok(enc_b64)) => decrypt_api_key(&key_b64, &iv_b64, &enc_b64)?,
            _ => var_or("API_KEY", ""),
        };

        Ok(Config {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_key,
            kiosk_config_path,
            camera_dir,
            log_dir,
            timezone,
            qr_signing_secret,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>().map_err(|reason| ConfigError::InvalidVar {
        name: "TIMEZONE",
        reason: reason.to_string(),
    })
}

/// Decrypts an AES-128-CBC/PKCS7 encrypted API key. All three inputs are base64.
pub fn decrypt_api_key(key_b64: &str, iv_b64: &str, enc_b64: &str) -> Result<String, ConfigError> {
    let key = STANDARD
        .decode(key_b64)
        .map_err(|e| ConfigError::ApiKey(format!("key is not base64: {e}")))?;
    let iv = STANDARD
        .decode(iv_b64)
        .map_err(|e| ConfigError::ApiKey(format!("iv is not base64: {e}")))?;
    let ciphertext = STANDARD
        .decode(enc_b64)
        .map_err(|e| ConfigError::ApiKey(format!("ciphertext is not base64: {e}")))?;

    let cipher = Aes128Cbc::new_from_slices(&key, &iv).map_err(|e| ConfigError::ApiKey(e.to_string()))?;
    let decrypted = cipher
        .decrypt_vec(&ciphertext)
        .map_err(|e| ConfigError::ApiKey(e.to_string()))?;

    String::from_utf8(decrypted).map_err(|_| ConfigError::ApiKey("decrypted key is not UTF-8".to_string()))
}
