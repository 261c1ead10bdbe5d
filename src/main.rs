use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use qr_attendance_kiosk::client::attendance::HttpAttendanceApi;
use qr_attendance_kiosk::config::{Config, KioskConfiguration};
use qr_attendance_kiosk::logging;
use qr_attendance_kiosk::operator::StdinOperator;
use qr_attendance_kiosk::scan::{DirectoryCamera, QrCodec, QrTokenSigner, ReadSideCache, RqrrReader, ScanSession};

#[tokio::main]
async fn main() {
    let env = match Config::from_env() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return;
        }
    };
    logging::init(&env.log_dir);
    info!("kiosk starting, API: {}, timezone: {}", env.api_base_url, env.timezone);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [command, argument] = args.as_slice() {
        match command.as_str() {
            "issue" => return issue(&env, argument),
            "verify" => return verify(&env, argument),
            _ => {}
        }
    }

    let kiosk = match KioskConfiguration::load_or_init(&env.kiosk_config_path) {
        Ok(kiosk) => kiosk,
        Err(e) => {
            error!("could not load {}: {}", env.kiosk_config_path.display(), e);
            return;
        }
    };

    let api = Arc::new(HttpAttendanceApi::new(env.api_base_url.clone(), env.api_key.clone()));
    let (mut session, mut notices) = ScanSession::new(
        api,
        DirectoryCamera::new(&env.camera_dir),
        RqrrReader,
        ReadSideCache::new(),
        kiosk,
        env.timezone,
    );

    let mut invalidations = session.cache().subscribe();
    tokio::spawn(async move {
        loop {
            match invalidations.recv().await {
                Ok(key) => info!("view {} is stale", key),
                Err(RecvError::Lagged(missed)) => warn!("missed {} view invalidations", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            notice.log();
        }
    });

    let _ = session.start_scanning();
    let mut operator = StdinOperator::new();

    tokio::select! {
        _ = session.run(&mut operator) => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
    }
    session.stop_scanning();
    info!("kiosk stopped");
}

fn signer(env: &Config) -> Option<QrTokenSigner> {
    if env.qr_signing_secret.is_empty() {
        error!("QR_SIGNING_SECRET is not set");
        return None;
    }
    QrTokenSigner::new(&env.qr_signing_secret)
        .inspect_err(|e| error!("invalid signing secret: {}", e))
        .ok()
}

fn issue(env: &Config, employee_id: &str) {
    if let Some(signer) = signer(env) {
        let payload = signer.issue(employee_id);
        if QrCodec::validate(&payload).is_none() {
            error!("{:?} is not a valid employee id for a badge", employee_id);
            return;
        }
        println!("{payload}");
    }
}

/// Checks a badge payload against the local signing secret.
fn verify(env: &Config, payload: &str) {
    let Some(signer) = signer(env) else {
        return;
    };
    match QrCodec::validate(payload) {
        Some(badge) if signer.verify(&badge.employee_id, &badge.token) => {
            println!("valid badge for {}", badge.employee_id)
        }
        Some(badge) => println!("token does not match {}", badge.employee_id),
        None => println!("not an attendance badge"),
    }
}
