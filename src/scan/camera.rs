//! Camera access and the frame sampling loop.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::frame::Frame;
use crate::error::CameraError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera, pointed away from the operator.
    #[default]
    Environment,
    User,
}

/// Something that can hand out a live frame stream.
pub trait CameraDevice: Send {
    fn open(&mut self, facing: Facing) -> Result<Box<dyn FrameStream>, CameraError>;
}

/// An open camera stream. Dropping it releases the camera.
pub trait FrameStream: Send {
    /// Next available frame; `Ok(None)` when no new frame is ready yet.
    /// `CameraError::Disconnected` ends the stream.
    fn grab(&mut self) -> Result<Option<Frame>, CameraError>;
}

/// Samples one frame per tick from an exclusively owned camera stream.
pub struct FrameSampler {
    device: Box<dyn CameraDevice>,
    stream: Option<Box<dyn FrameStream>>,
    ticker: Option<Interval>,
    active: bool,
    facing: Facing,
    frame_interval: Duration,
    max_dimension: u32,
}

impl FrameSampler {
    pub fn new(device: impl CameraDevice + 'static, frame_interval: Duration, max_dimension: u32) -> Self {
        Self {
            device: Box::new(device),
            stream: None,
            ticker: None,
            active: false,
            facing: Facing::Environment,
            frame_interval,
            max_dimension,
        }
    }

    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    /// Opens the configured camera, the rear one by default. Must be called from within a tokio runtime.
    /// Calling it while already active is a no-op.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.active {
            return Ok(());
        }

        let stream = self.device.open(self.facing)?;
        let mut ticker = tokio::time::interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.stream = Some(stream);
        self.ticker = Some(ticker);
        self.active = true;
        info!("camera started");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.ticker = None;
        if self.stream.take().is_some() {
            info!("camera stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Waits for the next frame tick and samples one downscaled frame.
    /// Returns `None` when sampling is inactive or no frame was available. A
    /// disconnected stream stops sampling.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        let ticker = self.ticker.as_mut()?;
        ticker.tick().await;

        if !self.active {
            return None;
        }
        let stream = self.stream.as_mut()?;
        match stream.grab() {
            Ok(Some(frame)) => Some(frame.downscale(self.max_dimension)),
            Ok(None) => None,
            Err(CameraError::Disconnected) => {
                warn!("camera disconnected");
                self.stop();
                None
            }
            Err(e) => {
                warn!("frame capture failed: {}", e);
                None
            }
        }
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replays still images (png/jpeg) from a directory as a camera feed, looping
/// forever. Used for unattended replay setups and tests.
pub struct DirectoryCamera {
    dir: PathBuf,
}

impl DirectoryCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CameraDevice for DirectoryCamera {
    fn open(&mut self, facing: Facing) -> Result<Box<dyn FrameStream>, CameraError> {
        debug!("opening {:?} camera from {}", facing, self.dir.display());
        let paths = list_images(&self.dir)?;
        if paths.is_empty() {
            return Err(CameraError::Unavailable(format!("no images in {}", self.dir.display())));
        }
        Ok(Box::new(DirectoryStream { paths, next: 0 }))
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => CameraError::PermissionDenied,
        _ => CameraError::Unavailable(format!("{}: {}", dir.display(), e)),
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        })
        .collect();
    paths.sort();
    Ok(paths)
}

struct DirectoryStream {
    paths: Vec<PathBuf>,
    next: usize,
}

impl FrameStream for DirectoryStream {
    fn grab(&mut self) -> Result<Option<Frame>, CameraError> {
        let path = &self.paths[self.next % self.paths.len()];
        self.next = (self.next + 1) % self.paths.len();

        let image = image::open(path).map_err(|e| CameraError::Frame(format!("{}: {}", path.display(), e)))?;
        Ok(Some(Frame::from(image.to_luma8())))
    }
}
