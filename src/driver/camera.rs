//! Camera capture, histogram read and frame persistence.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use crate::sensor::SensorConfig;
use crate::storage::FieldMap;

use super::traits::{Driver, DriverError, Frame, FrameSource, FrameStore};

/// Field written by the formatted read.
pub const HISTOGRAM_FIELD: &str = "Integrated Histogram";

/// Captures stills by running a `rpicam-still` compatible program that
/// writes a JPEG to stdout.
#[derive(Debug, Clone)]
pub struct CameraDriver {
    command: String,
    warmup: Duration,
}

impl CameraDriver {
    pub fn new(command: impl Into<String>, warmup: Duration) -> Self {
        Self {
            command: command.into(),
            warmup,
        }
    }

    fn run_capture(&self) -> Result<Vec<u8>, DriverError> {
        let timeout_ms = self.warmup.as_millis().max(1).to_string();
        let output = Command::new(&self.command)
            .args(["--nopreview", "-t", &timeout_ms, "-e", "jpg", "-o", "-"])
            .output()
            .map_err(|e| DriverError::Camera(format!("cannot run '{}': {}", self.command, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriverError::Camera(format!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(DriverError::Camera(format!(
                "'{}' produced no image data",
                self.command
            )));
        }
        Ok(output.stdout)
    }
}

impl FrameSource for CameraDriver {
    fn capture(&self, sensor: &SensorConfig) -> Result<Frame, DriverError> {
        let bytes = self.run_capture()?;
        let mut image = image::load_from_memory(&bytes)?;
        if sensor.rotate {
            image = image.rotate180();
        }
        let frame = Frame::new(image);
        tracing::debug!(width = frame.width(), height = frame.height(), "Captured frame");
        Ok(frame)
    }
}

impl Driver for CameraDriver {
    fn name(&self) -> &'static str {
        "camera"
    }

    fn read(&self, sensor: &SensorConfig) -> Result<FieldMap, DriverError> {
        let frame = self.capture(sensor)?;
        let value = integrate_histogram(&blue_histogram(&frame));
        Ok(FieldMap::from([(HISTOGRAM_FIELD.to_string(), value)]))
    }
}

/// 256-bin histogram of the blue channel.
pub fn blue_histogram(frame: &Frame) -> [u64; 256] {
    let mut bins = [0u64; 256];
    for pixel in frame.image().to_rgb8().pixels() {
        bins[pixel.0[2] as usize] += 1;
    }
    bins
}

/// Trapezoidal integral of a histogram with unit bin spacing.
pub fn integrate_histogram(bins: &[u64]) -> f64 {
    bins.windows(2)
        .map(|w| (w[0] + w[1]) as f64 / 2.0)
        .sum()
}

/// Writes frames to the local filesystem; the extension picks the encoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageFileStore;

impl FrameStore for ImageFileStore {
    fn save(&self, frame: &Frame, target: &Path) -> Result<(), DriverError> {
        frame.image().save(target)?;
        tracing::debug!(path = %target.display(), "Saved frame");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::SensorKind;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    /// 2x1 image: left pixel blue=10, right pixel blue=200.
    fn sample_frame() -> Frame {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 10]));
        img.put_pixel(1, 0, Rgb([0, 255, 200]));
        Frame::new(DynamicImage::ImageRgb8(img))
    }

    fn fake_camera(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-still");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{}", body).unwrap();
        file.sync_all().unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_blue_histogram() {
        let bins = blue_histogram(&sample_frame());
        assert_eq!(bins[10], 1);
        assert_eq!(bins[200], 1);
        assert_eq!(bins.iter().sum::<u64>(), 2);
    }

    #[test]
    fn test_integrate_histogram() {
        assert_eq!(integrate_histogram(&[1, 3, 5]), 6.0);
        assert_eq!(integrate_histogram(&[7]), 0.0);
        // Interior bins count fully, edge bins half.
        let mut bins = [0u64; 256];
        bins[0] = 4;
        bins[128] = 10;
        bins[255] = 4;
        assert_eq!(integrate_histogram(&bins), 14.0);
    }

    #[test]
    fn test_save_png() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("frame.png");
        ImageFileStore.save(&sample_frame(), &target).unwrap();

        let loaded = image::open(&target).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (2, 1));
    }

    #[test]
    fn test_save_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("frame.png");
        assert!(ImageFileStore.save(&sample_frame(), &target).is_err());
    }

    // Process-spawning cases share one test so no other test forks while the
    // fake program is being written.
    #[test]
    fn test_capture_via_command() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("still.png");
        sample_frame().image().save(&still).unwrap();

        let command = fake_camera(dir.path(), &format!("cat '{}'", still.display()));
        let camera = CameraDriver::new(command, Duration::from_millis(10));

        let sensor = SensorConfig::new(SensorKind::Camera).with_rotate(false);
        let frame = camera.capture(&sensor).unwrap();
        assert_eq!((frame.width(), frame.height()), (2, 1));
        assert_eq!(frame.image().to_rgb8().get_pixel(0, 0), &Rgb([255, 0, 10]));

        let rotated = camera.capture(&sensor.clone().with_rotate(true)).unwrap();
        assert_eq!(rotated.image().to_rgb8().get_pixel(0, 0), &Rgb([0, 255, 200]));

        // Two pixels at interior bins integrate to 2.
        let fields = camera.read(&sensor).unwrap();
        assert_eq!(fields[HISTOGRAM_FIELD], 2.0);

        let failing = fake_camera(dir.path(), "echo 'no cameras available' >&2\nexit 1");
        let camera = CameraDriver::new(failing, Duration::from_millis(10));
        let err = camera.capture(&sensor).unwrap_err();
        assert!(err.to_string().contains("no cameras available"));

        let missing = CameraDriver::new("/nonexistent/rpicam-still", Duration::from_millis(10));
        assert!(matches!(
            missing.read(&sensor),
            Err(DriverError::Camera(_))
        ));
    }
}
