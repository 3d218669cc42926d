use device_query::{DeviceQuery, DeviceState, Keycode};
use image::DynamicImage;
use xcap::Monitor;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("screen capture failed: {0}")]
    Backend(#[from] xcap::XCapError),
    #[error("capture region {0:?} lies outside the monitor")]
    OutsideMonitor(CaptureRegion),
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Screen rectangle in global desktop coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Square of side `size` centered on `(x, y)`, clamped so `left, top >= 0`
    pub fn centered_on(x: i32, y: i32, size: u32) -> Self {
        let half = (size / 2) as i32;
        Self {
            left: x.saturating_sub(half).max(0),
            top: y.saturating_sub(half).max(0),
            width: size,
            height: size,
        }
    }

    /// Part of the region inside a monitor at `origin` with `size` pixels,
    /// as monitor-relative `(x, y, width, height)`
    pub fn within_monitor(&self, origin: (i32, i32), size: (u32, u32)) -> Option<(u32, u32, u32, u32)> {
        let x = u32::try_from(self.left.saturating_sub(origin.0)).unwrap_or(0);
        let y = u32::try_from(self.top.saturating_sub(origin.1)).unwrap_or(0);
        let width = self.width.min(size.0.saturating_sub(x));
        let height = self.height.min(size.1.saturating_sub(y));
        (width > 0 && height > 0).then_some((x, y, width, height))
    }
}

pub trait ScreenCapture {
    fn capture(&self, region: CaptureRegion) -> CaptureResult<DynamicImage>;
}

/// Pointer position and the pause key
pub trait PointerSource {
    fn position(&self) -> (i32, i32);
    /// Whether the pause key is held right now
    fn pause_pressed(&self) -> bool;
}

/// Captures from whichever monitor contains the region's top-left corner
#[derive(Debug, Default)]
pub struct XcapScreen;

impl ScreenCapture for XcapScreen {
    fn capture(&self, region: CaptureRegion) -> CaptureResult<DynamicImage> {
        let monitor = Monitor::from_point(region.left, region.top)?;
        let origin = (monitor.x()?, monitor.y()?);
        let size = (monitor.width()?, monitor.height()?);
        let (x, y, width, height) = region
            .within_monitor(origin, size)
            .ok_or(CaptureError::OutsideMonitor(region))?;

        let shot = monitor.capture_region(x, y, width, height)?;
        Ok(DynamicImage::ImageRgba8(shot))
    }
}

/// Global pointer and keyboard state.
///
/// Key state is read system-wide, so the pause key must be one the game
/// leaves unbound.
pub struct DeviceQueryPointer {
    state: DeviceState,
    pause_key: Keycode,
}

impl DeviceQueryPointer {
    pub fn new(pause_key: Keycode) -> Self {
        Self {
            state: DeviceState::new(),
            pause_key,
        }
    }

    pub fn pause_key(&self) -> Keycode {
        self.pause_key
    }
}

impl PointerSource for DeviceQueryPointer {
    fn position(&self) -> (i32, i32) {
        self.state.get_mouse().coords
    }

    fn pause_pressed(&self) -> bool {
        self.state.get_keys().contains(&self.pause_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_centered_on_pointer() {
        let region = CaptureRegion::centered_on(500, 300, 50);
        assert_eq!(region, CaptureRegion { left: 475, top: 275, width: 50, height: 50 });
    }

    #[test]
    fn test_region_clamped_at_screen_origin() {
        let region = CaptureRegion::centered_on(10, 40, 50);
        assert_eq!((region.left, region.top), (0, 15));
        assert_eq!((region.width, region.height), (50, 50));

        let region = CaptureRegion::centered_on(-200, -3, 50);
        assert_eq!((region.left, region.top), (0, 0));
    }

    #[test]
    fn test_region_inside_monitor() {
        let region = CaptureRegion::centered_on(500, 300, 50);
        assert_eq!(region.within_monitor((0, 0), (1920, 1080)), Some((475, 275, 50, 50)));
        // Second monitor to the right of the first
        let region = CaptureRegion::centered_on(2000, 300, 50);
        assert_eq!(region.within_monitor((1920, 0), (1280, 1024)), Some((55, 275, 50, 50)));
    }

    #[test]
    fn test_region_cut_at_monitor_edge() {
        let region = CaptureRegion::centered_on(1910, 1075, 50);
        assert_eq!(region.within_monitor((0, 0), (1920, 1080)), Some((1885, 1050, 35, 30)));
        // Monitor starts right of the region's left edge
        let region = CaptureRegion { left: 1900, top: 10, width: 50, height: 50 };
        assert_eq!(region.within_monitor((1920, 0), (1280, 1024)), Some((0, 10, 50, 50)));
    }

    #[test]
    fn test_region_outside_monitor() {
        let region = CaptureRegion { left: 2000, top: 10, width: 50, height: 50 };
        assert_eq!(region.within_monitor((0, 0), (1920, 1080)), None);
        let region = CaptureRegion { left: 10, top: 10, width: 0, height: 50 };
        assert_eq!(region.within_monitor((0, 0), (1920, 1080)), None);
    }

    #[test]
    fn test_odd_region_size() {
        let region = CaptureRegion::centered_on(100, 100, 51);
        assert_eq!((region.left, region.top), (75, 75));
        assert_eq!(region.width, 51);
    }
}
