//! Runtime pieces of the `itemlens` overlay: configuration, screen and
//! pointer collaborators, display sinks and the detection loop.

pub mod app;
pub mod capture;
pub mod config;
pub mod display;

pub use app::{App, Cycle, FetchOutcome, LoopSettings};
pub use capture::{CaptureError, CaptureRegion, DeviceQueryPointer, PointerSource, ScreenCapture, XcapScreen};
pub use config::{AppConfig, ConfigError, ConfigResult, MetadataConfig};
pub use display::{render_record, DisplaySink, TerminalSink};
