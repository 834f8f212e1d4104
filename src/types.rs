use std::{fmt, sync::Mutex};

pub use trailpe::{Footer, FOOTER_MAGIC, FOOTER_SIZE, FOOTER_VERSION, OFFSET_PLACEHOLDER};

/// Name of the runtime binary inside the runtime cache.
pub const RUNTIME_NAME: &str = "yode";

/// Description of the app being packaged, derived once from its manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppInfo {
    pub name:             String,
    pub version:          String,
    pub description:      String,
    pub product_name:     String,
    pub app_id:           String,
    pub copyright:        String,
    /// Files matching this glob are kept next to the executable.
    pub unpack:           Option<String>,
    /// Directories matching this glob are kept next to the executable.
    pub unpack_dir:       Option<String>,
    pub minify:           bool,
    pub ignore:           Vec<String>,
    /// Raw plist fragment appended to the bundle's Info.plist.
    pub extra_info_plist: Option<String>,
    pub runtime_version:  Option<String>,
}

/// A recoverable problem with a single file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub path:     String,
    pub message:  String,
    /// 1-based line and column, if the problem has a position.
    pub position: Option<(usize, usize)>,
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some((line, column)) => write!(
                f,
                "{}: {} at line {} col {}",
                self.path, self.message, line, column
            ),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// Receives progress and warnings from a packaging run.
pub trait Reporter: Sync {
    fn step(&self, message: &str);
    fn progress(&self, path: &str);
    fn warning(&self, message: &str);
}

/// Reporter that drops everything.
pub struct Silent;
impl Reporter for Silent {
    fn step(&self, _: &str) {}

    fn progress(&self, _: &str) {}

    fn warning(&self, _: &str) {}
}

/// Reporter that keeps every message, for callers that inspect a run afterwards.
#[derive(Default)]
pub struct Recorder {
    pub steps:    Mutex<Vec<String>>,
    pub warnings: Mutex<Vec<String>>,
}
impl Recorder {
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn steps(&self) -> Vec<String> { self.steps.lock().map(|s| s.clone()).unwrap_or_default() }
}
impl Reporter for Recorder {
    fn step(&self, message: &str) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(message.to_string());
        }
    }

    fn progress(&self, _: &str) {}

    fn warning(&self, message: &str) {
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(message.to_string());
        }
    }
}
