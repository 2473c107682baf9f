// Logging - process-wide logger installed by `log_init`
//
// The host passes a category mask rather than a severity: general messages
// come from this crate's own modules (plus any extra targets the caller
// names), validation-layer messages are logged under VULKAN_TARGET.

use bitflags::bitflags;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Log target used for messages forwarded from the debug messenger
pub const VULKAN_TARGET: &str = "vulkan";

// Set by the first `init`; later calls must not touch the live log file
static INSTALLED: AtomicBool = AtomicBool::new(false);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LogCategories: u32 {
        const GENERAL = 1;
        const VULKAN = 2;
    }
}

impl LogCategories {
    /// Unknown bits are ignored.
    pub fn from_level(level: u32) -> Self {
        Self::from_bits_truncate(level)
    }

    /// `(target, level)` filter directives for env_logger. `extra_targets`
    /// are treated as general, e.g. the crate name of a binary driving us.
    pub fn directives(self, extra_targets: &[&'static str]) -> Vec<(&'static str, LevelFilter)> {
        let pick = |category| {
            if self.contains(category) {
                LevelFilter::Trace
            } else {
                LevelFilter::Off
            }
        };

        let general = pick(LogCategories::GENERAL);
        let mut directives = vec![(env!("CARGO_CRATE_NAME"), general)];
        directives.extend(extra_targets.iter().map(|&target| (target, general)));
        directives.push((VULKAN_TARGET, pick(LogCategories::VULKAN)));
        directives
    }
}

/// The requested file, or stderr when none is given or it cannot be created
fn open_target(log_file: Option<&Path>) -> (Target, Option<(PathBuf, io::Error)>) {
    match log_file {
        None => (Target::Stderr, None),
        Some(path) => match File::create(path) {
            Ok(file) => (Target::Pipe(Box::new(file)), None),
            Err(e) => (Target::Stderr, Some((path.to_path_buf(), e))),
        },
    }
}

/// Install the global logger. Only the first call has any effect; later
/// calls leave the existing log file untouched and log a warning.
pub fn init(log_file: Option<&Path>, categories: LogCategories, extra_targets: &[&'static str]) {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        log::warn!("Logger already initialized, ignoring log_init");
        return;
    }

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Off);
    for (target, level) in categories.directives(extra_targets) {
        builder.filter_module(target, level);
    }
    builder.format_timestamp_millis();

    let (target, open_error) = open_target(log_file);
    builder.target(target);

    if let Err(e) = builder.try_init() {
        // Another `log` implementation was installed first; it gets this
        log::warn!("Logger not installed: {}", e);
        return;
    }

    if let Some((path, e)) = open_error {
        log::warn!("Failed to create log file {:?}: {}. Logging to stderr.", path, e);
    }
    log::info!("Logging initialized with categories {:?}", categories);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_bits_map_to_categories() {
        assert_eq!(LogCategories::from_level(0), LogCategories::empty());
        assert_eq!(LogCategories::from_level(1), LogCategories::GENERAL);
        assert_eq!(LogCategories::from_level(2), LogCategories::VULKAN);
        assert_eq!(LogCategories::from_level(3), LogCategories::all());
        assert_eq!(LogCategories::from_level(0xFF), LogCategories::all());
    }

    #[test]
    fn directives_follow_mask() {
        let directives = LogCategories::VULKAN.directives(&[]);
        assert_eq!(
            directives,
            vec![("rust_vulkan", LevelFilter::Off), (VULKAN_TARGET, LevelFilter::Trace)]
        );

        let directives = LogCategories::GENERAL.directives(&[]);
        assert_eq!(directives[0].1, LevelFilter::Trace);
        assert_eq!(directives[1].1, LevelFilter::Off);
    }

    #[test]
    fn extra_targets_follow_general_category() {
        let directives = LogCategories::GENERAL.directives(&["triangle_demo"]);
        assert!(directives.contains(&("triangle_demo", LevelFilter::Trace)));

        let directives = LogCategories::VULKAN.directives(&["triangle_demo"]);
        assert!(directives.contains(&("triangle_demo", LevelFilter::Off)));
    }

    #[test]
    fn unopenable_file_falls_back_to_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("rust_vulkan.log");

        let (target, error) = open_target(Some(&path));
        assert!(matches!(target, Target::Stderr));
        assert_eq!(error.map(|(p, _)| p), Some(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn log_file_is_created_when_possible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rust_vulkan.log");

        let (target, error) = open_target(Some(&path));
        assert!(matches!(target, Target::Pipe(_)));
        assert!(error.is_none());
        assert!(path.exists());

        assert!(matches!(open_target(None), (Target::Stderr, None)));
    }
}
