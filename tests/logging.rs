// log_init installs a process-wide logger, so this file holds a single
// test and runs in its own process.

use rust_vulkan::ffi::{draw_frame, log_init};
use rust_vulkan::Status_code;
use std::ffi::CString;
use std::fs;

#[test]
fn second_log_init_leaves_live_log_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rust_vulkan.log");
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    unsafe { log_init(c_path.as_ptr(), 3) };
    // Unknown handle is logged as a warning
    assert_eq!(draw_frame(99), Status_code::Invalid_handle);

    let before = fs::read(&path).unwrap();
    assert!(!before.is_empty());

    unsafe { log_init(c_path.as_ptr(), 3) };
    assert_eq!(draw_frame(99), Status_code::Invalid_handle);

    let after = fs::read(&path).unwrap();
    assert!(after.starts_with(&before));
    assert!(after.len() > before.len());
    assert!(!after.contains(&0));

    let text = String::from_utf8_lossy(&after);
    assert!(text.contains("Logger already initialized"));
}
