// C boundary checks that need no GPU: every call here fails before a
// Vulkan loader would be touched.

use rust_vulkan::ffi::{
    add, destroy_vulkan_application, draw_frame, get_vulkan_application, log_init,
    resize_vulkan_application, Vulkan_application_handle,
};
use rust_vulkan::Status_code;
use std::ffi::{c_char, c_void, CString};
use std::ptr;

const SENTINEL: Vulkan_application_handle = 0xdead_beef;

fn create(window: *mut c_void, width: u32, height: u32) -> (Status_code, Vulkan_application_handle) {
    let mut handle = SENTINEL;
    let status = unsafe { get_vulkan_application(window, width, height, ptr::null(), &mut handle) };
    (status, handle)
}

#[test]
fn add_is_plain_addition() {
    assert_eq!(add(2.0, 3.0), 5.0);
    assert_eq!(add(-1.0, 1.0), 0.0);
    assert_eq!(add(0.1, 0.2), 0.1 + 0.2);
}

#[test]
fn null_window_fails_and_zeroes_handle() {
    let (status, handle) = create(ptr::null_mut(), 800, 600);
    assert_eq!(status, Status_code::Failure);
    assert_eq!(handle, 0);
}

#[test]
fn zero_extent_fails_and_zeroes_handle() {
    let mut fake = 0u8;
    let window = &mut fake as *mut u8 as *mut c_void;

    for (width, height) in [(0, 600), (800, 0), (0, 0)] {
        let (status, handle) = create(window, width, height);
        assert_eq!(status, Status_code::Failure, "{}x{}", width, height);
        assert_eq!(handle, 0);
    }
}

#[test]
fn non_utf8_vulkan_path_fails_and_zeroes_handle() {
    let mut fake = 0u8;
    let path = [b'v', 0xff, 0xfe, 0x00];
    let mut handle = SENTINEL;

    let status = unsafe {
        get_vulkan_application(
            &mut fake as *mut u8 as *mut c_void,
            800,
            600,
            path.as_ptr() as *const c_char,
            &mut handle,
        )
    };
    assert_eq!(status, Status_code::Failure);
    assert_eq!(handle, 0);
}

#[test]
fn null_out_pointer_fails() {
    let status = unsafe {
        get_vulkan_application(ptr::null_mut(), 800, 600, ptr::null(), ptr::null_mut())
    };
    assert_eq!(status, Status_code::Failure);
}

#[cfg(not(any(target_env = "ohos", target_os = "android")))]
#[test]
fn bare_window_pointer_is_refused_on_desktop() {
    let mut fake = 0u8;
    let (status, handle) = create(&mut fake as *mut u8 as *mut c_void, 800, 600);
    assert_eq!(status, Status_code::Failure);
    assert_eq!(handle, 0);
}

#[test]
fn unknown_handles_are_reported() {
    for handle in [0, 1 << 40, u64::MAX] {
        assert_eq!(draw_frame(handle), Status_code::Invalid_handle);
        assert_eq!(resize_vulkan_application(handle, 640, 480), Status_code::Invalid_handle);
        // Logged and ignored
        destroy_vulkan_application(handle);
        assert_eq!(draw_frame(handle), Status_code::Invalid_handle);
    }
}

#[test]
fn log_init_creates_requested_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rust_vulkan.log");
    let c_path = CString::new(path.to_str().unwrap()).unwrap();

    unsafe {
        log_init(c_path.as_ptr(), 3);
        // Second call is ignored rather than panicking
        log_init(ptr::null(), 0);
    }

    assert!(path.exists());
}
