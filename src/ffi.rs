// FFI - the C boundary
//
// Every export catches panics, logs its error and returns a Status_code.
// Applications live in a process-wide Registry; the host only ever sees
// their numeric handle.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::any::Any;
use std::ffi::{c_char, c_uint, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::{self, Application, FrameOutcome};
use crate::backend::NativeWindow;
use crate::config::Config;
use crate::error::{BridgeError, Status_code};
use crate::logging::{self, LogCategories};
use crate::registry::{Handle, Registry};

#[allow(non_camel_case_types)]
pub type Vulkan_application_handle = Handle;

static APPLICATIONS: Mutex<Registry<Application>> = parking_lot::const_mutex(Registry::new());

/// Bridge smoke test
#[no_mangle]
pub extern "C" fn add(a: f64, b: f64) -> f64 {
    a + b
}

/// Install the process-wide logger. Call once, before anything else.
///
/// # Safety
/// `log_file` must be null or point to a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn log_init(log_file: *const c_char, log_level: c_uint) {
    let result = catch("log_init", || {
        let categories = LogCategories::from_level(log_level);
        match optional_str(log_file).map(log_path).transpose() {
            Ok(path) => {
                logging::init(path.as_deref(), categories, &[]);
                Ok(())
            }
            // Still install a logger so the rejection itself is visible
            Err(e) => {
                logging::init(None, categories, &[]);
                Err(e.into())
            }
        }
    });
    report("log_init", &result);
}

/// Create a rendering context for `window_handle`.
///
/// Writes the new handle to `vulkan_application` on success and `0` on
/// failure.
///
/// # Safety
/// `window_handle` must be a live native window for the duration of the
/// application. `vulkan_path` must be null or NUL-terminated.
/// `vulkan_application` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn get_vulkan_application(
    window_handle: *mut c_void,
    width: c_uint,
    height: c_uint,
    vulkan_path: *const c_char,
    vulkan_application: *mut Vulkan_application_handle,
) -> Status_code {
    let result = catch("get_vulkan_application", || {
        if vulkan_application.is_null() {
            return Err(BridgeError::NullPointer("vulkan_application").into());
        }
        vulkan_application.write(0);

        let handle = create_application(window_handle, width, height, vulkan_path)?;
        vulkan_application.write(handle);
        log::info!("Created vulkan application {}", handle);
        Ok(())
    });
    report("get_vulkan_application", &result)
}

/// Render one frame. A stale swapchain is rebuilt on the spot.
#[no_mangle]
pub extern "C" fn draw_frame(vulkan_application: Vulkan_application_handle) -> Status_code {
    let result = catch("draw_frame", || {
        let application = lookup(vulkan_application)?;
        let mut application = application.lock();

        if application.draw_frame()? == FrameOutcome::NeedsRefresh {
            log::debug!("Refreshing swapchain of application {}", vulkan_application);
            application.refresh()?;
        }
        Ok(())
    });
    report("draw_frame", &result)
}

/// Record a new window size. Zero width or height pauses drawing.
#[no_mangle]
pub extern "C" fn resize_vulkan_application(
    vulkan_application: Vulkan_application_handle,
    width: c_uint,
    height: c_uint,
) -> Status_code {
    let result = catch("resize_vulkan_application", || {
        lookup(vulkan_application)?.lock().resize(width, height);
        Ok(())
    });
    report("resize_vulkan_application", &result)
}

/// Release a context. Unknown handles are ignored.
#[no_mangle]
pub extern "C" fn destroy_vulkan_application(vulkan_application: Vulkan_application_handle) {
    let result = catch("destroy_vulkan_application", || {
        let removed = APPLICATIONS.lock().remove(vulkan_application);
        match removed {
            // Dropped outside the registry lock; a draw in progress keeps it alive
            Some(application) => {
                drop(application);
                log::info!("Destroyed vulkan application {}", vulkan_application);
                Ok(())
            }
            None => Err(BridgeError::InvalidHandle(vulkan_application).into()),
        }
    });
    report("destroy_vulkan_application", &result);
}

unsafe fn create_application(
    window_handle: *mut c_void,
    width: u32,
    height: u32,
    vulkan_path: *const c_char,
) -> Result<Handle> {
    application::check_extent(width, height)?;

    let vulkan_path = match optional_str(vulkan_path) {
        Some(path) => Some(PathBuf::from(path.to_str().map_err(|_| BridgeError::InvalidPath)?)),
        None => None,
    };
    let window = NativeWindow::from_raw_pointer(window_handle)?;

    let config = Config::load();
    let application = Application::new(&window, width, height, &config, vulkan_path.as_deref())?;

    Ok(APPLICATIONS.lock().insert(application))
}

fn lookup(handle: Handle) -> Result<Arc<Mutex<Application>>> {
    let found = APPLICATIONS.lock().get(handle);
    found.ok_or_else(|| BridgeError::InvalidHandle(handle).into())
}

/// Null and empty strings both mean "not given"
unsafe fn optional_str<'a>(ptr: *const c_char) -> Option<&'a CStr> {
    if ptr.is_null() {
        return None;
    }
    let s = CStr::from_ptr(ptr);
    (!s.to_bytes().is_empty()).then_some(s)
}

/// Log paths keep their exact bytes where the platform allows it
#[cfg(unix)]
fn log_path(path: &CStr) -> Result<PathBuf, BridgeError> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Ok(PathBuf::from(OsStr::from_bytes(path.to_bytes())))
}

#[cfg(not(unix))]
fn log_path(path: &CStr) -> Result<PathBuf, BridgeError> {
    path.to_str().map(PathBuf::from).map_err(|_| BridgeError::InvalidPath)
}

fn catch<T>(operation: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .unwrap_or_else(|payload| Err(anyhow!("panic in {}: {}", operation, panic_message(&*payload))))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

fn report<T>(operation: &str, result: &Result<T>) -> Status_code {
    let status = Status_code::from(result);
    match (result, status) {
        (Err(e), Status_code::Invalid_handle) => log::warn!("{}: {:#}", operation, e),
        (Err(e), _) => log::error!("{} failed: {:#}", operation, e),
        (Ok(_), _) => {}
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_not_given() {
        unsafe {
            assert!(optional_str(std::ptr::null()).is_none());
            assert!(optional_str(c"".as_ptr()).is_none());
            assert_eq!(optional_str(c"libvulkan.so".as_ptr()), Some(c"libvulkan.so"));
        }
    }

    #[test]
    fn panics_become_errors() {
        let result: Result<()> = catch("test", || panic!("boom"));
        let message = format!("{:#}", result.unwrap_err());
        assert_eq!(message, "panic in test: boom");
    }

    #[cfg(unix)]
    #[test]
    fn log_path_keeps_non_utf8_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let raw = [b'l', b'o', b'g', 0xff, 0x00];
        let path = log_path(CStr::from_bytes_with_nul(&raw).unwrap()).unwrap();
        assert_eq!(path.as_os_str().as_bytes(), &raw[..4]);
    }

    #[test]
    fn non_utf8_path_is_rejected() {
        let path = [0xffu8, 0xfe, 0x00];
        let result = unsafe {
            create_application(
                std::ptr::null_mut(),
                800,
                600,
                path.as_ptr() as *const c_char,
            )
        };
        assert_eq!(
            result.unwrap_err().downcast_ref::<BridgeError>(),
            Some(&BridgeError::InvalidPath)
        );
    }
}
