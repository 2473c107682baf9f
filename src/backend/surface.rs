// Surface - connection between the instance and the host's window
//
// The host hands us a window it owns. On OpenHarmony that is an
// OHNativeWindow*, which ash does not know about, so the VK_OHOS_surface
// entry point is loaded by hand. Every other platform goes through
// ash-window and raw-window-handle.

use anyhow::{Context, Result};
use ash::{vk, Entry};
use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle,
};
use std::ffi::{c_char, c_void, CStr};
use std::ptr::{self, NonNull};

use crate::error::BridgeError;

pub const OHOS_SURFACE_EXTENSION: &CStr = c"VK_OHOS_surface";
const OHOS_CREATE_SURFACE: &CStr = c"vkCreateSurfaceOHOS";
const STRUCTURE_TYPE_SURFACE_CREATE_INFO_OHOS: i32 = 1_000_685_000;

#[repr(C)]
struct SurfaceCreateInfoOhos {
    s_type: vk::StructureType,
    p_next: *const c_void,
    flags: vk::Flags,
    window: *mut c_void,
}

type PfnCreateSurfaceOhos = unsafe extern "system" fn(
    instance: vk::Instance,
    create_info: *const SurfaceCreateInfoOhos,
    allocator: *const vk::AllocationCallbacks,
    surface: *mut vk::SurfaceKHR,
) -> vk::Result;

/// A window owned by the host. We never create or destroy it.
pub enum NativeWindow {
    /// `OHNativeWindow*`
    Ohos(NonNull<c_void>),
    Raw {
        display: RawDisplayHandle,
        window: RawWindowHandle,
    },
}

impl NativeWindow {
    /// Interpret the `void*` received over the C boundary.
    ///
    /// OpenHarmony passes an `OHNativeWindow*`, Android an `ANativeWindow*`.
    /// Desktop platforms need more than one pointer to describe a window and
    /// must use [`NativeWindow::from_window`] instead.
    pub fn from_raw_pointer(window: *mut c_void) -> Result<Self, BridgeError> {
        let window = NonNull::new(window).ok_or(BridgeError::NullPointer("window_handle"))?;

        #[cfg(target_env = "ohos")]
        {
            Ok(NativeWindow::Ohos(window))
        }

        #[cfg(all(target_os = "android", not(target_env = "ohos")))]
        {
            use raw_window_handle::{AndroidDisplayHandle, AndroidNdkWindowHandle};

            let mut handle = AndroidNdkWindowHandle::empty();
            handle.a_native_window = window.as_ptr();
            Ok(NativeWindow::Raw {
                display: RawDisplayHandle::Android(AndroidDisplayHandle::empty()),
                window: RawWindowHandle::AndroidNdk(handle),
            })
        }

        #[cfg(not(any(target_env = "ohos", target_os = "android")))]
        {
            let _ = window;
            Err(BridgeError::UnsupportedWindow)
        }
    }

    /// Describe any window that exposes raw-window-handle 0.5 handles
    pub fn from_window<W: HasRawWindowHandle + HasRawDisplayHandle>(window: &W) -> Self {
        NativeWindow::Raw {
            display: window.raw_display_handle(),
            window: window.raw_window_handle(),
        }
    }

    /// Instance extensions needed to create a surface for this window
    pub fn required_extensions(&self) -> Result<Vec<*const c_char>> {
        match self {
            NativeWindow::Ohos(_) => Ok(vec![
                ash::extensions::khr::Surface::name().as_ptr(),
                OHOS_SURFACE_EXTENSION.as_ptr(),
            ]),
            NativeWindow::Raw { display, .. } => {
                let extensions = ash_window::enumerate_required_extensions(*display)
                    .context("Unsupported window system")?;
                Ok(extensions.to_vec())
            }
        }
    }
}

/// Surface handle plus the loader needed to query and destroy it
pub struct Surface {
    pub loader: ash::extensions::khr::Surface,
    pub handle: vk::SurfaceKHR,
}

impl Surface {
    pub fn new(entry: &Entry, instance: &ash::Instance, window: &NativeWindow) -> Result<Self> {
        let handle = unsafe {
            match window {
                NativeWindow::Ohos(native) => create_ohos_surface(entry, instance, *native)?,
                NativeWindow::Raw { display, window } => {
                    ash_window::create_surface(entry, instance, *display, *window, None)
                        .context("Failed to create window surface")?
                }
            }
        };

        log::info!("Created window surface");

        Ok(Self {
            loader: ash::extensions::khr::Surface::new(entry, instance),
            handle,
        })
    }

    pub fn destroy(&self) {
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
    }
}

unsafe fn create_ohos_surface(
    entry: &Entry,
    instance: &ash::Instance,
    window: NonNull<c_void>,
) -> Result<vk::SurfaceKHR> {
    let create_fn = entry
        .get_instance_proc_addr(instance.handle(), OHOS_CREATE_SURFACE.as_ptr())
        .context("Loader does not provide vkCreateSurfaceOHOS")?;
    let create_fn: PfnCreateSurfaceOhos = std::mem::transmute(create_fn);

    let create_info = SurfaceCreateInfoOhos {
        s_type: vk::StructureType::from_raw(STRUCTURE_TYPE_SURFACE_CREATE_INFO_OHOS),
        p_next: ptr::null(),
        flags: vk::Flags::default(),
        window: window.as_ptr(),
    };

    let mut surface = vk::SurfaceKHR::null();
    create_fn(instance.handle(), &create_info, ptr::null(), &mut surface)
        .result()
        .context("vkCreateSurfaceOHOS failed")?;

    Ok(surface)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_window_is_rejected() {
        assert_eq!(
            NativeWindow::from_raw_pointer(ptr::null_mut()).err(),
            Some(BridgeError::NullPointer("window_handle"))
        );
    }

    #[cfg(not(any(target_env = "ohos", target_os = "android")))]
    #[test]
    fn bare_pointer_is_unsupported_on_desktop() {
        let mut fake = 0u8;
        let result = NativeWindow::from_raw_pointer(&mut fake as *mut u8 as *mut c_void);
        assert_eq!(result.err(), Some(BridgeError::UnsupportedWindow));
    }

    #[test]
    fn ohos_window_requests_ohos_extension() {
        let mut fake = 0u8;
        let window = NativeWindow::Ohos(NonNull::from(&mut fake).cast());
        let extensions = window.required_extensions().unwrap();
        let names: Vec<&CStr> = extensions
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect();

        assert_eq!(names, vec![c"VK_KHR_surface", OHOS_SURFACE_EXTENSION]);
    }
}
