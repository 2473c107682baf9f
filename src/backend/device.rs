// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Loader (system or host-provided path) and instance creation
// - Validation layers + debug messenger (debug builds, when available)
// - Window surface
// - Physical device selection (swapchain-capable, prefer discrete GPU)
// - Logical device + graphics/present queues
// - Memory allocator setup

use anyhow::{Context, Result};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;
use std::path::Path;
use std::sync::Arc;

use super::surface::{NativeWindow, Surface};
use super::swapchain::SwapchainSupport;
use crate::config::Config;
use crate::logging::VULKAN_TARGET;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Device extensions every candidate GPU must offer
fn required_device_extensions() -> [&'static CStr; 1] {
    [ash::extensions::khr::Swapchain::name()]
}

/// Queue family indices found while probing a physical device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Walk families in order and stop once both roles have a family
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut indices = Self::default();

        for (index, family) in (0u32..).zip(families) {
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(index);
            }
            if supports_present(index) {
                indices.present = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }

        indices
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }
}

/// Retrieved device queues
#[derive(Debug, Clone, Copy)]
pub struct Queues {
    pub graphics_family: u32,
    pub present_family: u32,
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

impl Queues {
    /// Distinct family indices, sorted
    pub fn families(&self) -> Vec<u32> {
        unique_families(self.graphics_family, self.present_family)
    }
}

fn unique_families(graphics: u32, present: u32) -> Vec<u32> {
    BTreeSet::from([graphics, present]).into_iter().collect()
}

/// Prefer dedicated hardware
pub fn device_type_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
        vk::PhysicalDeviceType::CPU => 3,
        _ => 1,
    }
}

fn raw_name(raw: &[c_char]) -> &CStr {
    unsafe { CStr::from_ptr(raw.as_ptr()) }
}

pub fn supports_extensions(available: &[vk::ExtensionProperties], required: &[&CStr]) -> bool {
    required.iter().all(|&name| {
        available
            .iter()
            .any(|ext| raw_name(&ext.extension_name) == name)
    })
}

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    // Dropped by hand before the device it allocates from
    allocator: ManuallyDrop<Mutex<Allocator>>,
    pub device: ash::Device,
    pub queues: Queues,
    pub physical_device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub surface: Surface,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    pub instance: ash::Instance,
    _entry: Entry,
}

impl VulkanDevice {
    /// Create everything up to and including the logical device.
    ///
    /// `vulkan_path` points at a specific loader library; `None` uses the
    /// system loader.
    pub fn new(
        config: &Config,
        vulkan_path: Option<&Path>,
        window: &NativeWindow,
    ) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", config.application.name);

        // Step 1: Load Vulkan library
        let entry = unsafe {
            match vulkan_path {
                Some(path) => Entry::load_from(path)
                    .with_context(|| format!("Failed to load Vulkan library from {:?}", path))?,
                None => Entry::load().context("Failed to load Vulkan library. Is Vulkan installed?")?,
            }
        };

        // Step 2: Create instance
        let enable_validation = config.validation_enabled() && Self::validation_available(&entry);
        let instance = Self::create_instance(&entry, config, window, enable_validation)?;

        // Steps 3+ own resources hanging off the instance; undo on failure
        match Self::create_on_instance(&entry, &instance, enable_validation, window) {
            Ok(parts) => Ok(Arc::new(Self {
                allocator: ManuallyDrop::new(Mutex::new(parts.allocator)),
                device: parts.device,
                queues: parts.queues,
                physical_device: parts.physical_device,
                properties: parts.properties,
                surface: parts.surface,
                debug_utils: parts.debug_utils,
                instance,
                _entry: entry,
            })),
            Err(e) => {
                unsafe { instance.destroy_instance(None) };
                Err(e)
            }
        }
    }

    fn create_on_instance(
        entry: &Entry,
        instance: &ash::Instance,
        enable_validation: bool,
        window: &NativeWindow,
    ) -> Result<DeviceParts> {
        // Step 3: Setup debug messenger if validation enabled
        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(entry, instance)?)
        } else {
            None
        };
        let destroy_messenger = |debug_utils: &Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>| {
            if let Some((loader, messenger)) = debug_utils {
                unsafe { loader.destroy_debug_utils_messenger(*messenger, None) };
            }
        };

        // Step 4: Create surface
        let surface = match Surface::new(entry, instance, window) {
            Ok(surface) => surface,
            Err(e) => {
                destroy_messenger(&debug_utils);
                return Err(e);
            }
        };

        // Steps 5-7: Physical device, logical device, allocator
        match Self::create_logical(instance, &surface) {
            Ok((physical_device, properties, device, queues, allocator)) => Ok(DeviceParts {
                allocator,
                device,
                queues,
                physical_device,
                properties,
                surface,
                debug_utils,
            }),
            Err(e) => {
                surface.destroy();
                destroy_messenger(&debug_utils);
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn create_logical(
        instance: &ash::Instance,
        surface: &Surface,
    ) -> Result<(vk::PhysicalDevice, vk::PhysicalDeviceProperties, ash::Device, Queues, Allocator)> {
        let (physical_device, indices) = Self::pick_physical_device(instance, surface)?;

        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        log::info!(
            "Selected GPU: {}",
            raw_name(&properties.device_name).to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        let (device, queues) = Self::create_logical_device(instance, physical_device, indices)?;

        match Self::create_allocator(instance, physical_device, &device) {
            Ok(allocator) => Ok((physical_device, properties, device, queues, allocator)),
            Err(e) => {
                unsafe { device.destroy_device(None) };
                Err(e)
            }
        }
    }

    fn validation_available(entry: &Entry) -> bool {
        let has_layer = unsafe { entry.enumerate_instance_layer_properties() }
            .map(|layers| {
                layers
                    .iter()
                    .any(|layer| raw_name(&layer.layer_name) == VALIDATION_LAYER)
            })
            .unwrap_or(false);
        let has_debug_utils = unsafe { entry.enumerate_instance_extension_properties(None) }
            .map(|extensions| supports_extensions(&extensions, &[DebugUtils::name()]))
            .unwrap_or(false);

        if !(has_layer && has_debug_utils) {
            log::warn!("Validation requested but not available, continuing without it");
        }
        has_layer && has_debug_utils
    }

    fn create_instance(
        entry: &Entry,
        config: &Config,
        window: &NativeWindow,
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name = CString::new(config.application.name.as_str())?;
        let engine_name = CString::new(config.application.engine_name.as_str())?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        // Surface extensions for this kind of window
        let mut extensions = window.required_extensions()?;

        // Validation layers
        let layer_names = if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        // Lets the messenger see instance creation itself
        let mut debug_info = Self::debug_messenger_create_info();

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);
        if enable_validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        log::info!("Created Vulkan instance");

        Ok(instance)
    }

    fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
        vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
            .build()
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);

        let create_info = Self::debug_messenger_create_info();
        let messenger = unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
        }
        .context("Failed to create debug messenger")?;

        log::info!("Created debug messenger");

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface: &Surface,
    ) -> Result<(vk::PhysicalDevice, QueueFamilyIndices)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;

        if devices.is_empty() {
            anyhow::bail!("No Vulkan-capable GPU found");
        }

        // Score each device
        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let Some((score, indices)) = Self::rate_device(instance, surface, device) else {
                continue;
            };

            if score > best_score {
                best_score = score;
                best_device = Some((device, indices));
            }
        }

        best_device.ok_or_else(|| anyhow::anyhow!("No suitable GPU found"))
    }

    /// `None` when the device cannot drive this surface at all
    fn rate_device(
        instance: &ash::Instance,
        surface: &Surface,
        device: vk::PhysicalDevice,
    ) -> Option<(u32, QueueFamilyIndices)> {
        let props = unsafe { instance.get_physical_device_properties(device) };
        let name = raw_name(&props.device_name).to_string_lossy();

        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }.ok()?;
        if !supports_extensions(&extensions, &required_device_extensions()) {
            log::debug!("Skipping {}: missing swapchain support", name);
            return None;
        }

        let support = SwapchainSupport::query(&surface.loader, device, surface.handle).ok()?;
        if !support.is_adequate() {
            log::debug!("Skipping {}: no usable surface formats or present modes", name);
            return None;
        }

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let indices = QueueFamilyIndices::find(&families, |index| unsafe {
            surface
                .loader
                .get_physical_device_surface_support(device, index, surface.handle)
                .unwrap_or(false)
        });
        if !indices.is_complete() {
            log::debug!("Skipping {}: no graphics or present queue", name);
            return None;
        }

        Some((device_type_score(props.device_type), indices))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        indices: QueueFamilyIndices,
    ) -> Result<(ash::Device, Queues)> {
        let (Some(graphics_family), Some(present_family)) = (indices.graphics, indices.present)
        else {
            anyhow::bail!("Queue families incomplete");
        };

        let queue_priorities = [1.0];
        let queue_create_infos: Vec<_> = unique_families(graphics_family, present_family)
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        // Required device extensions
        let extensions: Vec<_> = required_device_extensions()
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe {
            instance.create_device(physical_device, &create_info, None)
        }
        .context("Failed to create logical device")?;

        let queues = unsafe {
            Queues {
                graphics_family,
                present_family,
                graphics: device.get_device_queue(graphics_family, 0),
                present: device.get_device_queue(present_family, 0),
            }
        };

        Ok((device, queues))
    }

    fn create_allocator(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
    ) -> Result<Allocator> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .context("Failed to create memory allocator")?;

        Ok(allocator)
    }

    pub fn allocator(&self) -> &Mutex<Allocator> {
        &self.allocator
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

struct DeviceParts {
    allocator: Allocator,
    device: ash::Device,
    queues: Queues,
    physical_device: vk::PhysicalDevice,
    properties: vk::PhysicalDeviceProperties,
    surface: Surface,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            self.surface.destroy();

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*p_callback_data).p_message).to_string_lossy();

    let level = match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::Level::Info,
        _ => log::Level::Debug,
    };
    log::log!(target: VULKAN_TARGET, level, "[{:?}] {}", message_type, message);

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn extension(name: &CStr) -> vk::ExtensionProperties {
        let mut ext = vk::ExtensionProperties::default();
        for (dst, &src) in ext.extension_name.iter_mut().zip(name.to_bytes()) {
            *dst = src as c_char;
        }
        ext
    }

    #[test]
    fn discrete_beats_integrated_beats_cpu() {
        let discrete = device_type_score(vk::PhysicalDeviceType::DISCRETE_GPU);
        let integrated = device_type_score(vk::PhysicalDeviceType::INTEGRATED_GPU);
        let virtual_gpu = device_type_score(vk::PhysicalDeviceType::VIRTUAL_GPU);
        let cpu = device_type_score(vk::PhysicalDeviceType::CPU);
        let other = device_type_score(vk::PhysicalDeviceType::OTHER);

        assert!(discrete > integrated);
        assert!(integrated > virtual_gpu);
        assert!(virtual_gpu > cpu);
        assert!(cpu > other);
        assert!(other > 0);
    }

    #[test]
    fn shared_family_stops_search_early() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        let indices = QueueFamilyIndices::find(&families, |i| {
            queried.push(i);
            true
        });

        assert_eq!(indices, QueueFamilyIndices { graphics: Some(0), present: Some(0) });
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn separate_present_family_is_found() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::find(&families, |i| i == 2);

        assert_eq!(indices, QueueFamilyIndices { graphics: Some(0), present: Some(2) });
        assert!(indices.is_complete());
    }

    #[test]
    fn missing_graphics_is_incomplete() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::find(&families, |_| true);

        assert_eq!(indices.graphics, None);
        assert!(!indices.is_complete());
    }

    #[test]
    fn unique_families_collapse() {
        assert_eq!(unique_families(1, 1), vec![1]);
        assert_eq!(unique_families(2, 0), vec![0, 2]);
    }

    #[test]
    fn extension_check_needs_every_name() {
        let available = [extension(c"VK_KHR_swapchain"), extension(c"VK_KHR_maintenance1")];

        assert!(supports_extensions(&available, &required_device_extensions()));
        assert!(!supports_extensions(&available[1..], &required_device_extensions()));
        assert!(supports_extensions(&[], &[]));
    }
}
