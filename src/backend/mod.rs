// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash. Each file owns one kind of Vulkan object and
// knows how to create and destroy it; `Application` decides the order.

pub mod buffer;
pub mod command;
pub mod device;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use surface::NativeWindow;
pub use swapchain::Swapchain;
