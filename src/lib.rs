// =============================================================================
// RUST_VULKAN - Vulkan triangle renderer behind a C ABI
// =============================================================================
//
// A native host (the OpenHarmony N-API shim, or any C caller) creates an
// application for a window it owns, draws frames into it and destroys it:
//
//   log_init -> get_vulkan_application -> draw_frame* -> destroy_vulkan_application
//
// LAYOUT:
//   ffi          C exports and the handle registry they share
//   application  one rendering context (device, swapchain, pipeline, sync)
//   backend      thin ash wrappers, one file per kind of Vulkan object
//   config       config.toml settings
//   logging      env_logger setup driven by the host's category mask
//
// =============================================================================

pub mod application;
pub mod backend;
pub mod config;
pub mod error;
pub mod ffi;
pub mod logging;
pub mod registry;

pub use application::{Application, FrameOutcome};
pub use error::{BridgeError, Status_code};
