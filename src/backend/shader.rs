// Shader module loading
//
// The SPIR-V is produced by build.rs and embedded in the library, so the
// host never has to ship shader files next to it.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;

pub const TRIANGLE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
pub const TRIANGLE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));

/// Decode SPIR-V bytes into words, checking size and magic number
pub fn read_spirv(code: &[u8]) -> Result<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(code)).context("Invalid SPIR-V")
}

/// Load SPIR-V shader from bytes and create a shader module
pub fn create_shader_module(device: &ash::Device, code: &[u8]) -> Result<vk::ShaderModule> {
    let words = read_spirv(code)?;
    let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

    unsafe {
        device.create_shader_module(&create_info, None)
            .context("Failed to create shader module")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn embedded_shaders_are_spirv() {
        for code in [TRIANGLE_VERT, TRIANGLE_FRAG] {
            let words = read_spirv(code).unwrap();
            assert_eq!(words[0], SPIRV_MAGIC);
            assert!(words.len() > 5, "header only");
        }
    }

    #[test]
    fn truncated_code_is_rejected() {
        assert!(read_spirv(&TRIANGLE_VERT[..6]).is_err());
        assert!(read_spirv(&[0u8; 8]).is_err());
    }
}
