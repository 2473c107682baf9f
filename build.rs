// Build script to compile GLSL shaders to SPIR-V
//
// Output goes to OUT_DIR. When glslc is missing, the precompiled SPIR-V
// checked in next to the sources is copied instead.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADERS: &[&str] = &["triangle.vert", "triangle.frag"];

fn main() {
    println!("cargo:rerun-if-changed=shaders/");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    for shader in SHADERS {
        let input = Path::new("shaders").join(shader);
        let output = out_dir.join(format!("{shader}.spv"));
        compile_shader(&input, &output);
    }
}

fn compile_shader(input: &Path, output: &Path) {
    // Check if glslc is available
    let result = Command::new("glslc")
        .arg(input)
        .arg("-o")
        .arg(output)
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            panic!("Failed to compile {}: exit code {:?}", input.display(), status.code());
        }
        Err(e) => {
            println!("cargo:warning=glslc not found ({e}), using precompiled {}.spv", input.display());
            let precompiled = input.with_file_name(format!(
                "{}.spv",
                input.file_name().and_then(|n| n.to_str()).unwrap_or_default()
            ));
            fs::copy(&precompiled, output)
                .unwrap_or_else(|e| panic!("Missing precompiled shader {}: {e}", precompiled.display()));
        }
    }
}
