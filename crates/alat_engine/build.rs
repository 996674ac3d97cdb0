// build.rs
// Compiles the GLSL shaders under resources/shaders to SPIR-V in target/shaders.
// A missing compiler only warns: the headless backend needs no shaders.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADER_EXTENSIONS: [&str; 2] = ["vert", "frag"];

/// Locate glslc in the Vulkan SDK, falling back to PATH
fn find_glslc() -> Option<PathBuf> {
    let exe = if cfg!(target_os = "windows") { "glslc.exe" } else { "glslc" };

    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let bin = if cfg!(target_os = "windows") { "Bin" } else { "bin" };
        let candidate = Path::new(&sdk).join(bin).join(exe);
        if candidate.exists() {
            return Some(candidate);
        }
        println!("cargo:warning=glslc not found in VULKAN_SDK ({sdk}), trying PATH");
    }

    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths)
            .map(|dir| dir.join(exe))
            .find(|candidate| candidate.exists())
    })
}

/// Recompile only when the source is newer than its output
fn needs_compile(source: &Path, output: &Path) -> bool {
    match (
        std::fs::metadata(source).and_then(|m| m.modified()),
        std::fs::metadata(output).and_then(|m| m.modified()),
    ) {
        (Ok(src), Ok(dst)) => src > dst,
        _ => true,
    }
}

fn main() {
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()));
    let workspace_root = manifest_dir.join("../..");
    let shader_dir = workspace_root.join("resources/shaders");
    let target_dir = workspace_root.join("target/shaders");

    println!("cargo:rerun-if-changed={}", shader_dir.display());

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Some(glslc) = find_glslc() else {
        println!("cargo:warning=glslc not found; QR windows need the precompiled shaders in target/shaders");
        return;
    };

    let entries = match std::fs::read_dir(&shader_dir) {
        Ok(entries) => entries,
        Err(e) => {
            println!("cargo:warning=No shader directory at {}: {e}", shader_dir.display());
            return;
        }
    };

    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {e}", target_dir.display());
        return;
    }

    let mut compiled = 0;
    for path in entries.filter_map(Result::ok).map(|entry| entry.path()) {
        let is_shader = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SHADER_EXTENSIONS.contains(&ext));
        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if !is_shader {
            continue;
        }

        // textured_quad.vert -> textured_quad.vert.spv
        let output = target_dir.join(format!("{file_name}.spv"));
        if !needs_compile(&path, &output) {
            continue;
        }

        match Command::new(&glslc).arg(&path).arg("-o").arg(&output).status() {
            Ok(status) if status.success() => compiled += 1,
            Ok(status) => println!(
                "cargo:warning=glslc failed for {file_name} with exit code {}",
                status.code().unwrap_or(-1)
            ),
            Err(e) => println!("cargo:warning=Failed to run glslc for {file_name}: {e}"),
        }
    }

    eprintln!("info: Compiled {compiled} shader(s) into {}", target_dir.display());
}
