//! Compile database discovery and generation (spec.md §4.H).
//!
//! clangd needs a `compile_commands.json` to know include paths and defines
//! per translation unit. Grounded on the daemon bootstrap ordering in
//! `other_examples`'s symora `DaemonServer::run` (validate/prepare
//! environment before starting the thing that depends on it) generalized
//! from "create socket dir" to "ensure a compile database exists before
//! starting clangd".

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Ensure `compile_commands.json` exists under `build_dir`, running CMake's
/// configure step with `-DCMAKE_EXPORT_COMPILE_COMMANDS=ON` if it does not.
/// Returns the directory containing the generated file (always `build_dir`
/// itself, since that's where we point CMake's `-B`).
pub async fn ensure_compile_commands(project_root: &Path, build_dir: &Path) -> Result<PathBuf> {
    let compile_commands_path = build_dir.join("compile_commands.json");
    if compile_commands_path.is_file() {
        return Ok(build_dir.to_path_buf());
    }

    if !project_root.join("CMakeLists.txt").is_file() {
        bail!(
            "{} has no CMakeLists.txt; cannot generate a compile database",
            project_root.display()
        );
    }

    tokio::fs::create_dir_all(build_dir)
        .await
        .with_context(|| format!("creating build directory {}", build_dir.display()))?;

    log::info!("compile_commands.json not found, running cmake configure in {}", build_dir.display());

    let status = Command::new("cmake")
        .arg("-S")
        .arg(project_root)
        .arg("-B")
        .arg(build_dir)
        .arg("-DCMAKE_EXPORT_COMPILE_COMMANDS=ON")
        .arg("-DCMAKE_BUILD_TYPE=Debug")
        .status()
        .await
        .context("spawning cmake; is it installed and on PATH?")?;

    if !status.success() {
        bail!("cmake configure exited with {status}");
    }
    if !compile_commands_path.is_file() {
        bail!(
            "cmake configure succeeded but {} was not produced",
            compile_commands_path.display()
        );
    }

    Ok(build_dir.to_path_buf())
}

/// Pick the file clangd should open to force it to start indexing
/// (spec.md §4.B step 8): the first `.cc`/`.cpp`/`.cxx`/`.c++` entry,
/// falling back to the first entry of any kind if the database has none.
pub async fn first_source_file(compile_commands_path: &Path) -> Result<Option<PathBuf>> {
    let contents = tokio::fs::read_to_string(compile_commands_path)
        .await
        .with_context(|| format!("reading {}", compile_commands_path.display()))?;
    let entries: Vec<serde_json::Value> = serde_json::from_str(&contents)
        .context("parsing compile_commands.json")?;

    let mut first_of_any_kind = None;
    for entry in &entries {
        if let Some(file) = entry.get("file").and_then(|f| f.as_str()) {
            let path = PathBuf::from(file);
            if is_cpp_source(&path) {
                return Ok(Some(path));
            }
            if first_of_any_kind.is_none() {
                first_of_any_kind = Some(path);
            }
        }
    }
    Ok(first_of_any_kind)
}

fn is_cpp_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cc") | Some("cpp") | Some("cxx") | Some("c++")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_existing_path_without_running_cmake() {
        let dir = tempfile::tempdir().unwrap();
        let build_dir = dir.path().join("build");
        std::fs::create_dir_all(&build_dir).unwrap();
        std::fs::write(build_dir.join("compile_commands.json"), "[]").unwrap();

        let result = ensure_compile_commands(dir.path(), &build_dir).await.unwrap();
        assert_eq!(result, build_dir);
    }

    #[tokio::test]
    async fn first_source_file_skips_non_cpp_entries() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("compile_commands.json");
        std::fs::write(
            &db_path,
            r#"[{"file": "/proj/README.md"}, {"file": "/proj/src/main.cc"}]"#,
        )
        .unwrap();

        let found = first_source_file(&db_path).await.unwrap();
        assert_eq!(found, Some(PathBuf::from("/proj/src/main.cc")));
    }
}
