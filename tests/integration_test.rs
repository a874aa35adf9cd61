//! End-to-end test driving a real `clangd` through the full command engine,
//! following the teacher's `integration_test.rs` pattern of exercising the
//! actual subprocess rather than mocking LSP traffic. Skips itself if
//! `clangd` is not on `PATH`, since CI environments may not have it.

use clangd_query::commands::{Engine, run_search, run_show};
use clangd_query::lsp_client::ClangdClient;
use std::sync::Arc;

fn clangd_available() -> bool {
    std::env::var_os("PATH")
        .map(|path_var| std::env::split_paths(&path_var).any(|dir| dir.join("clangd").is_file()))
        .unwrap_or(false)
}

async fn start_engine(project_root: &std::path::Path, build_dir: &std::path::Path) -> Engine {
    let clangd = ClangdClient::start(project_root, build_dir).await.expect("clangd should start");
    let first_file = project_root.join("main.cpp");
    clangd.prime_indexing(&first_file).await.expect("indexing should prime");
    Engine::new(Arc::new(clangd), project_root.to_path_buf())
}

#[tokio::test]
async fn search_and_show_round_trip_through_a_real_clangd() {
    if !clangd_available() {
        eprintln!("skipping: clangd not found on PATH");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let build_dir = root.join("build");
    std::fs::create_dir_all(&build_dir).unwrap();

    let main_cpp = root.join("main.cpp");
    std::fs::write(
        &main_cpp,
        r#"
class Widget {
public:
    int GetValue() const { return value_; }
private:
    int value_ = 0;
};

int main() {
    Widget w;
    return w.GetValue();
}
"#,
    )
    .unwrap();

    let compile_commands = serde_json::json!([
        {
            "directory": root.to_string_lossy(),
            "file": main_cpp.to_string_lossy(),
            "command": format!("c++ -std=c++17 -c {}", main_cpp.display()),
        }
    ]);
    std::fs::write(
        build_dir.join("compile_commands.json"),
        serde_json::to_string(&compile_commands).unwrap(),
    )
    .unwrap();

    let engine = start_engine(root, &build_dir).await;

    let search_output = run_search(&engine, "Widget", None).await.unwrap();
    assert!(search_output.contains("Widget"), "search output was: {search_output}");

    let show_output = run_show(&engine, "GetValue").await.unwrap();
    assert!(show_output.contains("GetValue"), "show output was: {show_output}");

    engine.clangd.shutdown().await;
}
