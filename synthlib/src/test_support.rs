use crate::config::ToolchainConfig;
use std::path::Path;
use tokio::sync::oneshot;

/// A toolchain that runs `script` under `sh` instead of `make`.
///
/// `sh -c SCRIPT make BUILD_DIR=.. TOP_MODULE=..` puts the make variables in `"$@"`; the
/// prelude unpacks them into `$dir` and `$top`.
pub fn stub_toolchain(project_dir: &Path, script: &str) -> ToolchainConfig {
    let prelude = r#"for arg in "$@"; do
  case "$arg" in
    BUILD_DIR=*) dir="${arg#BUILD_DIR=}" ;;
    TOP_MODULE=*) top="${arg#TOP_MODULE=}" ;;
  esac
done
"#;
    ToolchainConfig {
        program: "sh".into(),
        args: vec!["-c".into(), format!("{}{}", prelude, script), "make".into()],
        project_dir: project_dir.to_path_buf(),
        ..ToolchainConfig::default()
    }
}

/// A cancellation receiver that never fires.
pub fn never() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::mem::forget(tx);
    rx
}
