//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::PathBuf;
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Write a `menuhin.toml` with two static menus into `temp_dir`.
///
/// `main` has a three-level branch under `/about/`; `legal` is a single page. The stale
/// policy is `stale_policy`.
#[allow(dead_code)]
pub fn create_test_config(temp_dir: &TempDir, stale_policy: &str) -> PathBuf {
    let path = temp_dir.path().join("menuhin.toml");
    let config = format!(
        r#"
menu_handlers = []
site_id = 1
stale_policy = "{stale_policy}"

[[static_menus]]
name = "main"
verbose_name = "Main page"

[[static_menus.items]]
path = "/about/"
title = "About"

[[static_menus.items]]
path = "/about/team/"
title = "Team"
parent = "/about/"

[[static_menus.items]]
path = "/about/team/jobs/"
title = "<em>Jobs</em>"
parent = "/about/team/"

[[static_menus]]
name = "legal"

[[static_menus.items]]
path = "/privacy/"
title = "Privacy"
"#
    );
    std::fs::write(&path, config).unwrap();
    path
}
