//! Sykli CI pipeline for chaos-status
//!
//! Run locally: sykli run
//! Or: cargo run --bin sykli --features sykli -- --emit | sykli run -

use sykli::{Pipeline, Template};

fn main() {
    let mut p = Pipeline::new();

    // === RESOURCES ===
    let src = p.dir(".");
    let cargo_registry = p.cache("cargo-registry");
    let cargo_git = p.cache("cargo-git");
    let target_cache = p.cache("target");

    // === TEMPLATE ===
    let rust = Template::new()
        .container("rust:1.85")
        .mount_dir(&src, "/src")
        .mount_cache(&cargo_registry, "/usr/local/cargo/registry")
        .mount_cache(&cargo_git, "/usr/local/cargo/git")
        .mount_cache(&target_cache, "/src/target")
        .workdir("/src");

    // === TASKS ===
    let _ = p
        .task("test")
        .from(&rust)
        .run("cargo test --all-features")
        .inputs(&["**/*.rs", "Cargo.toml", "Cargo.lock"]);

    let _ = p
        .task("lint")
        .from(&rust)
        .run("cargo clippy --all-targets --all-features -- -D warnings")
        .inputs(&["**/*.rs", "Cargo.toml", "Cargo.lock"]);

    let _ = p
        .task("fmt")
        .from(&rust)
        .run("cargo fmt -- --check")
        .inputs(&["**/*.rs"]);

    let _ = p
        .task("build")
        .from(&rust)
        .run("cargo build --release --bin chaos-status --bin chaos-watcher")
        .inputs(&["**/*.rs", "Cargo.toml", "Cargo.lock"])
        .output("binary", "target/release/chaos-status")
        .after(&["test", "lint", "fmt"]);

    // Smoke test against the release binary
    let _ = p
        .task("smoke-test")
        .from(&rust)
        .run(
            r#"#!/bin/bash
set -e

APP_POOL=green RELEASE_ID=green-ci PORT=3900 ./target/release/chaos-status &
PID=$!
trap 'kill $PID || true' EXIT
sleep 1

curl -fsS -D - http://127.0.0.1:3900/version | grep -i '^x-app-pool: green'
curl -fsS http://127.0.0.1:3900/healthz | grep '"healthy"'

curl -fsS -X POST http://127.0.0.1:3900/chaos/start | grep '"chaos":"error"'
CODE=$(curl -s -o /dev/null -w '%{http_code}' http://127.0.0.1:3900/version)
if [ "$CODE" != "500" ]; then
  echo "ERROR: /version should return 500 in error mode, got $CODE"
  exit 1
fi

curl -fsS -X POST 'http://127.0.0.1:3900/chaos/start?mode=timeout' > /dev/null
if curl -s -m 2 http://127.0.0.1:3900/version; then
  echo "ERROR: /version should hang in timeout mode"
  exit 1
fi

curl -fsS -X POST http://127.0.0.1:3900/chaos/stop | grep '"chaos":null'
curl -fsS http://127.0.0.1:3900/healthz | grep '"healthy"'

echo "Smoke test passed"
"#,
        )
        .input_from("build", "binary", "/src/target/release/chaos-status")
        .timeout(120);

    p.emit();
}
