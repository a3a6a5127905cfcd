// ABOUTME: Test support utilities.
// ABOUTME: Provides manifest fixtures, resolver scripts and tracing setup for integration tests.

use std::path::{Path, PathBuf};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("manifest_pin=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A single-deployment operator manifest with two containers.
#[allow(dead_code)]
pub fn operator_csv(spam: &str, eggs: &str) -> String {
    format!(
        r#"apiVersion: operators.coreos.com/v1alpha1
kind: ClusterServiceVersion
metadata:
  name: foo
spec:
  install:
    spec:
      deployments:
      - spec:
          template:
            spec:
              containers:
              - name: spam-operator
                image: {spam}
              - name: eggs
                image: {eggs}
"#
    )
}

#[allow(dead_code)]
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// A resolver script that knows two references and fails on anything else.
#[allow(dead_code)]
pub fn resolver_script(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = write_file(
        dir,
        "resolver.sh",
        r#"#!/bin/sh
if [ "$1" = "registry.example.com/eggs:9.8" ]; then
   printf 2
   exit 0
fi

if [ "$1" = "registry.example.com/maps/spam-operator:1.2" ]; then
   printf 1
   exit 0
fi

echo "unknown reference $1" >&2
exit 1
"#,
    );
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).unwrap();
    path
}
