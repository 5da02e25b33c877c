//! Generates the `manager` gRPC bindings and the file descriptor set served
//! by the reflection service.
//!
//! Generated code is reachable as `osmshard_tonic_core::proto`.
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("manager_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    println!("cargo:rerun-if-changed=proto/manager.proto");
    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/manager.proto"], &["proto"])
        .unwrap();
}
