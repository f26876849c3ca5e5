//! Build script for gitssh-proto
//!
//! Compiles protobuf definitions using tonic-prost-build with a vendored protoc.

#![allow(unsafe_code)]

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_root = "../../proto";

    let protos = ["gitssh/v1/handler.proto"];

    let proto_paths: Vec<_> = protos
        .iter()
        .map(|p| format!("{proto_root}/{p}"))
        .collect();

    for path in &proto_paths {
        println!("cargo:rerun-if-changed={path}");
    }

    let protoc = protoc_bin_vendored::protoc_bin_path()?;
    // SAFETY: build scripts are single-threaded at this point.
    unsafe {
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&proto_paths, &[proto_root.to_string()])?;

    Ok(())
}
