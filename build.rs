use std::{env, io::Result, path::PathBuf};

fn main() -> Result<()> {
    let proto_root = PathBuf::from("proto");
    let proto_paths = [
        proto_root.join("coordinator.proto"),
        proto_root.join("worker.proto"),
    ];

    for proto in &proto_paths {
        println!("cargo:rerun-if-changed={}", proto.display());
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .out_dir(&out_dir)
        .compile(&proto_paths, &[proto_root])?;

    Ok(())
}
