fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Compile the node-to-node log export proto
    tonic_prost_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/roomlog.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/roomlog.proto");

    Ok(())
}
