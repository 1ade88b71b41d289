fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Fall back to the vendored protoc when the host has none configured.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    println!("cargo:rerun-if-changed=proto/oracle.proto");
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile(&["proto/oracle.proto"], &["proto"])?;
    Ok(())
}
