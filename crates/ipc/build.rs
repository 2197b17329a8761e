// Path: crates/ipc/build.rs
fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protobuf_src::protoc());
    }

    // Control plane, identical schema for core and gateway.
    tonic_build::compile_protos("proto/control.proto")?;

    // The core's primary game-session service.
    tonic_build::compile_protos("proto/game.proto")?;

    Ok(())
}
