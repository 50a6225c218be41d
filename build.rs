fn main() {
    // Rebuild when the build script changes
    println!("cargo:rerun-if-changed=build.rs");

    // Version and build time, logged at startup
    built::write_built_file()
        .expect("Failed to acquire build-time information");
}
