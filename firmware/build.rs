use std::fs;
use std::path::PathBuf;

/// Development identity. Real nodes are provisioned through the environment.
const DEFAULT_PUBKEY_MAGIC: &str = "babe";
const DEFAULT_MODEM_ID: &str = "00421337";
const DEFAULT_LOCATION_KEY: &str =
    "3a17c05e9102448de36b207f19a45c0ed288316fb90472ee135ac829";

fn main() {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap());
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap());

    fs::copy(manifest_dir.join("memory.x"), out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());
    println!("cargo:rerun-if-changed=memory.x");

    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");

    let magic = hex_var("BEACON_PUBKEY_MAGIC", DEFAULT_PUBKEY_MAGIC, 2);
    let modem_id = hex_var("BEACON_MODEM_ID", DEFAULT_MODEM_ID, 4);
    let location_key = hex_var("BEACON_LOCATION_KEY", DEFAULT_LOCATION_KEY, 28);

    let source = format!(
        "pub const PROVISIONING: crate::beacon::config::Provisioning = \
         crate::beacon::config::Provisioning {{\n    \
         pubkey_magic: {magic:?},\n    \
         modem_id: 0x{modem:08x},\n    \
         location_key: {location_key:?},\n}};\n",
        modem = u32::from_be_bytes([modem_id[0], modem_id[1], modem_id[2], modem_id[3]]),
    );
    fs::write(out_dir.join("provisioning.rs"), source).unwrap();
}

fn hex_var(name: &str, default: &str, len: usize) -> Vec<u8> {
    println!("cargo:rerun-if-env-changed={name}");
    let value = std::env::var(name).unwrap_or_else(|_| default.to_string());
    let value = value.trim();
    if value.len() != len * 2 {
        panic!("{name} must be {len} bytes of hex, got {:?}", value);
    }
    (0..len)
        .map(|i| {
            u8::from_str_radix(&value[i * 2..i * 2 + 2], 16)
                .unwrap_or_else(|_| panic!("{name} is not valid hex: {:?}", value))
        })
        .collect()
}
