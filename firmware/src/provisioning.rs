//! Per-node identity, generated by `build.rs` from `BEACON_PUBKEY_MAGIC`,
//! `BEACON_MODEM_ID` and `BEACON_LOCATION_KEY`.

include!(concat!(env!("OUT_DIR"), "/provisioning.rs"));
