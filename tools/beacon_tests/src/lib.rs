extern crate alloc;

#[path = "../../../firmware/src/beacon/mod.rs"]
pub mod beacon;
