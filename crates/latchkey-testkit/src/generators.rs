//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use latchkey_registry::{Identity, IdentityRole};
use latchkey_rpc::Frame;

/// Generate an email address.
pub fn email() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9.]{0,11}@[a-z]{1,8}\\.(com|org|net)".prop_map(String::from)
}

/// Generate a display name, including non-ASCII text.
pub fn display_name() -> impl Strategy<Value = String> {
    "\\PC{0,24}".prop_map(String::from)
}

pub fn role() -> impl Strategy<Value = IdentityRole> {
    prop_oneof![Just(IdentityRole::Person), Just(IdentityRole::Root)]
}

pub fn identity() -> impl Strategy<Value = Identity> {
    (email(), display_name(), role()).prop_map(|(email, name, role)| Identity::new(email, name, role))
}

/// Generate opaque registry key bytes. The registry never parses keys.
pub fn registry_key() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=96)
}

/// Generate registry contents with distinct keys.
pub fn registry_entries(max: usize) -> impl Strategy<Value = BTreeMap<Vec<u8>, Identity>> {
    prop::collection::btree_map(registry_key(), identity(), 0..=max)
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

pub fn frame(max_len: usize) -> impl Strategy<Value = Frame> {
    (any::<u32>(), payload(max_len)).prop_map(|(msg_type, payload)| Frame::new(msg_type, payload))
}
