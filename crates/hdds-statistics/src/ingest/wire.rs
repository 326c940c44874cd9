// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Canonical text rendering of wire-format identifiers.
//!
//! The canonical forms are lookup keys in the entity graph and are
//! stable across dump/load:
//!
//! - GUID: `xx.xx.xx.xx.xx.xx.xx.xx.xx.xx.xx.xx|0xYYYYYYYY`
//!   (12 prefix bytes dotted hex, entity id as 8 hex digits)
//! - Locator: `KIND:[addr]:port`, address rendering per transport kind.

use super::events::{WireGuid, WireLocator};
use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};

/// UDP over IPv4.
pub const LOCATOR_KIND_UDPV4: u32 = 1;
/// UDP over IPv6.
pub const LOCATOR_KIND_UDPV6: u32 = 2;
/// TCP over IPv4.
pub const LOCATOR_KIND_TCPV4: u32 = 4;
/// TCP over IPv6.
pub const LOCATOR_KIND_TCPV6: u32 = 8;
/// Shared memory segment.
pub const LOCATOR_KIND_SHM: u32 = 16;

/// Render a wire GUID in its canonical text form.
pub fn deserialize_guid(guid: &WireGuid) -> String {
    let mut out = String::with_capacity(48);
    for (i, byte) in guid[..12].iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    let entity_id = u32::from_be_bytes([guid[12], guid[13], guid[14], guid[15]]);
    let _ = write!(out, "|0x{:08x}", entity_id);
    out
}

/// Render a wire locator in its canonical text form.
///
/// # Errors
/// `BadParameter` for an unknown transport kind; the event carrying the
/// locator is a protocol error and gets dropped.
pub fn deserialize_locator(locator: &WireLocator) -> Result<String> {
    let (name, addr) = match locator.kind {
        LOCATOR_KIND_UDPV4 => ("UDPv4", ipv4_text(&locator.address)),
        LOCATOR_KIND_UDPV6 => ("UDPv6", ipv6_text(&locator.address)),
        LOCATOR_KIND_TCPV4 => ("TCPv4", ipv4_text(&locator.address)),
        LOCATOR_KIND_TCPV6 => ("TCPv6", ipv6_text(&locator.address)),
        LOCATOR_KIND_SHM => ("SHM", ipv4_text(&locator.address)),
        other => {
            return Err(Error::BadParameter(format!(
                "unknown locator kind {}",
                other
            )));
        }
    };
    Ok(format!("{}:[{}]:{}", name, addr, locator.port))
}

fn ipv4_text(address: &[u8; 16]) -> String {
    Ipv4Addr::new(address[12], address[13], address[14], address[15]).to_string()
}

fn ipv6_text(address: &[u8; 16]) -> String {
    Ipv6Addr::from(*address).to_string()
}
