//! Site ID to host resolution.
//!
//! Site IDs encode their address: the first three characters are the third
//! octet and the numeric remainder is the fourth, under a fixed network prefix.
//! `13100` therefore lives at `10.16.131.00`.

use crate::error::AddressFormatError;

/// Network prefix every derived host starts with.
pub const SITE_NETWORK_PREFIX: &str = "10.16.";

/// Number of leading characters copied verbatim into the host.
const SITE_PREFIX_LEN: usize = 3;

/// Resolve a site ID into the host to connect to.
///
/// A non-empty `host_override` is returned unchanged and the site ID is not
/// inspected at all. Otherwise the ID must have at least four characters and
/// everything after the first three must parse as a non-negative integer.
pub fn resolve(site_id: &str, host_override: Option<&str>) -> Result<String, AddressFormatError> {
    if let Some(host) = host_override.filter(|h| !h.is_empty()) {
        return Ok(host.to_string());
    }

    let split_at = site_id
        .char_indices()
        .nth(SITE_PREFIX_LEN)
        .map(|(idx, _)| idx)
        .ok_or_else(|| {
            AddressFormatError::new(site_id, "expected at least 4 characters")
        })?;
    let (prefix, remainder) = site_id.split_at(split_at);

    let number: u64 = remainder.parse().map_err(|e| {
        AddressFormatError::new(
            site_id,
            format!("'{}' is not a non-negative integer ({})", remainder, e),
        )
    })?;

    Ok(format!("{}{}.{:02}", SITE_NETWORK_PREFIX, prefix, number))
}
