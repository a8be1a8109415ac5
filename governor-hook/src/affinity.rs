//! CPU list notation (`0,2,4-7`) as used by the Proxmox `affinity` option

use crate::error::AffinityParseError;
use std::collections::BTreeSet;

/// Deduplicated set of physical core indices
pub type CoreSet = BTreeSet<u32>;

/// Highest core index accepted, Proxmox cpusets stop at 8192 CPUs
pub const MAX_CORE_INDEX: u32 = 8191;

/// Expand a cpu list into explicit core indices. Ranges are inclusive.
/// A blank list yields the empty set.
pub fn parse_cpu_list(list: &str) -> Result<CoreSet, AffinityParseError> {
    let mut cores = CoreSet::new();
    if list.trim().is_empty() {
        return Ok(cores);
    }

    for entry in list.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            return Err(AffinityParseError::EmptyEntry(list.to_string()));
        }

        match entry.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start)?;
                let end = parse_index(end)?;
                if start > end {
                    return Err(AffinityParseError::DescendingRange { start, end });
                }
                cores.extend(start..=end);
            }
            None => {
                cores.insert(parse_index(entry)?);
            }
        }
    }

    Ok(cores)
}

fn parse_index(raw: &str) -> Result<u32, AffinityParseError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AffinityParseError::InvalidIndex(raw.to_string()));
    }
    let index: u32 = raw
        .parse()
        .map_err(|_| AffinityParseError::IndexOutOfRange(raw.to_string()))?;
    if index > MAX_CORE_INDEX {
        return Err(AffinityParseError::IndexOutOfRange(raw.to_string()));
    }
    Ok(index)
}
