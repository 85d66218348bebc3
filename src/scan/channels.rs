//! Channel lists for partial (channel-restricted) scans.

use std::collections::BTreeSet;

/// How long a channel observation stays relevant for the connected network.
pub const CHANNEL_LIST_AGE_MS: u64 = 60 * 60 * 1000;

/// How long a channel observation stays relevant for background scan lists.
pub const MAX_PNO_SCAN_FREQUENCY_AGE_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// Bounded set of frequencies, built network by network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSet {
    frequencies: BTreeSet<u32>,
    /// 0 means unlimited.
    max_count: usize,
}

impl ChannelSet {
    pub fn new(max_count: usize) -> Self {
        Self {
            frequencies: BTreeSet::new(),
            max_count,
        }
    }

    /// Add a frequency directly, ignoring caps.
    pub fn insert(&mut self, frequency_mhz: u32) -> bool {
        self.frequencies.insert(frequency_mhz)
    }

    /// Add one network's recent frequencies.
    ///
    /// At most `max_new_per_network` previously unseen frequencies are taken
    /// from this network (0 means no per-network limit). Returns `false` once
    /// the global cap is hit, meaning no further networks should be added.
    pub fn add_network_frequencies<I>(&mut self, frequencies: I, max_new_per_network: usize) -> bool
    where
        I: IntoIterator<Item = u32>,
    {
        let mut allowed = if max_new_per_network == 0 {
            usize::MAX
        } else {
            max_new_per_network
        };
        for frequency in frequencies {
            if self.max_count > 0 && self.frequencies.len() >= self.max_count {
                return false;
            }
            if allowed == 0 {
                return true;
            }
            if self.frequencies.insert(frequency) {
                allowed -= 1;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn contains(&self, frequency_mhz: u32) -> bool {
        self.frequencies.contains(&frequency_mhz)
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.frequencies.into_iter().collect()
    }
}
