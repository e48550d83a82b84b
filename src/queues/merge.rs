//! Merge of per-queue gap lists.
//!
//! # Algorithm
//! Divide and conquer over the lists: merge the first half, merge the second
//! half, then merge the two results. Each merge step prefers the left side on
//! equal starts, so gaps starting together keep the order of the queues they
//! come from. Gaps without start sort first.
//!
//! O(n log k) for n gaps over k lists.

use itertools::Itertools;

use crate::models::GapOnQueue;

/// Stable k-way merge of gap lists each sorted by start.
pub struct GapsMergeSort;

impl GapsMergeSort {
    pub fn sort(mut lists: Vec<Vec<GapOnQueue>>) -> Vec<GapOnQueue> {
        match lists.len() {
            0 => Vec::new(),
            1 => lists.pop().unwrap_or_default(),
            n => {
                let right = lists.split_off(n / 2);
                let left = Self::sort(lists);
                let right = Self::sort(right);
                left.into_iter()
                    .merge_by(right, |a, b| a.start_time() <= b.start_time())
                    .collect()
            }
        }
    }
}
