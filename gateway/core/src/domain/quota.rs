// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Quota Manager Domain Service
//!
//! Tracks and enforces per-location storage and file-count budgets. Callers
//! consult `check_quota` before committing writes and report committed work
//! (or deletions) through `update_quota`. State is in-memory only; each
//! gateway instance owns its own counters.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Default storage budget per location, 100 GiB.
pub const DEFAULT_MAX_STORAGE_BYTES: u64 = 100 * 1024 * 1024 * 1024;

/// Default file-count budget per location.
pub const DEFAULT_MAX_FILE_COUNT: u64 = 10_000;

/// Budget and usage for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQuota {
    pub max_storage_bytes: u64,
    pub max_file_count: u64,
    pub current_storage_bytes: u64,
    pub current_file_count: u64,
}

impl Default for LocationQuota {
    fn default() -> Self {
        Self {
            max_storage_bytes: DEFAULT_MAX_STORAGE_BYTES,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            current_storage_bytes: 0,
            current_file_count: 0,
        }
    }
}

/// Outcome of a quota check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl QuotaDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: String) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Per-location quota bookkeeping.
///
/// Quotas are lazily initialized to defaults on first reference and never
/// reinitialized once present. The dashmap entry lock makes each
/// check/update a per-key critical section.
#[derive(Default)]
pub struct QuotaManager {
    quotas: DashMap<String, LocationQuota>,
}

impl QuotaManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Would adding `add_bytes` bytes and `add_files` files stay within
    /// budget? Usage exactly at a limit is allowed; one unit over is not.
    pub fn check_quota(&self, location_id: &str, add_bytes: u64, add_files: u64) -> QuotaDecision {
        let quota = self
            .quotas
            .entry(location_id.to_string())
            .or_default();

        let projected_bytes = quota.current_storage_bytes.saturating_add(add_bytes);
        if projected_bytes > quota.max_storage_bytes {
            let remaining = quota
                .max_storage_bytes
                .saturating_sub(quota.current_storage_bytes);
            return QuotaDecision::deny(format!(
                "Storage quota exceeded for {location_id}: {remaining} bytes remaining, {add_bytes} requested"
            ));
        }

        let projected_files = quota.current_file_count.saturating_add(add_files);
        if projected_files > quota.max_file_count {
            let remaining = quota
                .max_file_count
                .saturating_sub(quota.current_file_count);
            return QuotaDecision::deny(format!(
                "File count quota exceeded for {location_id}: {remaining} file(s) remaining, {add_files} requested"
            ));
        }

        QuotaDecision::allow()
    }

    /// Apply usage deltas. Negative deltas (deletions) clamp at zero.
    pub fn update_quota(&self, location_id: &str, delta_bytes: i64, delta_files: i64) {
        let mut quota = self
            .quotas
            .entry(location_id.to_string())
            .or_default();

        quota.current_storage_bytes = apply_delta(quota.current_storage_bytes, delta_bytes);
        quota.current_file_count = apply_delta(quota.current_file_count, delta_files);
    }

    /// Current budget and usage, as a defensive copy.
    pub fn quota_status(&self, location_id: &str) -> LocationQuota {
        self.quotas
            .entry(location_id.to_string())
            .or_default()
            .clone()
    }
}

fn apply_delta(current: u64, delta: i64) -> u64 {
    if delta >= 0 {
        current.saturating_add(delta as u64)
    } else {
        current.saturating_sub(delta.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_defaults() {
        let manager = QuotaManager::new();
        let status = manager.quota_status("local-0");
        assert_eq!(status.max_storage_bytes, DEFAULT_MAX_STORAGE_BYTES);
        assert_eq!(status.max_file_count, DEFAULT_MAX_FILE_COUNT);
        assert_eq!(status.current_storage_bytes, 0);
    }

    #[test]
    fn test_boundary_exactly_at_limit_is_allowed() {
        let manager = QuotaManager::new();
        let decision = manager.check_quota("local-0", DEFAULT_MAX_STORAGE_BYTES, 0);
        assert!(decision.allowed);

        let decision = manager.check_quota("local-0", DEFAULT_MAX_STORAGE_BYTES + 1, 0);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("Storage quota exceeded"));
    }

    #[test]
    fn test_boundary_accounts_for_committed_usage() {
        let manager = QuotaManager::new();
        manager.update_quota("local-0", (DEFAULT_MAX_STORAGE_BYTES - 10) as i64, 1);

        assert!(manager.check_quota("local-0", 10, 1).allowed);
        assert!(!manager.check_quota("local-0", 11, 1).allowed);
    }

    #[test]
    fn test_file_count_boundary() {
        let manager = QuotaManager::new();
        assert!(manager.check_quota("local-0", 0, DEFAULT_MAX_FILE_COUNT).allowed);

        let decision = manager.check_quota("local-0", 0, DEFAULT_MAX_FILE_COUNT + 1);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("File count quota exceeded"));
    }

    #[test]
    fn test_negative_deltas_clamp_at_zero() {
        let manager = QuotaManager::new();
        manager.update_quota("local-0", 100, 2);
        manager.update_quota("local-0", -500, -10);

        let status = manager.quota_status("local-0");
        assert_eq!(status.current_storage_bytes, 0);
        assert_eq!(status.current_file_count, 0);
    }

    #[test]
    fn test_locations_are_independent() {
        let manager = QuotaManager::new();
        manager.update_quota("local-0", DEFAULT_MAX_STORAGE_BYTES as i64, 0);

        assert!(!manager.check_quota("local-0", 1, 0).allowed);
        assert!(manager.check_quota("local-1", 1, 0).allowed);
    }
}
