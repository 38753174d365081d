// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};

use crate::domain::transfer::TransferJob;

/// Transfer lifecycle events published by the queue.
///
/// Every event carries the full current job snapshot, never a diff, so a
/// consumer that only sees the latest event is never out of date. Suitable
/// for forwarding verbatim over any one-way streaming channel (SSE and the
/// like); the core has no notion of the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TransferEvent {
    /// Emitted exactly once, when a job is accepted.
    JobCreated { job: TransferJob },

    /// Emitted on every progress tick and every status transition.
    JobUpdated { job: TransferJob },
}

impl TransferEvent {
    pub fn job(&self) -> &TransferJob {
        match self {
            Self::JobCreated { job } | Self::JobUpdated { job } => job,
        }
    }
}
