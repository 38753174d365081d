// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod local_files;
pub mod transfer_executor;
pub mod transfer_queue;

pub use local_files::LocalFileService;
pub use transfer_executor::StorageTransferExecutor;
pub use transfer_queue::{ProgressHandle, TransferHandler, TransferQueue};
