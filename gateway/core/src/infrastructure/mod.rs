// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod object_store;

pub use event_bus::{EventBus, EventBusError, EventReceiver, JobEventReceiver};
pub use object_store::OpendalObjectStore;
