// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! rt-core: foundational types shared by every crate in the reactive
//! runtime — identifiers, the error taxonomy, the injectable clock, and
//! cooperative cancellation. No component logic lives here; `rt-runtime`
//! builds the extension system, event bus, task executor, scheduler,
//! process manager, and resilience primitives on top of these.

pub mod macros;

pub mod cancellation;
pub mod clock;
pub mod error;
pub mod id;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use cancellation::CancellationToken;
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{DomainError, Result};
pub use id::{short, IdBuf, ID_MAX_LEN};
