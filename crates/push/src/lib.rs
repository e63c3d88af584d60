//! Courier push delivery
//!
//! One background worker per push-enabled subscription. The [`Manager`]
//! owns the worker registry and its lifecycle (add / launch / stop /
//! restart); each [`worker`] runs a cancellable delivery loop that consumes
//! from the broker and POSTs to the subscription's endpoint, advancing the
//! stored offset on every 2xx.
//!
//! Workers are supervised: a panicking delivery loop is caught, logged, and
//! relaunched after a backoff. Nothing a worker does can reach a request
//! handler.

mod manager;
mod worker;

pub use manager::Manager;
pub use worker::PushEnvelope;

use std::time::Duration;

/// Timeout for a single push POST. Delivery never blocks cancellation
/// longer than this.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause before relaunching a worker that died by panic.
pub(crate) const SUPERVISOR_BACKOFF: Duration = Duration::from_secs(1);
