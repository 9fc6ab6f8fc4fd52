//! Migration policies: how many hops a single call may take.
//!
//! The minimal flow has no bound at all — a server that keeps redirecting
//! would loop the client forever. The bound therefore lives in a policy the
//! caller picks, with [`HopLimit`] as the default and [`Unbounded`] for the
//! source-faithful behavior.

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::time::Duration;

use crate::errors::MigrationSignal;

/// Controls whether the client follows another migration signal.
pub trait MigrationPolicy: Send + Sync + 'static {
    /// Decide on the pending hop: `Continue(delay)` follows the signal after
    /// sleeping `delay`, `Break` fails the call with a migration-limit error.
    fn on_migration(&self, ctx: &MigrationContext) -> ControlFlow<(), Duration>;
}

/// Context passed to [`MigrationPolicy::on_migration`] before each hop.
pub struct MigrationContext {
    /// How many migration signals this logical call has received, this one
    /// included.
    pub hop_count: NonZeroU32,
    /// The data center the server redirected to.
    pub target_dc: i32,
    /// The signal itself.
    pub signal: MigrationSignal,
}

/// Follow up to `max_hops` migration signals per call, with no delay
/// between cycles. The default policy.
pub struct HopLimit {
    /// Maximum number of hops for one logical call.
    pub max_hops: NonZeroU32,
}

impl Default for HopLimit {
    fn default() -> Self {
        Self { max_hops: NonZeroU32::new(5).unwrap() }
    }
}

impl MigrationPolicy for HopLimit {
    fn on_migration(&self, ctx: &MigrationContext) -> ControlFlow<(), Duration> {
        if ctx.hop_count <= self.max_hops {
            ControlFlow::Continue(Duration::ZERO)
        } else {
            tracing::warn!(
                hops = ctx.hop_count.get(),
                target_dc = ctx.target_dc,
                "migration hop limit exhausted"
            );
            ControlFlow::Break(())
        }
    }
}

/// Follow every migration signal, forever.
///
/// This reproduces the unbounded upstream behavior and carries its liveness
/// risk: two data centers redirecting at each other will loop the call
/// indefinitely.
pub struct Unbounded;

impl MigrationPolicy for Unbounded {
    fn on_migration(&self, _: &MigrationContext) -> ControlFlow<(), Duration> {
        ControlFlow::Continue(Duration::ZERO)
    }
}

/// Never migrate; the first signal fails the call.
pub struct NoMigrations;

impl MigrationPolicy for NoMigrations {
    fn on_migration(&self, _: &MigrationContext) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}
