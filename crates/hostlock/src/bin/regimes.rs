//! Walks a ring through the three synchronization regimes: interrupt mask
//! before the scheduler, lazy mutex creation at the transition, and
//! mutex-protected operation afterwards.

use hostlock::StdMutexProvider;
use ringsync::{Ring, RingConfig, SyncContext, Timeout};
use std::sync::Arc;

fn main() -> Result<(), ringsync::RingError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let ctx = SyncContext::new();
    let ring: Ring<u32> = Ring::new(
        Arc::clone(&ctx),
        RingConfig::new(8).acquire_timeout(Timeout::Millis(100)),
    )?;

    // "Boot": no scheduler yet, operations mask interrupts.
    ring.write(1)?;
    ring.write(2)?;
    tracing::info!(
        available = ring.available(),
        provider = ctx.has_provider(),
        "pre-scheduler writes done"
    );

    // "Scheduler start": install the provider. The ring picks it up on its
    // next operation and creates its mutex lazily.
    ctx.install_provider(Arc::new(StdMutexProvider::new()));
    ring.write(3)?;
    tracing::info!(
        available = ring.available(),
        provider = ctx.has_provider(),
        "post-scheduler write done"
    );

    // Drain under the mutex; order spans the transition untouched.
    while let Ok(v) = ring.read() {
        tracing::info!(value = v, "read");
    }

    // Move data between two rings sharing the context.
    let staging: Ring<u32> = Ring::new(Arc::clone(&ctx), RingConfig::new(8))?;
    staging.write_many(&[10, 11, 12])?;
    let moved = staging.dump_into(&ring)?;
    tracing::info!(moved, available = ring.available(), "transfer done");

    Ok(())
}
