// src/runtime.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Sync facade over the async store backends.
//!
//! The gateway API is blocking. Store futures run on one background Tokio
//! runtime that lives for the rest of the process; the calling thread waits
//! on a channel for the result, so callers may themselves sit inside another
//! runtime (from a blocking section).

use anyhow::{anyhow, Context, Result};
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::mpsc;
use std::thread;
use tokio::runtime::{Builder, Handle};
use tracing::debug;

const THREADS_ENV: &str = "STOREGATE_RT_THREADS";

static GATEWAY_RT: OnceCell<Handle> = OnceCell::new();

fn worker_threads() -> usize {
    let from_env = std::env::var(THREADS_ENV).ok().and_then(|s| s.parse::<usize>().ok());
    match from_env {
        Some(n) if n > 0 => n,
        // I/O bound and never fanned out: a handful of workers is enough.
        _ => num_cpus::get().clamp(2, 16),
    }
}

fn start_runtime() -> Result<Handle> {
    let threads = worker_threads();
    let rt = Builder::new_multi_thread()
        .enable_all()
        .worker_threads(threads)
        .thread_name("storegate-io")
        .build()
        .context("building gateway runtime")?;
    let handle = rt.handle().clone();
    debug!("gateway runtime up with {} workers", threads);

    // The runtime is moved onto a parked thread so it is never dropped.
    thread::Builder::new()
        .name("storegate-rt".into())
        .spawn(move || rt.block_on(std::future::pending::<()>()))
        .context("spawning gateway runtime thread")?;
    Ok(handle)
}

/// Drive `fut` to completion on the gateway runtime, blocking this thread.
pub fn run_on_global_rt<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = GATEWAY_RT.get_or_try_init(start_runtime)?;
    let (tx, rx) = mpsc::sync_channel(1);
    handle.spawn(async move {
        let _ = tx.send(fut.await);
    });
    rx.recv().map_err(|_| anyhow!("store task ended without a result"))?
}
