// SPDX-License-Identifier: MPL-2.0

//! Sleep/wake watching demo.
//!
//! Runs the broker against a simulated power monitor that reports a
//! transition every two seconds:
//!
//! 1. **Short-lived subscription**: subscribe, cancel 200ms later, and
//!    wait for the broker to release the monitor
//! 2. **Concurrent subscribers**: two subscribers print transitions until
//!    Ctrl-C, then the broker quiesces again
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=sleepwatch=debug cargo run --example watch
//! ```

use std::time::Duration;

use async_trait::async_trait;
use sleepwatch::{Activity, EventSink, MonitorError, PowerMonitor, SleepBroker};
use tokio_util::sync::CancellationToken;

/// Simulated monitor: flips between sleep and awake every two seconds.
struct TimerMonitor;

#[async_trait]
impl PowerMonitor for TimerMonitor {
    async fn start(&self, sink: EventSink) -> Result<(), MonitorError> {
        sink.listening().await;
        tokio::spawn(async move {
            let mut next = Activity::Sleep;
            loop {
                tokio::time::sleep(Duration::from_secs(2)).await;
                if sink.is_closed() {
                    break;
                }
                sink.notify(next).await;
                next = if next.is_sleep() {
                    Activity::Awake
                } else {
                    Activity::Sleep
                };
            }
        });
        Ok(())
    }

    async fn stop(&self) {}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sleepwatch=debug".parse()?),
        )
        .init();

    let broker = SleepBroker::new(TimerMonitor);

    // A subscriber that leaves almost immediately: the monitor starts for
    // it and is released again once it cancels.
    println!("--- short-lived subscription ---");
    let token = CancellationToken::new();
    let mut quick = broker.subscribe(token.clone()).await;
    tokio::spawn(async move {
        while let Some(activity) = quick.recv().await {
            println!("[quick] host is now {activity}");
        }
        println!("[quick] stream closed");
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    token.cancel();
    broker.await_idle().await;

    // Two concurrent subscribers sharing one monitor run.
    println!("--- watching until Ctrl-C ---");
    let token = CancellationToken::new();
    for name in ["first", "second"] {
        let mut subscription = broker.subscribe(token.clone()).await;
        tokio::spawn(async move {
            while let Some(activity) = subscription.recv().await {
                println!("[{name}] host is now {activity}");
            }
            println!("[{name}] stream closed");
        });
    }

    tokio::signal::ctrl_c().await?;
    token.cancel();
    broker.await_idle().await;
    println!("monitor released, bye");

    Ok(())
}
