//! # Lifecycle Example
//!
//! Shows work bound to an owner's lifecycle:
//! - a poller stopped when the owner pauses
//! - a sync job stopped when the owner is destroyed
//! - a bind against a destroyed owner, rejected immediately
//!
//! Registry diagnostics are rendered by the built-in `LogWriter`.
//!
//! ## Run
//! ```bash
//! RUST_LOG=lifebind=debug cargo run --example lifecycle --features "logging"
//! ```

#[cfg(not(feature = "logging"))]
compile_error!("error");

use std::time::Duration;

use lifebind::{BasicOwner, Config, LifecycleEvent, LifecycleRegistry, LogWriter};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let registry = LifecycleRegistry::with_config(&Config::default());
    let _log = registry.bus().map(|bus| bus.subscribe(LogWriter::new()));

    let screen = BasicOwner::new("screen-1");
    screen.advance(&[LifecycleEvent::Create, LifecycleEvent::Start, LifecycleEvent::Resume]);

    let poller = registry
        .bind_until_event(&screen, LifecycleEvent::Pause)
        .spawn(async {
            let mut ticks = 0u32;
            loop {
                tokio::time::sleep(Duration::from_millis(100)).await;
                ticks += 1;
                println!("{:>6}[poller] tick {ticks}", "");
            }
        });
    let sync = registry.bind_until_destroy(&screen).spawn(async {
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    tokio::time::sleep(Duration::from_millis(350)).await;
    screen.handle_event(LifecycleEvent::Pause);
    println!(" ├─► poller: {:?}", poller.await.ok());

    screen.advance(&[LifecycleEvent::Stop, LifecycleEvent::Destroy]);
    println!(" ├─► sync:   {:?}", sync.await.ok());
    println!(" ├─► managers left: {}", registry.len());

    let late = registry.bind_until_event(&screen, LifecycleEvent::Resume);
    println!(" └─► late bind: {:?}", late.outcome());
}
