//! # Tag Cancel Example
//!
//! Shows how a repeated request with the same tag supersedes the one still
//! running: the latest call wins.
//!
//! - `load-1` needs 1000ms
//! - `load-2` is issued 300ms later with the same tag and cancels `load-1`
//! - `report` uses another tag and is left alone
//!
//! ## Run
//! ```bash
//! cargo run --example tag_cancel
//! ```

use std::time::Duration;

use lifebind::{CancelSignal, Cancelled};
use tokio::task::JoinHandle;
use tokio::time::Instant;

fn request(name: &'static str, signal: CancelSignal, ms: u64) -> JoinHandle<Result<(), Cancelled>> {
    signal.spawn(async move {
        println!("{:>6}[{name}] started", "");
        let start = Instant::now();
        tokio::time::sleep(Duration::from_millis(ms)).await;
        println!("{:>6}[{name}] completed in {:?}", "", start.elapsed());
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    println!("Demo: latest request with a tag wins");
    println!(" └► Bind 'getData' twice, 300ms apart: the first request is cancelled");

    let first = request("load-1", lifebind::bind_filter_tag("getData"), 1000);
    let report = request("report", lifebind::bind_filter_tag("report"), 600);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let second = request("load-2", lifebind::bind_filter_tag("getData"), 500);

    for (name, handle) in [("load-1", first), ("report", report), ("load-2", second)] {
        match handle.await {
            Ok(Ok(())) => println!(" ├─► {name}: done"),
            Ok(Err(reason)) => println!(" ├─► {name}: {}", reason.as_message()),
            Err(e) => println!(" ├─► {name}: panicked ({e})"),
        }
    }

    // explicit send without a new request
    let idle = lifebind::bind_filter_tag("refresh");
    lifebind::send_filter_tag("refresh");
    println!(" └─► refresh: {:?}", idle.outcome());
}
