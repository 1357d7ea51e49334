//! # Pull-based subscriptions
//!
//! Demonstrates:
//! - A lazy inbox that only subscribes on its first pull
//! - Consuming an inbox as a stream with a message limit
//! - Awaiting the next message with `once`
//!
//! Run with: `cargo run --example inbox`

use std::time::Duration;

use futures::StreamExt;

use canopy::{Bus, Topic};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Bus::new();
    let jobs: Topic<u32> = Topic::new("jobs");
    let done: Topic<()> = Topic::new("done");

    let inbox = bus.with_limit(3).inbox(&jobs)?;
    println!("📭 registered before first pull: {}", bus.subscriber_count(&jobs));

    let worker = tokio::spawn(async move {
        let mut stream = Box::pin(inbox.into_stream());
        while let Some(job) = stream.next().await {
            println!("⚙️  worker: job #{job}");
        }
        println!("⚙️  worker: budget spent, stopping");
    });

    while bus.subscriber_count(&jobs) == 0 {
        tokio::task::yield_now().await;
    }
    for job in 1..=5 {
        bus.publish(&jobs, job)?;
    }
    worker.await?;

    let finished = bus.once(&done)?;
    let publisher = bus.clone();
    let announce = done.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = publisher.signal(&announce);
    });
    if finished.await.is_some() {
        println!("✅ done signal received");
    }
    Ok(())
}
