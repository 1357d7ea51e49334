//! # Interceptors and listeners
//!
//! Demonstrates:
//! - The built-in `LogWriter` listener
//! - A veto interceptor that drops messages
//! - Wrap interceptors layered as middleware (latest added runs outermost)
//! - Binding an object's handlers through a descriptor table
//!
//! Run with: `cargo run --example interceptors --features logging`

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use canopy::{
    veto_fn, wrap_fn, Bindable, Bus, Descriptor, LogWriter, Message, PublishError, Reply, Topic,
};

struct Thermostat {
    target: AtomicU32,
    set: Topic<u32, u32>,
    read: Topic<(), u32>,
}

impl Bindable for Thermostat {
    fn descriptors(&self) -> Vec<Descriptor> {
        vec![Descriptor::new(&self.set, 0), Descriptor::new(&self.read, 1)]
    }

    fn invoke(&self, argument: usize, message: &Message<'_>) -> Reply {
        match (argument, message.payload::<u32>()) {
            (0, Some(t)) => Reply::value(self.target.swap(*t, Ordering::SeqCst)),
            (1, _) => Reply::value(self.target.load(Ordering::SeqCst)),
            _ => Reply::error("unexpected message"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Bus::builder().listener(Arc::new(LogWriter::new())).build();

    bus.add_interceptor(veto_fn("too-hot", |msg| {
        msg.payload::<u32>().is_some_and(|t| *t > 30)
    }))?;
    bus.add_interceptor(wrap_fn("timing", |msg, next| {
        let started = Instant::now();
        let reply = next.run();
        println!("⏱️  {} handled in {:?}", msg.topic(), started.elapsed());
        reply
    }))?;

    let thermostat = Arc::new(Thermostat {
        target: AtomicU32::new(20),
        set: Topic::new("thermostat.set"),
        read: Topic::new("thermostat.read"),
    });
    let _binding = bus.bind(&thermostat)?;

    let previous = bus.publish_await(&thermostat.set, 22)?.await?;
    println!("🌡️  target 22, previous {previous:?}");

    match bus.publish_await(&thermostat.set, 45)?.await {
        Err(PublishError::Vetoed { topic }) => println!("🚫 {topic}: 45 vetoed"),
        other => println!("unexpected: {other:?}"),
    }

    let now = bus.signal_await(&thermostat.read)?.await?;
    println!("🌡️  current target {now:?}");
    Ok(())
}
