//! # Basic publish / subscribe
//!
//! Demonstrates:
//! - Fire-and-forget publishing with failures routed to the error callback
//! - Awaited publishing that collects every handler's result
//! - Priorities and one-shot subscriptions
//!
//! Run with: `cargo run --example basic`

use std::sync::Arc;

use canopy::{BoxError, Bus, DispatchError, Single, Topic};

#[derive(Clone, Debug)]
struct Order {
    id: u32,
    qty: u32,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = Bus::builder()
        .on_error(Arc::new(|err: &DispatchError| {
            println!("⚠️  {} ({})", err, err.as_label());
        }))
        .build();

    let placed: Topic<Order> = Topic::new("order.placed");
    let priced: Topic<Order, f64> = Topic::new("order.priced");
    let stock: Topic<u32, u32, Single> = Topic::new("stock.level");

    // Runs first thanks to its priority.
    let _audit = bus.with_priority(-10).subscribe(&placed, |order: Order| {
        println!("📝 audit: order #{} x{}", order.id, order.qty);
        Ok::<_, BoxError>(())
    })?;
    let _ship = bus.subscribe(&placed, |order: Order| {
        if order.qty == 0 {
            return Err::<(), BoxError>(format!("order #{} has no items", order.id).into());
        }
        println!("📦 ship: order #{}", order.id);
        Ok(())
    })?;
    let _welcome = bus.subscribe_once(&placed, |order: Order| {
        println!("🎉 first order ever: #{}", order.id);
        Ok::<_, BoxError>(())
    })?;

    bus.publish(&placed, Order { id: 1, qty: 2 })?;
    bus.publish(&placed, Order { id: 2, qty: 0 })?;
    bus.flush().await;

    let _net = bus.subscribe(&priced, |o: Order| Ok::<_, BoxError>(f64::from(o.qty) * 9.5))?;
    let _gross = bus.subscribe(&priced, |o: Order| Ok::<_, BoxError>(f64::from(o.qty) * 9.5 * 1.2))?;
    let prices = bus.publish_await(&priced, Order { id: 3, qty: 4 })?.await?;
    println!("💶 prices: {prices:?}");

    let _warehouse = bus.subscribe(&stock, |sku: u32| Ok::<_, BoxError>(sku % 7))?;
    let level = bus.publish_await(&stock, 40)?.await?;
    println!("🏭 stock level: {level}");

    bus.dispose();
    Ok(())
}
