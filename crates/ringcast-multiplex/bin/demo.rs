//! Demonstration of ringcast and its multiplexing combinators.
//!
//! Run with: `RUST_LOG=debug cargo run -p ringcast-multiplex --bin demo`

use ringcast::{Ring, RingConfig};
use ringcast_multiplex::{Demux, DemuxConfig, DemuxReader, Mux, MuxConfig};
use std::time::Duration;
use tokio::time::timeout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

type DemoResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> DemoResult {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== ringcast Demo ===\n");

    demo_broadcast().await?;
    demo_lag_resync().await?;
    demo_backpressure().await?;
    demo_end_of_writes().await?;
    demo_mux().await?;
    demo_demux().await?;

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: Every reader sees every value
async fn demo_broadcast() -> DemoResult {
    println!("--- Demo 1: Broadcast ---");

    let ring = Ring::<u64>::new(RingConfig::small())?;
    let consumers: Vec<_> = (0..3)
        .map(|n| {
            let mut reader = ring.reader();
            tokio::spawn(async move {
                let mut sum = 0;
                while let Some(item) = reader.recv().await {
                    sum += item;
                }
                println!("  Reader {} summed {}", n, sum);
                sum
            })
        })
        .collect();

    for i in 1..=10 {
        ring.write(i).await?;
    }
    ring.end_of_writes().await?;

    for consumer in consumers {
        assert_eq!(consumer.await?, 55);
    }
    ring.cancel().await?;
    println!("  ✓ Broadcast complete\n");
    Ok(())
}

/// Demo 2: A reader lapped by the writer skips to the oldest retained value
async fn demo_lag_resync() -> DemoResult {
    println!("--- Demo 2: Lag Resynchronization ---");

    let ring = Ring::<&'static str>::with_capacity(3)?;
    let mut reader = ring.reader();
    for item in ["a", "b", "c", "d"] {
        ring.write(item).await?;
    }

    let first = reader.recv().await;
    println!("  Capacity 3, wrote a..d, first read: {:?}", first);
    assert_eq!(first, Some("b"));

    ring.cancel().await?;
    println!("  ✓ Resync complete\n");
    Ok(())
}

/// Demo 3: The writer paces itself to the slowest reader
async fn demo_backpressure() -> DemoResult {
    println!("--- Demo 3: Backpressure ---");

    let ring = Ring::<u64>::with_capacity(4)?;
    let fast = ring.reader();
    let slow = ring.reader();
    let ids = [fast.id(), slow.id()];

    let spawn_consumer = |mut reader: ringcast::Reader<u64>, delay: Duration| {
        tokio::spawn(async move {
            let mut count = 0;
            while reader.recv().await.is_some() {
                count += 1;
                tokio::time::sleep(delay).await;
            }
            count
        })
    };
    let fast = spawn_consumer(fast, Duration::ZERO);
    let slow = spawn_consumer(slow, Duration::from_millis(1));

    let mut refused = 0;
    let mut sent = 0;
    while sent < 32 {
        let watched = ring.slowest_reader(&ids).await?;
        if ring.write_or_starve(sent, watched).await? {
            sent += 1;
        } else {
            refused += 1;
            tokio::task::yield_now().await;
        }
    }
    ring.end_of_writes().await?;

    let (fast, slow) = (fast.await?, slow.await?);
    println!("  Sent 32 with {} refusals; fast read {}, slow read {}", refused, fast, slow);
    assert_eq!((fast, slow), (32, 32));

    ring.cancel().await?;
    println!("  ✓ Backpressure complete\n");
    Ok(())
}

/// Demo 4: A reader created after end-of-writes still drains everything
async fn demo_end_of_writes() -> DemoResult {
    println!("--- Demo 4: End of Writes ---");

    let ring = Ring::<String>::new(RingConfig::default())?;
    for i in 0..20 {
        ring.write(format!("Some data {}", i)).await?;
    }
    ring.end_of_writes().await?;

    let mut late = ring.reader();
    let mut count = 0;
    while let Some(item) = timeout(Duration::from_secs(1), late.recv()).await? {
        count += 1;
        if count == 20 {
            println!("  Last value: {}", item);
        }
    }
    assert_eq!(count, 20);

    ring.cancel().await?;
    println!("  ✓ End of writes complete\n");
    Ok(())
}

/// Demo 5: One writer fanned out to several rings
async fn demo_mux() -> DemoResult {
    println!("--- Demo 5: Mux ---");

    let (mux, mut errors) = Mux::new(MuxConfig::default())?;
    let rings: Vec<Ring<u32>> = (0..3)
        .map(|_| Ring::with_capacity(16))
        .collect::<Result<_, _>>()?;

    for ring in &rings {
        mux.add(ring.clone()).await?;
    }
    // Reported on the error channel, the mux keeps running.
    mux.add(rings[0].clone()).await?;

    for i in 0..5 {
        mux.write(i).await?;
    }
    mux.cancel().await?;
    mux.stopped().await;

    if let Some(error) = errors.recv().await {
        println!("  Reported: {}", error);
    }

    for ring in &rings {
        let mut reader = ring.reader();
        ring.end_of_writes().await?;
        let mut items = Vec::new();
        while let Some(item) = reader.recv().await {
            items.push(item);
        }
        println!("  {} received {:?}", ring.id(), items);
        ring.cancel().await?;
    }

    println!("  ✓ Mux complete\n");
    Ok(())
}

/// Demo 6: Several sources merged into one ring
async fn demo_demux() -> DemoResult {
    println!("--- Demo 6: Demux ---");

    let (demux, _errors) = Demux::new(DemuxConfig::default())?;
    let sources: Vec<Ring<String>> = (0..3)
        .map(|_| Ring::with_capacity(16))
        .collect::<Result<_, _>>()?;

    for source in &sources {
        let mut forwarder = DemuxReader::new(source.reader());
        let id = source.id();
        forwarder.set_on_cancel(move || println!("  Forwarding from {} finished", id));
        demux.add(forwarder).await?;
    }

    for (n, source) in sources.iter().enumerate() {
        for i in 0..2 {
            source.write(format!("source{}-{}", n, i)).await?;
        }
        source.end_of_writes().await?;
    }

    let mut merged = demux.reader();
    for _ in 0..6 {
        if let Some(item) = timeout(Duration::from_secs(1), merged.recv()).await? {
            println!("  Merged: {}", item);
        }
    }

    demux.cancel().await?;
    demux.stopped().await;
    println!("  ✓ Demux complete\n");
    Ok(())
}
