use ktail_kafka::{BrokerConsumer, ConsumerConfig, Message, TimeMarker};
use std::time::Duration;
use tokio::sync::mpsc;

/// Example delivering messages from one partition over a channel
///
/// This example shows how to:
/// 1. Look up the earliest retained offset
/// 2. Start a consumer at that offset
/// 3. Receive messages on a channel while the consumer polls
/// 4. Stop the consumer on Ctrl+C
///
/// To run this example:
/// 1. Start a 0.7 broker listening on localhost:9092 with a topic named "user-events"
/// 2. Run the example
///   cargo run --example channel_consumer

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    match run_main().await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<()> {
    let lookup = BrokerConsumer::offset_consumer("localhost:9092", "user-events", 0);
    let earliest = lookup
        .get_offsets(TimeMarker::Earliest, 1)
        .await?
        .first()
        .copied()
        .unwrap_or(0);
    println!("Earliest offset: {earliest}");

    let config = ConsumerConfig {
        topic: "user-events".to_string(),
        offset: earliest,
        max_fetch_size: 256 * 1024,
        verify_checksums: true,
        ..Default::default()
    };
    let mut consumer = BrokerConsumer::from_config(config)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let printer = tokio::spawn(async move {
        let mut count = 0u64;
        while let Some(message) = rx.recv().await {
            count += 1;
            println!(
                "[{}] {}",
                message.offset(),
                String::from_utf8_lossy(message.payload())
            );
            if count % 100 == 0 {
                println!("Processed {count} messages total");
            }
        }
        count
    });

    println!("Consumer running. Press Ctrl+C to stop.");
    let quit = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let summary = consumer
        .consume_on_channel(tx, Duration::from_millis(500), quit)
        .await?;

    let printed = printer.await?;
    println!(
        "Stopped after {} messages ({printed} printed), next offset {}",
        summary.messages,
        consumer.offset()
    );
    if let Some(e) = summary.last_error {
        eprintln!("Consumer stopped on error: {e}");
    }

    Ok(())
}
