//! Ships a text line and a structured record to the ingestion endpoint.
//!
//! This example shows how to:
//! - Load shipper settings from `LOGSHIP_*` environment variables
//! - Await a delivery
//! - Fire a record in the background and collect the outcome via callback
//!
//! Run with: `LOGSHIP_TOKEN=<token> cargo run --example ship_log`

use logship::{Error, Shipper, ShipperConfig};
use serde::Serialize;
use tokio::sync::oneshot;

#[derive(Debug, Serialize)]
struct Deployment {
    service: &'static str,
    version: &'static str,
    healthy: bool,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("logship=debug,ship_log=info")
        .init();

    let config = ShipperConfig::from_env()?;
    let shipper = Shipper::from_config(config)?;

    // Plain text, awaited
    match shipper.ship("ship_log example started", &["example"]).await {
        Ok(delivery) => {
            println!("Text delivered");
            println!("  Attempts: {}", delivery.attempts);
            println!("  Latency: {:?}", delivery.latency);
            println!("  Response: {}", delivery.raw_body);
        }
        Err(Error::Validation(message)) => {
            println!("Not sent: {}", message);
            println!("  Set LOGSHIP_TOKEN to ship for real.");
            return Ok(());
        }
        Err(e) => println!("Delivery failed: {}", e),
    }

    // Structured record, reported through a callback
    let deployment = Deployment {
        service: "api",
        version: "1.4.2",
        healthy: true,
    };
    let record = logship::LogMessage::record(&deployment)?;

    let (tx, rx) = oneshot::channel();
    shipper.send_with(record, &["deploy"], move |outcome| {
        let _ = tx.send(outcome);
    });

    match rx.await {
        Ok(Ok(delivery)) => println!("Record delivered after {} attempt(s)", delivery.attempts),
        Ok(Err(e)) => println!("Record failed: {}", e),
        Err(_) => println!("Delivery task ended without reporting"),
    }

    Ok(())
}
