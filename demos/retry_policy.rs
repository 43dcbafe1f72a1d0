//! Example demonstrating the retry policy and error handling.
//!
//! This example shows how to:
//! - Configure the retry budget and linear backoff
//! - Tell retried statuses from returned ones
//! - Inspect the last response once retries run out
//! - Bound each attempt with a timeout
//!
//! Run with: `cargo run --example retry_policy`

use callsign::{Client, Error, RetryPolicy};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("callsign=info,retry_policy=info")
        .init();

    let policy = RetryPolicy::new(2, Duration::from_millis(250));
    println!(
        "Backoff: {:?}, {:?} (worst case {:?})",
        policy.backoff_for(0),
        policy.backoff_for(1),
        policy.total_backoff()
    );

    let client = Client::builder()
        .base_url("https://httpbin.org")?
        .timeout(Duration::from_secs(5))
        .retry_policy(policy)
        .build()?;

    println!("\n=== 404 is returned on the first attempt ===");
    let response = client.get("/status/404").send().await?;
    println!(
        "Status {} after {} attempt(s)",
        response.status, response.attempts
    );

    println!("\n=== 503 is retried until the budget runs out ===");
    match client.get("/status/503").send().await {
        Ok(response) => println!("Recovered with {}", response.status),
        Err(Error::MaxRetriesExceeded {
            attempts,
            status,
            headers,
            ..
        }) => {
            println!("Gave up after {} attempts, last status {}", attempts, status);
            println!("Last response had {} headers", headers.len());
        }
        Err(e) => println!("Unexpected error: {}", e),
    }

    println!("\n=== A slow endpoint hits the per-attempt timeout ===");
    let result = client
        .get("/delay/3")
        .timeout(Duration::from_secs(1))
        .send()
        .await;
    match result {
        Ok(response) => println!("Answered with {}", response.status),
        Err(e) if e.is_timeout() => println!("Timed out on every attempt: {}", e),
        Err(e) => println!("Failed: {} (retryable: {})", e, e.is_retryable()),
    }

    println!("\n=== Without retries ===");
    let client = Client::builder()
        .base_url("https://httpbin.org")?
        .retry_policy(RetryPolicy::none())
        .build()?;
    match client.get("/status/500").send().await {
        Err(Error::MaxRetriesExceeded { attempts, .. }) => {
            println!("Single attempt made: {}", attempts)
        }
        other => println!("Result: {:?}", other.map(|r| r.status)),
    }

    Ok(())
}
