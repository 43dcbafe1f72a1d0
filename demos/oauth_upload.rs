//! Example demonstrating OAuth1 signing and streaming multipart uploads.
//!
//! This example shows how to:
//! - Configure OAuth1 credentials on a client
//! - Reproduce a signature with a fixed nonce and timestamp
//! - Upload fields and files without buffering the file contents
//! - Consume a response as a stream
//!
//! Run with: `cargo run --example oauth_upload`

use callsign::multipart::MultipartForm;
use callsign::oauth1::{self, Credentials};
use callsign::{Client, Error};
use futures::StreamExt;
use http::Method;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("callsign=debug,oauth_upload=info")
        .init();

    let credentials = Credentials::new("consumer-key", "consumer-secret", "token", "token-secret");

    println!("=== Deterministic signature ===");
    let header = oauth1::sign_with(
        &Method::GET,
        "https://api.example.com/photos?size=original",
        &credentials,
        "fixed-nonce",
        1_700_000_000,
    )?;
    println!("{}", header);
    println!();

    let client = Client::builder()
        .base_url("https://httpbin.org")?
        .oauth1(credentials)
        .build()?;

    println!("=== Multipart upload ===");
    let report = std::io::Cursor::new(b"id,total\n1,42\n2,17\n".to_vec());
    let form = MultipartForm::new()
        .field("title", "Weekly report")
        .file("notes", "notes.txt", "generated by callsign")
        .file_reader("report", "report.csv", report);

    let response = client.post("/post").multipart(form).send().await?;
    let echoed: serde_json::Value = response.json()?;
    println!("Status: {}", response.status);
    println!("Server saw fields: {}", echoed["form"]);
    println!("Server saw files: {}", echoed["files"]);
    println!("Signed with: {}", echoed["headers"]["Authorization"]);
    println!();

    println!("=== Streaming download ===");
    let response = client.get("/stream-bytes/32768").stream().await?;
    println!("Status: {}", response.status);
    let mut body = response.into_body();
    let mut total = 0;
    while let Some(chunk) = body.next().await {
        total += chunk?.len();
    }
    println!("Received {} bytes", total);

    Ok(())
}
