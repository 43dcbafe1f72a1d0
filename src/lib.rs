//! # Callsign - signed, retrying HTTP request execution
//!
//! Callsign turns a request description into HTTP attempts: it joins the path
//! onto a base URL, merges query parameters, signs the request with OAuth1 when
//! credentials are configured, layers headers, encodes the body and retries
//! transient failures with a linear backoff.
//!
//! ## Quick Start
//!
//! ```no_run
//! use callsign::{Client, RetryPolicy};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), callsign::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .timeout(Duration::from_secs(30))
//!         .retry_policy(RetryPolicy::new(3, Duration::from_millis(500)))
//!         .build()?;
//!
//!     // Buffered: the body is read to the end
//!     let response = client.get("/users/123").send().await?;
//!     let user: User = response.json()?;
//!     println!("User: {} ({:?}, {} attempts)", user.name, response.latency, response.attempts);
//!
//!     // Decoded: success and error bodies land in separate targets
//!     let created = client
//!         .post("/users")
//!         .json(&CreateUser {
//!             name: "Alice".to_string(),
//!             email: "alice@example.com".to_string(),
//!         })
//!         .call::<User, serde_json::Value>()
//!         .await?;
//!     match (created.success, created.error) {
//!         (Some(user), _) => println!("Created user with ID: {}", user.id),
//!         (_, Some(error)) => eprintln!("Rejected: {}", error),
//!         _ => eprintln!("Unexpected body: {}", created.response.text()),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Timeouts, DNS failures, 429 and every status of 500 or above are retried.
//! The n-th retry waits `backoff * n`. Other errors and statuses are returned
//! at once. When the last attempt still gets a retryable status the call fails
//! with [`Error::MaxRetriesExceeded`], which keeps that response's status,
//! headers and body.
//!
//! ## Uploads
//!
//! Multipart bodies are encoded on a separate task while the transport sends
//! them, so file contents are never buffered whole:
//!
//! ```no_run
//! use callsign::{Client, multipart::MultipartForm};
//!
//! # async fn example() -> Result<(), callsign::Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! let file = tokio::fs::File::open("report.csv").await.expect("open report");
//! let form = MultipartForm::new()
//!     .field("title", "Q3 report")
//!     .file_reader("upload", "report.csv", file);
//!
//! let response = client.post("/uploads").multipart(form).send().await?;
//! println!("Uploaded: {}", response.status);
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod multipart;
pub mod oauth1;
pub mod request;
mod response;
pub mod retry;
pub mod transport;

pub use client::{Client, ClientBuilder, RequestBuilder};
pub use error::{Error, Result};
pub use oauth1::Credentials;
pub use request::{ContentType, RequestBody, RequestSpec};
pub use response::{Decoded, Response, StreamingResponse};
pub use retry::RetryPolicy;
