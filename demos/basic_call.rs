//! Basic example demonstrating simple GET and POST requests.
//!
//! This example shows how to:
//! - Create a client with basic configuration
//! - Read a buffered response and decode it
//! - Send a JSON body and get decoded success or error targets
//! - Access response metadata
//!
//! Run with: `cargo run --example basic_call`

use callsign::{Client, Error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("callsign=debug,basic_call=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("User-Agent", "callsign-demo/0.1")?
        .build()?;

    println!("=== GET Request Example ===");
    let response = client.get("/posts/1").send().await?;
    let post: Post = response.json()?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== GET With Query Parameters ===");
    let response = client
        .get("/comments")
        .query_param("postId", "1")
        .send()
        .await?;
    let comments: Vec<serde_json::Value> = response.json()?;
    println!("Post 1 has {} comments", comments.len());
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let created = client
        .post("/posts")
        .json(&new_post)
        .call::<Post, serde_json::Value>()
        .await?;

    match created.success {
        Some(post) => println!("Created post with ID: {}", post.id),
        None => println!("Server said: {}", created.response.text()),
    }
    println!("Attempts: {}", created.response.attempts);

    Ok(())
}
