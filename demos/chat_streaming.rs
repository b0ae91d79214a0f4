//! Streaming chat: chunks are printed as they arrive.
//!
//! Run with:
//! ```bash
//! export XAI_API_KEY="your-api-key"
//! cargo run --example chat_streaming
//! ```

use std::io::Write;
use std::time::Duration;

use chatwire::options::{Config, ParameterSet};
use chatwire::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get API key from environment
    let api_key =
        std::env::var("XAI_API_KEY").expect("XAI_API_KEY environment variable must be set");

    // A stalled stream gives up after this long between reads
    let config = Config::new(api_key).with_timeout(Duration::from_secs(60));
    let client = Client::new(config)?;

    let params = ParameterSet::new().with_temperature(0.9)?.with_max_tokens(256)?;

    println!("Streaming response...\n");
    print!("Response: ");

    let summary = client
        .chat()
        .stream_chat_with_options("Write a haiku about Rust programming.", &params, |chunk| {
            if let Some(text) = chunk.stream_content() {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
        })
        .await?;

    println!("\n\n=== Stream finished ===");
    println!("Chunks: {}", summary.chunks);
    println!("Finish reason: {:?}", summary.finish_reason);

    Ok(())
}
