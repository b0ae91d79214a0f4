//! One-shot chat and a multi-turn session.
//!
//! Run with:
//! ```bash
//! export XAI_API_KEY="your-api-key"
//! cargo run --example chat_simple
//! ```

use chatwire::options::{Config, ParameterSet};
use chatwire::Client;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get API key from environment
    let api_key =
        std::env::var("XAI_API_KEY").expect("XAI_API_KEY environment variable must be set");

    let client = Client::new(Config::new(api_key))?;

    let params = ParameterSet::new()
        .with_temperature(0.2)?
        .with_max_tokens(100)?
        .with_system_message("Answer in one word.");

    println!("Sending request...");

    match client
        .chat()
        .generate_with_options("What is the capital of France?", &params)
        .await
    {
        Ok(reply) => {
            println!("\n=== Response ===");
            println!("{}", reply.content().unwrap_or_default());

            let usage = reply.usage();
            println!("Prompt tokens: {}", usage.prompt_tokens);
            println!("Completion tokens: {}", usage.completion_tokens);
            println!("Finish reason: {:?}", reply.finish_reason());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e.into());
        }
    }

    // Session keeps its own history between sends
    println!("\n\n=== Multi-turn conversation ===");

    let mut session = client.begin_conversation();
    session.send("My name is Alice.").await?;
    let reply = session.send("What's my name?").await?;
    println!("{}", reply.content().unwrap_or_default());

    println!("\n=== History ===");
    for (i, message) in session.history().iter().enumerate() {
        println!("Message {}: {:?} {}", i + 1, message.role, message.text());
    }

    Ok(())
}
