//! Send one page image to a vision model and print the JSON it returns.
//!
//! Usage: `cargo run -p openai-client --example vision -- page.png`

use openai_client::{ChatRequest, ContentPart, Message, OpenAIClient, ResponseFormat};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: vision <page.png>")?;
    let png = std::fs::read(&path)?;

    let client = OpenAIClient::from_env()?;

    let response = client
        .chat_completion(
            ChatRequest::new("gpt-4o")
                .message(Message::user_parts(vec![
                    ContentPart::text(
                        "Return a JSON object {\"extracted_data\": [...]} with one entry per table row on this page.",
                    ),
                    ContentPart::image_png(&png),
                ]))
                .temperature(0.05)
                .token_limit(4000)
                .response_format(ResponseFormat::json_object()),
        )
        .await?;

    println!("{}", response.content);
    if let Some(usage) = response.usage {
        println!("tokens: {} prompt / {} completion", usage.prompt_tokens, usage.completion_tokens);
    }

    Ok(())
}
