//! Chat subcommands: create-chat, send, history, connect.
//!
//! Each one talks to a running server through [`ApiClient`].

use anyhow::Result;
use console::style;
use relaychat_types::message::ChatMessage;

use crate::cli::client::ApiClient;

/// Create a chat and print its id.
pub async fn create_chat(client: &ApiClient, members: &[String], json: bool) -> Result<()> {
    let chat = client.create_chat(members).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chat)?);
        return Ok(());
    }

    println!();
    println!("  {} Chat created", style("✓").green().bold());
    println!();
    println!("  {}       {}", style("ID:").bold(), style(chat.id).cyan());
    println!("  {}  {}", style("Members:").bold(), chat.members.join(", "));
    println!();
    Ok(())
}

/// Send one message through the server's ingestion pipeline.
pub async fn send_message(
    client: &ApiClient,
    chat_id: i64,
    sender: &str,
    text: &str,
    json: bool,
) -> Result<()> {
    let message = client.send_message(chat_id, sender, text).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
        return Ok(());
    }

    println!(
        "  {} Sent message {} to chat {}",
        style("✓").green().bold(),
        style(message.id).cyan(),
        chat_id
    );
    if message.text != text {
        println!("{}", indent(&message.text));
    }
    Ok(())
}

/// Print a chat's stored messages.
pub async fn history(client: &ApiClient, chat_id: i64, json: bool) -> Result<()> {
    let messages = client.history(chat_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("  {}", style(format!("No messages in chat {chat_id}")).dim());
        return Ok(());
    }

    println!();
    for message in &messages {
        println!("{}", format_line(message));
    }
    println!();
    println!("  {}", style(format!("{} message(s)", messages.len())).dim());
    Ok(())
}

/// Print the chat's history and then its live messages until Ctrl+C or
/// until the server ends the stream.
pub async fn connect(client: &ApiClient, chat_id: i64, json: bool) -> Result<()> {
    let mut stream = client.connect(chat_id).await?;
    if !json {
        println!(
            "  {} Connected to chat {} on {}",
            style("✓").green().bold(),
            style(chat_id).cyan(),
            client.base()
        );
        println!("  {}", style("Press Ctrl+C to leave").dim());
        println!();
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            next = stream.next_message() => match next? {
                Some(message) if json => println!("{}", serde_json::to_string(&message)?),
                Some(message) => println!("{}", format_line(&message)),
                None => {
                    if !json {
                        println!("  {}", style("Stream closed by server").dim());
                    }
                    return Ok(());
                }
            },
        }
    }

    stream.close().await;
    Ok(())
}

fn format_line(message: &ChatMessage) -> String {
    format!(
        "  {} {} {}\n{}",
        style(message.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        style(format!("#{}", message.id)).dim(),
        style(&message.sender).cyan().bold(),
        indent(&message.text)
    )
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiline_text_is_indented() {
        assert_eq!(indent("one\ntwo"), "    one\n    two");
    }

    #[test]
    fn history_line_contains_sender_and_text() {
        console::set_colors_enabled(false);
        let message = ChatMessage {
            id: 3,
            chat_id: 1,
            sender: "alice".to_string(),
            text: "hello".to_string(),
            created_at: chrono::Utc::now(),
        };
        let line = format_line(&message);
        assert!(line.contains("#3"));
        assert!(line.contains("alice"));
        assert!(line.ends_with("    hello"));
    }
}
