//! Terminal front-end for the conversational pricing advisor.

use std::io::{self, Write};
use std::time::Duration;

use parcelwise_agent::{ConversationEngine, ConversationResponse};
use parcelwise_core::config::LoadOptions;
use parcelwise_core::context::ConversationContext;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::commands::{load_config, runtime, CommandResult, EXIT_BOOKING_CLIENT, EXIT_IO};

const PROMPT: &str = "💬 You: ";
const THINKING_FRAMES: [&str; 4] = ["🤔", "💭", "🧠", "⚡"];

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match load_config("chat", options) {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let engine = match ConversationEngine::from_config(&config) {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "booking_client",
                format!("failed to create conversation engine: {error:#}"),
                EXIT_BOOKING_CLIENT,
            );
        }
    };
    let runtime = match runtime("chat") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let mut stdout = io::stdout();
    let outcome = print_banner(&mut stdout, &engine).and_then(|()| {
        runtime.block_on(converse(&engine, BufReader::new(tokio::io::stdin()), &mut stdout, true))
    });

    match outcome {
        Ok(()) => CommandResult::report(""),
        Err(error) => CommandResult::failure(
            "chat",
            "io",
            format!("❌ Error reading input: {error}"),
            EXIT_IO,
        ),
    }
}

fn print_banner(out: &mut impl Write, engine: &ConversationEngine) -> io::Result<()> {
    writeln!(out, "🗣️  Conversational Pricing Advisor")?;
    writeln!(out, "==================================\n")?;
    if !engine.ai_available() {
        writeln!(out, "⚠️  AI replies unavailable, using rule-based answers.")?;
    }
    writeln!(out, "Chat with our pricing advisor to find the best pricing for your needs!")?;
    writeln!(out, "Type 'quit' to exit, 'help' for examples.\n")
}

/// Reads one message per line until `quit`, `exit` or end of input.
pub async fn converse<R>(
    engine: &ConversationEngine,
    input: R,
    out: &mut impl Write,
    show_thinking: bool,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut context = ConversationContext::new();

    write!(out, "{PROMPT}")?;
    out.flush()?;
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        match text {
            "quit" | "exit" => {
                writeln!(out, "👋 Goodbye!")?;
                return Ok(());
            }
            "help" => print_help(out)?,
            "" => {}
            _ => {
                let response = if show_thinking {
                    with_thinking_ticker(engine.process_message(text, &mut context)).await
                } else {
                    engine.process_message(text, &mut context).await
                };
                print_response(out, &response)?;
            }
        }
        write!(out, "{PROMPT}")?;
        out.flush()?;
    }
    writeln!(out)?;
    Ok(())
}

async fn with_thinking_ticker<F>(work: F) -> ConversationResponse
where
    F: std::future::Future<Output = ConversationResponse>,
{
    let (done_tx, mut done_rx) = watch::channel(false);
    let ticker = tokio::spawn(async move {
        let mut stdout = io::stdout();
        let mut frame = 0;
        loop {
            let _ = write!(stdout, "\r🤖 Thinking {}", THINKING_FRAMES[frame % THINKING_FRAMES.len()]);
            let _ = stdout.flush();
            frame += 1;
            tokio::select! {
                _ = done_rx.changed() => break,
                _ = tokio::time::sleep(Duration::from_millis(300)) => {}
            }
        }
        let _ = write!(stdout, "\r\x1b[K");
        let _ = stdout.flush();
    });

    let response = work.await;
    let _ = done_tx.send(true);
    let _ = ticker.await;
    response
}

fn print_response(out: &mut impl Write, response: &ConversationResponse) -> io::Result<()> {
    writeln!(out, "🤖 Advisor: {}", strip_markdown(&response.message))?;

    if !response.recommendations.is_empty() {
        writeln!(out, "\n📊 Pricing Recommendations:")?;
        for recommendation in &response.recommendations {
            if recommendation.eligible {
                writeln!(
                    out,
                    "  ✅ {}: ${:.2} savings ({:.1}%)",
                    recommendation.name, recommendation.savings, recommendation.savings_percent
                )?;
            } else {
                writeln!(
                    out,
                    "  ❌ {}: {}",
                    recommendation.name,
                    recommendation.reason.as_deref().unwrap_or_default()
                )?;
            }
        }
    }

    if !response.next_questions.is_empty() {
        writeln!(out, "\n💡 Next Steps:")?;
        for (index, question) in response.next_questions.iter().enumerate() {
            writeln!(out, "  {}. {question}", index + 1)?;
        }
    }
    writeln!(out)
}

fn print_help(out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\n📚 Conversational Pricing Advisor Help")?;
    writeln!(out, "=====================================\n")?;
    writeln!(out, "💬 Example Conversations:\n")?;
    writeln!(out, "  'I need 3 deliveries to different locations'")?;
    writeln!(out, "  'What's the best pricing for a gold customer?'")?;
    writeln!(out, "  'How can I save money on my deliveries?'")?;
    writeln!(out, "  'Show me bulk order discounts'")?;
    writeln!(out, "  'I'm a bronze tier customer with 2 orders per month'")?;
    writeln!(out, "  'I want to create an order'\n")?;
    writeln!(out, "🎯 Available Pricing Models:")?;
    writeln!(out, "  • Standard Pricing: No discounts")?;
    writeln!(out, "  • Multi-Delivery: 15% off for 2+ deliveries")?;
    writeln!(out, "  • Volume Discount: 20% off for 5+ deliveries + 3+ orders/month")?;
    writeln!(out, "  • Loyalty Discount: 10% off for gold tier customers")?;
    writeln!(out, "  • Bulk Order: 25% off for 10+ deliveries + bulk flag\n")
}

/// Drops emphasis, code ticks and heading markers for plain terminal output.
pub fn strip_markdown(text: &str) -> String {
    let plain = text.replace("**", "").replace('*', "").replace('`', "");
    plain
        .lines()
        .map(|line| line.trim_start_matches('#').trim())
        .collect::<Vec<_>>()
        .join("\n")
}
