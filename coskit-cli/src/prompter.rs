//! Interactive consent prompts on the terminal.

use async_trait::async_trait;
use coskit_core::consent::{ConsentChoice, ConsentPrompter, PromptError, PromptRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Shows the prompt on stderr and reads the answer from stdin. End of input
/// dismisses the prompt.
pub struct TerminalPrompter;

#[async_trait]
impl ConsentPrompter for TerminalPrompter {
    async fn prompt(&self, request: &PromptRequest) -> Result<ConsentChoice, PromptError> {
        let unavailable = |err: std::io::Error| PromptError::Unavailable(err.to_string());
        let menu = render(request);
        let mut stderr = tokio::io::stderr();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            stderr.write_all(menu.as_bytes()).await.map_err(unavailable)?;
            stderr.flush().await.map_err(unavailable)?;
            let Some(answer) = lines.next_line().await.map_err(unavailable)? else {
                return Err(PromptError::Dismissed);
            };
            if let Some(choice) = parse_answer(&answer) {
                return Ok(choice);
            }
        }
    }
}

fn render(request: &PromptRequest) -> String {
    let mut menu = format!("\n{}\n", request.message());
    for (index, choice) in ConsentChoice::ALL.iter().enumerate() {
        menu.push_str(&format!("  [{}] {}\n", index + 1, choice.label()));
    }
    menu.push_str("> ");
    menu
}

/// Accepts the menu number or the choice's kebab-case name.
fn parse_answer(answer: &str) -> Option<ConsentChoice> {
    let answer = answer.trim();
    answer
        .parse::<usize>()
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| ConsentChoice::ALL.get(index).copied())
        .or_else(|| answer.to_ascii_lowercase().parse().ok())
}
