use anyhow::Result;
use rag_chain::{QaResponse, RetrievalQa};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const PROMPT: &str =
    "\n AI | Ask me anything based on documents | to quit ('exit' or 'quit') : ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Terminated,
}

/// What a line of user input asks the loop to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopAction {
    Exit,
    Skip,
    Ask(String),
}

/// Classify one line of input.
///
/// The line is trimmed before matching, so `"  quit  "` exits as well as
/// `"QUIT"`. Anything else containing `exit` or `quit` is a question.
pub fn classify_input(line: &str) -> LoopAction {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        LoopAction::Skip
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        LoopAction::Exit
    } else {
        LoopAction::Ask(trimmed.to_string())
    }
}

/// Line-oriented question/answer loop over any async reader and writer
pub struct Repl<R, W> {
    reader: R,
    writer: W,
    show_sources: bool,
    state: LoopState,
}

impl<R, W> Repl<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, show_sources: bool) -> Self {
        Self {
            reader,
            writer,
            show_sources,
            state: LoopState::AwaitingInput,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn into_writer(self) -> W {
        self.writer
    }

    /// Run until the user quits or input ends. Returns the number of
    /// questions asked. Query failures are printed and the loop continues;
    /// only I/O errors on the handles end it early.
    pub async fn run(&mut self, qa: &RetrievalQa) -> Result<usize> {
        let mut asked = 0;
        let mut line = String::new();

        while self.state == LoopState::AwaitingInput {
            self.write(PROMPT).await?;

            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;
            if bytes_read == 0 {
                // stdin closed
                self.write("\n").await?;
                self.state = LoopState::Terminated;
                break;
            }

            match classify_input(&line) {
                LoopAction::Exit => {
                    tracing::info!("Exit requested");
                    self.state = LoopState::Terminated;
                }
                LoopAction::Skip => {}
                LoopAction::Ask(question) => {
                    asked += 1;
                    tracing::debug!("Question: {}", question);

                    match qa.invoke(&question).await {
                        Ok(response) => self.write_answer(&response).await?,
                        Err(e) => {
                            tracing::error!("Query failed: {:#}", e);
                            self.write(&format!("Error: {:#}\n", e)).await?;
                        }
                    }
                }
            }
        }

        Ok(asked)
    }

    async fn write_answer(&mut self, response: &QaResponse) -> Result<()> {
        self.write(&format!("\nAnswer: {}\n", response.result)).await?;

        if self.show_sources && !response.source_documents.is_empty() {
            let mut sources = String::from("\nSources:\n");
            for (rank, retrieved) in response.source_documents.iter().enumerate() {
                sources.push_str(&format!(
                    "  [{}] {} (chunk {}, score {:.3})\n",
                    rank + 1,
                    retrieved.chunk.metadata.source,
                    retrieved.chunk.metadata.chunk_index,
                    retrieved.score
                ));
            }
            self.write(&sources).await?;
        }

        Ok(())
    }

    async fn write(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_words_any_case() {
        for input in ["exit", "quit", "QUIT", "Exit", "  quit  \n", "eXiT\r\n"] {
            assert_eq!(classify_input(input), LoopAction::Exit, "{:?}", input);
        }
    }

    #[test]
    fn test_blank_input_is_skipped() {
        assert_eq!(classify_input(""), LoopAction::Skip);
        assert_eq!(classify_input("   \t\n"), LoopAction::Skip);
    }

    #[test]
    fn test_questions_are_trimmed() {
        assert_eq!(
            classify_input("  What is the leave policy?\n"),
            LoopAction::Ask("What is the leave policy?".to_string())
        );
    }

    #[test]
    fn test_exit_must_be_the_whole_line() {
        assert_eq!(
            classify_input("how do I exit the building"),
            LoopAction::Ask("how do I exit the building".to_string())
        );
        assert_eq!(
            classify_input("quit!"),
            LoopAction::Ask("quit!".to_string())
        );
    }
}
