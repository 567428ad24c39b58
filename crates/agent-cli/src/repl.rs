//! Interactive loop
//!
//! One turn at a time: read a line, run it through the driver while printing
//! text as it streams in, carry the returned history into the next turn.

use std::future::Future;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use agent_core::{Driver, History, TurnEvent, TurnOutcome, TurnStatus};

/// Print streamed output until the turn drops its sender
async fn print_events(mut events: mpsc::Receiver<TurnEvent>) {
    let mut stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        match event {
            TurnEvent::Text(fragment) => {
                print!("{fragment}");
                let _ = stdout.flush();
            }
            TurnEvent::ToolCall { id, name, arguments } => {
                tracing::info!(%id, %name, ?arguments, "tool call");
            }
            TurnEvent::ToolResult { id, name, is_error } => {
                tracing::info!(%id, %name, is_error, "tool result");
            }
            TurnEvent::Error(message) => {
                println!("\n\nError: {message}");
            }
        }
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Run one turn unless `interrupt` fires first. An interrupted turn is
/// dropped before it commits, so the caller keeps its history.
async fn run_interruptible(
    driver: &Driver,
    input: &str,
    history: &History,
    events: &mpsc::Sender<TurnEvent>,
    interrupt: impl Future<Output = ()>,
) -> Option<TurnOutcome> {
    tokio::select! {
        outcome = driver.run_turn(input, history.clone(), events) => Some(outcome),
        () = interrupt => None,
    }
}

pub async fn run(driver: &Driver) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history = History::new();
    let mut turns = 0usize;

    loop {
        if turns > 0 {
            println!("\n");
        }
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = ctrl_c() => {
                tracing::info!("interrupted by user");
                println!("\nProgram interrupted by user.");
                return Ok(());
            }
        };
        let Some(line) = line else {
            tracing::info!("end of input");
            return Ok(());
        };
        let input = line.trim();
        tracing::info!(input, "user input");

        if input.eq_ignore_ascii_case("exit") {
            tracing::info!("user requested exit");
            return Ok(());
        }
        if input.is_empty() {
            continue;
        }

        print!("\nAgent: ");
        std::io::stdout().flush()?;

        let (tx, rx) = mpsc::channel(64);
        let printer = tokio::spawn(print_events(rx));
        let outcome = run_interruptible(driver, input, &history, &tx, ctrl_c()).await;
        drop(tx);
        let _ = printer.await;

        let Some(outcome) = outcome else {
            tracing::info!("turn interrupted by user");
            println!("\n\nInterrupted.");
            turns += 1;
            continue;
        };

        match &outcome.status {
            TurnStatus::Completed => {
                tracing::info!(
                    response_len = outcome.output.len(),
                    history = outcome.history.len(),
                    "turn committed"
                );
            }
            TurnStatus::Failed(e) => tracing::error!(error = %e, "turn failed"),
            TurnStatus::TimedOut => tracing::error!("timeout while waiting for agent response"),
        }
        history = outcome.history;
        turns += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use agent_core::{
        DriverConfig, GraphRun, Message, MessagePart, ModelGraph, Node, Result, ToolRegistry,
        ToolReturn,
    };
    use async_trait::async_trait;

    /// Answers after `delay` with a single text node.
    struct SlowGraph {
        delay: Duration,
    }

    struct SlowRun {
        delay: Duration,
        answered: bool,
    }

    #[async_trait]
    impl ModelGraph for SlowGraph {
        async fn start(&self, _history: &[Message], _prompt: &str) -> Result<Box<dyn GraphRun>> {
            Ok(Box::new(SlowRun {
                delay: self.delay,
                answered: false,
            }))
        }
    }

    #[async_trait]
    impl GraphRun for SlowRun {
        async fn next_node(&mut self) -> Result<Node> {
            if self.answered {
                return Ok(Node::End {
                    output: String::new(),
                });
            }
            tokio::time::sleep(self.delay).await;
            self.answered = true;
            Ok(Node::CallTools {
                parts: vec![MessagePart::text("hello")],
            })
        }

        fn resume(&mut self, _returns: Vec<ToolReturn>) {}
    }

    fn driver(delay: Duration) -> Driver {
        Driver::new(
            Arc::new(SlowGraph { delay }),
            Arc::new(ToolRegistry::new()),
            DriverConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_interrupt_drops_the_turn() {
        let driver = driver(Duration::from_secs(30));
        let history = History::with_system_prompt("prompt");
        let (tx, _rx) = mpsc::channel(8);

        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            run_interruptible(
                &driver,
                "hi",
                &history,
                &tx,
                tokio::time::sleep(Duration::from_millis(50)),
            ),
        )
        .await
        .expect("interrupt should end the turn");

        assert!(outcome.is_none());
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_turn_completes_without_interrupt() {
        let driver = driver(Duration::from_millis(1));
        let history = History::new();
        let (tx, _rx) = mpsc::channel(8);

        let outcome = run_interruptible(&driver, "hi", &history, &tx, std::future::pending())
            .await
            .unwrap();

        assert!(outcome.is_committed());
        assert_eq!(outcome.output, "hello");
    }
}
