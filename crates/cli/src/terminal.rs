#![forbid(unsafe_code)]

use async_trait::async_trait;
use sp_engine::{NoticeLevel, PromptRequest, RenderAdapter, RenderInstruction, TextPrompt};
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Stdin shared by the command loop and the text prompt. Whoever reads holds
/// the lock only for one line.
pub(crate) type SharedLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

pub(crate) fn stdin_lines() -> SharedLines {
    Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()))
}

pub(crate) const CANCEL: &str = "/cancel";

/// Prints every instruction as one line.
pub(crate) struct TerminalRenderer;

impl RenderAdapter for TerminalRenderer {
    fn apply(&self, instruction: RenderInstruction) {
        println!("{}", describe(&instruction));
    }
}

pub(crate) fn describe(instruction: &RenderInstruction) -> String {
    match instruction {
        RenderInstruction::AddNode {
            id,
            label,
            position,
            style,
        } => format!(
            "+ node {id} {label:?} at ({:.0}, {:.0}) {} {:.1}",
            position.x, position.y, style.color, style.opacity
        ),
        RenderInstruction::AddEdge { id, source, target } => {
            format!("+ edge {id} {source} -> {target}")
        }
        RenderInstruction::UpdateStyle {
            id,
            opacity,
            highlighted,
        } => {
            let mark = if *highlighted { " *" } else { "" };
            format!("~ style {id} {opacity:.1}{mark}")
        }
        RenderInstruction::UpdateLabel { id, text } => format!("~ label {id} {text:?}"),
        RenderInstruction::UpdatePosition { id, position } => {
            format!("~ move {id} ({:.0}, {:.0})", position.x, position.y)
        }
        RenderInstruction::Notice { level, message } => {
            let level = match level {
                NoticeLevel::Info => "info",
                NoticeLevel::Warning => "warning",
                NoticeLevel::Error => "error",
            };
            format!("! {level}: {message}")
        }
    }
}

/// Reads the answer from the next stdin line.
///
/// An empty line keeps the pre-filled text, `/cancel` or end of input cancels.
pub(crate) struct StdinPrompt {
    lines: SharedLines,
}

impl StdinPrompt {
    pub(crate) fn new(lines: SharedLines) -> Self {
        Self { lines }
    }
}

pub(crate) fn interpret(answer: &str, initial: &str) -> Option<String> {
    let answer = answer.trim();
    if answer == CANCEL {
        return None;
    }
    if answer.is_empty() {
        return (!initial.is_empty()).then(|| initial.to_string());
    }
    Some(answer.to_string())
}

#[async_trait]
impl TextPrompt for StdinPrompt {
    async fn ask(&self, request: PromptRequest) -> Option<String> {
        if request.initial.is_empty() {
            print!("{} [{}]: ", request.title, request.node);
        } else {
            print!("{} [{}] ({}): ", request.title, request.node, request.initial);
        }
        let _ = std::io::stdout().flush();

        let line = self.lines.lock().await.next_line().await;
        match line {
            Ok(Some(answer)) => interpret(&answer, &request.initial),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "prompt input failed");
                None
            }
        }
    }
}
