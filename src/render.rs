//! Per-variant text rendering: block content → styled terminal rows.
//!
//! The height model derives every block's row count from its source line
//! count, so rendering here is strictly line-preserving: exactly one output
//! row per content row, styling applied in place. Markdown is styled per
//! line rather than reflowed for the same reason.

use crossterm::style::Stylize;

use crate::block::{Block, TextKind};

pub struct TextRenderer {
    language: String,
}

impl TextRenderer {
    pub fn new(language: impl Into<String>) -> Self {
        Self { language: language.into() }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Render a block's body. Returns `height() - 3` rows for padded blocks
    /// (padding supplies the remaining decorative rows) and `height()` rows
    /// for blanks.
    pub fn lines(&self, block: &Block) -> Vec<String> {
        match block {
            Block::Blank(n) => vec![String::new(); *n as usize],
            Block::Text { kind: TextKind::Markdown, lines, .. } => {
                lines.iter().map(|l| style_markdown_line(l)).collect()
            }
            Block::Text { kind: TextKind::Code, lines, .. } => {
                lines.iter().map(|l| self.style_code_line(l)).collect()
            }
            // Plain output and pre-colored tracebacks pass through.
            Block::Text { lines, .. } => lines.clone(),
            // Blank canvas the deferred Kitty draw lands on.
            Block::Image(img) => vec![String::new(); (img.rows + 2) as usize],
        }
    }

    fn style_code_line(&self, line: &str) -> String {
        let kws = keywords(&self.language);
        let mut out = String::with_capacity(line.len() + 16);
        let mut word = String::new();
        for ch in line.chars() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
            } else {
                flush_word(&mut out, &mut word, kws);
                out.push(ch);
            }
        }
        flush_word(&mut out, &mut word, kws);
        out
    }
}

fn flush_word(out: &mut String, word: &mut String, kws: &[&str]) {
    if word.is_empty() {
        return;
    }
    if kws.contains(&word.as_str()) {
        out.push_str(&format!("{}", word.as_str().magenta()));
    } else {
        out.push_str(word);
    }
    word.clear();
}

fn keywords(language: &str) -> &'static [&'static str] {
    match language {
        "python" => &[
            "def", "class", "return", "if", "elif", "else", "for", "while", "import", "from",
            "as", "with", "try", "except", "finally", "raise", "lambda", "yield", "pass", "break",
            "continue", "in", "not", "and", "or", "is", "None", "True", "False", "assert",
            "global", "del", "async", "await",
        ],
        "julia" => &[
            "function", "end", "if", "elseif", "else", "for", "while", "return", "begin", "using",
            "import", "struct", "mutable", "macro", "quote", "let", "try", "catch", "finally",
            "true", "false", "nothing",
        ],
        "r" | "R" => &[
            "function", "if", "else", "for", "while", "repeat", "return", "library", "TRUE",
            "FALSE", "NULL", "NA", "in", "next", "break",
        ],
        _ => &[],
    }
}

fn style_markdown_line(line: &str) -> String {
    let trimmed = line.trim_start();
    if trimmed.starts_with('#') {
        format!("{}", line.bold().cyan())
    } else if trimmed.starts_with("```") {
        format!("{}", line.dark_grey())
    } else if trimmed.starts_with("> ") {
        format!("{}", line.italic())
    } else if trimmed.starts_with("- ") || trimmed.starts_with("* ") {
        format!("{}", line.yellow())
    } else {
        line.to_string()
    }
}
