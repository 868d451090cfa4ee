//! Notebook loader: `.ipynb` JSON → a flat sequence of source blocks.
//!
//! Cells and their outputs are flattened into distinct units in document
//! order; the viewport engine never needs to know which output belonged to
//! which cell. Mime payloads in notebook JSON come as either a single string
//! or a list of line strings — both forms are accepted everywhere.

use std::collections::BTreeMap;
use std::fs;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unrecognized cell output type `{0}`")]
    UnrecognizedOutput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Code,
    Markdown,
}

/// One flattened unit of notebook content, before any rendering decisions.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceBlock {
    Cell { kind: CellKind, source: Vec<String> },
    Stream { text: Vec<String> },
    ErrorOutput { traceback: Vec<String> },
    DisplayData { png: Option<String> },
    ExecuteResult {
        png: Option<String>,
        json: Option<String>,
        text: Option<Vec<String>>,
    },
}

impl SourceBlock {
    /// Cheap comparison key over the block's source content. The reconciler
    /// uses this, never rendered output.
    pub fn fingerprint(&self) -> u64 {
        match self {
            SourceBlock::Cell { source, .. } => hash_str(&source.concat()),
            SourceBlock::Stream { text } => hash_str(&text.concat()),
            SourceBlock::ErrorOutput { traceback } => hash_str(&traceback.concat()),
            SourceBlock::DisplayData { png: Some(p) } => hash_str(p),
            SourceBlock::DisplayData { png: None } => 0,
            SourceBlock::ExecuteResult { png: Some(p), .. } => hash_str(p),
            SourceBlock::ExecuteResult { json: Some(j), .. } => hash_str(j),
            SourceBlock::ExecuteResult { text: Some(t), .. } => hash_str(&t.concat()),
            SourceBlock::ExecuteResult { .. } => 0,
        }
    }
}

fn hash_str(s: &str) -> u64 {
    let mut h = DefaultHasher::new();
    s.hash(&mut h);
    h.finish()
}

#[derive(Debug)]
pub struct Notebook {
    pub blocks: Vec<SourceBlock>,
    /// Kernel language, used for code styling.
    pub language: String,
}

// ---------------------------------------------------------------------------
// Raw JSON shape
// ---------------------------------------------------------------------------

/// Notebook JSON stores multi-line text as either one string or a list of
/// line strings (each keeping its trailing newline).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lines {
    One(String),
    Many(Vec<String>),
}

impl Default for Lines {
    fn default() -> Self {
        Lines::Many(Vec::new())
    }
}

impl Lines {
    fn into_lines(self) -> Vec<String> {
        match self {
            Lines::One(s) => s.split_inclusive('\n').map(str::to_string).collect(),
            Lines::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawNotebook {
    #[serde(default)]
    cells: Vec<RawCell>,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawCell {
    cell_type: String,
    #[serde(default)]
    source: Lines,
    #[serde(default)]
    outputs: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    output_type: String,
    #[serde(default)]
    text: Option<Lines>,
    #[serde(default)]
    traceback: Option<Vec<String>>,
    #[serde(default)]
    data: Option<BTreeMap<String, serde_json::Value>>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

pub fn load(path: &Path) -> Result<Notebook, NotebookError> {
    let text = fs::read_to_string(path).map_err(|source| NotebookError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

pub fn parse(text: &str) -> Result<Notebook, NotebookError> {
    let raw: RawNotebook = serde_json::from_str(text)?;

    let language = raw
        .metadata
        .pointer("/kernelspec/language")
        .and_then(|v| v.as_str())
        .unwrap_or("python")
        .to_string();

    let mut blocks = Vec::new();
    for cell in raw.cells {
        let kind = if cell.cell_type == "markdown" {
            CellKind::Markdown
        } else {
            CellKind::Code
        };
        blocks.push(SourceBlock::Cell {
            kind,
            source: cell.source.into_lines(),
        });
        for output in cell.outputs {
            blocks.push(convert_output(output)?);
        }
    }

    Ok(Notebook { blocks, language })
}

fn convert_output(output: RawOutput) -> Result<SourceBlock, NotebookError> {
    match output.output_type.as_str() {
        "stream" => Ok(SourceBlock::Stream {
            text: output.text.unwrap_or_default().into_lines(),
        }),
        "error" => Ok(SourceBlock::ErrorOutput {
            traceback: output.traceback.unwrap_or_default(),
        }),
        "display_data" => Ok(SourceBlock::DisplayData {
            png: mime_string(output.data.as_ref(), "image/png"),
        }),
        "execute_result" => Ok(SourceBlock::ExecuteResult {
            png: mime_string(output.data.as_ref(), "image/png"),
            json: output
                .data
                .as_ref()
                .and_then(|d| d.get("application/json"))
                .map(|v| v.to_string()),
            text: mime_lines(output.data.as_ref(), "text/plain"),
        }),
        other => Err(NotebookError::UnrecognizedOutput(other.to_string())),
    }
}

fn mime_lines(
    data: Option<&BTreeMap<String, serde_json::Value>>,
    key: &str,
) -> Option<Vec<String>> {
    let value = data?.get(key)?.clone();
    serde_json::from_value::<Lines>(value).ok().map(Lines::into_lines)
}

fn mime_string(data: Option<&BTreeMap<String, serde_json::Value>>, key: &str) -> Option<String> {
    mime_lines(data, key).map(|lines| lines.concat())
}
