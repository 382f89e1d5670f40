//! Parses Jupyter notebooks (nbformat 4) and renders them to Markdown in the
//! same shape `jupyter nbconvert --to markdown` produces: markdown cells
//! verbatim, code cells fenced, outputs indented or inlined depending on their
//! MIME type.

use serde::Deserialize;
use std::collections::BTreeMap;

/// A notebook document. Only the parts needed for rendering are modeled.
#[derive(Deserialize, Debug)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,

    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Deserialize, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    pub kernelspec: Option<KernelSpec>,

    #[serde(default)]
    pub language_info: Option<LanguageInfo>,
}

#[derive(Deserialize, Debug)]
pub struct KernelSpec {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct LanguageInfo {
    pub name: String,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Markdown {
        source: Text,
    },
    Code {
        source: Text,
        #[serde(default)]
        outputs: Vec<Output>,
    },
    Raw {
        source: Text,
    },
}

#[derive(Deserialize, Debug)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        text: Text,
    },
    ExecuteResult {
        #[serde(default)]
        data: BTreeMap<String, serde_json::Value>,
    },
    DisplayData {
        #[serde(default)]
        data: BTreeMap<String, serde_json::Value>,
    },
    Error {
        ename: String,
        evalue: String,
    },
}

/// Notebook text fields are either a single string or a list of lines.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Text {
    One(String),
    Lines(Vec<String>),
}

impl Text {
    pub fn joined(&self) -> String {
        match self {
            Text::One(s) => s.clone(),
            Text::Lines(lines) => lines.concat(),
        }
    }
}

impl Notebook {
    /// Parses a notebook from its JSON source.
    pub fn from_str(input: &str) -> serde_json::Result<Notebook> {
        serde_json::from_str(input)
    }

    /// The language used to annotate fenced code cells. Falls back to
    /// `python`, which is what nbconvert assumes for unlabeled notebooks.
    pub fn language(&self) -> &str {
        if let Some(info) = &self.metadata.language_info {
            return &info.name;
        }
        self.metadata
            .kernelspec
            .as_ref()
            .and_then(|k| k.language.as_deref())
            .unwrap_or("python")
    }

    /// Renders the notebook as Markdown.
    pub fn to_markdown(&self) -> String {
        let language = self.language();
        let mut blocks: Vec<String> = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            match cell {
                Cell::Markdown { source } | Cell::Raw { source } => {
                    blocks.push(source.joined().trim_end().to_owned());
                }
                Cell::Code { source, outputs } => {
                    blocks.push(format!(
                        "```{}\n{}\n```",
                        language,
                        source.joined().trim_end()
                    ));
                    blocks.extend(outputs.iter().filter_map(render_output));
                }
            }
        }
        blocks.retain(|b| !b.is_empty());
        let mut markdown = blocks.join("\n\n");
        markdown.push('\n');
        markdown
    }
}

fn render_output(output: &Output) -> Option<String> {
    match output {
        Output::Stream { text } => Some(indent(&text.joined())),
        Output::ExecuteResult { data } | Output::DisplayData { data } => render_data(data),
        Output::Error { ename, evalue } => Some(indent(&format!("{}: {}", ename, evalue))),
    }
}

// Picks the richest representation available, in the same order of
// preference nbconvert's markdown template uses.
fn render_data(data: &BTreeMap<String, serde_json::Value>) -> Option<String> {
    for mime in &["image/png", "image/jpeg"] {
        if let Some(encoded) = data.get(*mime).and_then(value_text) {
            let encoded: String = encoded.split_whitespace().collect();
            let alt = mime.trim_start_matches("image/");
            return Some(format!("![{}](data:{};base64,{})", alt, mime, encoded));
        }
    }
    if let Some(markdown) = data.get("text/markdown").and_then(value_text) {
        return Some(markdown.trim_end().to_owned());
    }
    if let Some(html) = data.get("text/html").and_then(value_text) {
        return Some(html.trim().to_owned());
    }
    data.get("text/plain")
        .and_then(value_text)
        .map(|plain| indent(&plain))
}

fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(lines) => Some(
            lines
                .iter()
                .filter_map(|line| line.as_str())
                .collect::<Vec<&str>>()
                .concat(),
        ),
        _ => None,
    }
}

fn indent(text: &str) -> String {
    text.trim_end()
        .lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<String>>()
        .join("\n")
}
