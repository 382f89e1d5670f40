//! Renders the body for folders that have no README. The template is a gtmpl
//! (Go-style) template with `.title` (the derived title) and `.name` (the raw
//! folder name) available.

use gtmpl_value::Value;
use std::collections::HashMap;

/// A folder-body template whose syntax has already been checked.
#[derive(Clone, Debug)]
pub struct FolderTemplate {
    source: String,
}

impl FolderTemplate {
    /// Checks `source` by rendering it once against placeholder values, so a
    /// broken template is reported before anything is published.
    pub fn new(source: &str) -> Result<FolderTemplate, String> {
        check_actions(source)?;
        let template = FolderTemplate {
            source: source.to_owned(),
        };
        template.render("Title", "name")?;
        Ok(template)
    }

    pub fn render(&self, title: &str, name: &str) -> Result<String, String> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(title.to_owned()));
        m.insert("name".to_owned(), Value::String(name.to_owned()));
        gtmpl::template(&self.source, Value::Object(m))
    }
}

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

// gtmpl's lexer never returns on an action that isn't closed, so actions are
// matched up before the template reaches it.
fn check_actions(source: &str) -> Result<(), String> {
    let mut rest = source;
    let mut offset = 0;
    while let Some(start) = rest.find(OPEN) {
        let action = &rest[start + OPEN.len()..];
        let end = match action.find(CLOSE) {
            Some(end) => end,
            None => {
                return Err(format!(
                    "unclosed action at byte {}: missing `{}`",
                    offset + start,
                    CLOSE
                ))
            }
        };
        if let Some(nested) = action[..end].find(OPEN) {
            return Err(format!(
                "unclosed action at byte {}: found `{}` at byte {}",
                offset + start,
                OPEN,
                offset + start + OPEN.len() + nested
            ));
        }
        if unescaped_quotes(&action[..end]) % 2 != 0 {
            return Err(format!(
                "unterminated string in action at byte {}",
                offset + start
            ));
        }
        let consumed = start + OPEN.len() + end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }
    Ok(())
}

fn unescaped_quotes(action: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in action.chars() {
        match c {
            '\\' => escaped = !escaped,
            '"' if !escaped => count += 1,
            _ => escaped = false,
        }
    }
    count
}
