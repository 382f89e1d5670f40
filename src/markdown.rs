use pulldown_cmark::escape::escape_html;
use pulldown_cmark::*;

/// Converts markdown to WordPress-friendly HTML. Tables, footnotes,
/// strikethrough and task lists are enabled; code blocks and tables carry the
/// block-editor class names so themes style them like native blocks.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(
        &mut output,
        Parser::new_ext(markdown, options).map(convert),
    );

    // The stock renderer always opens tables with a bare `<table>`; raw HTML
    // tables from notebook outputs carry attributes and are left alone.
    output.replace("<table>", r#"<table class="wp-block-table">"#)
}

// Code blocks are intercepted and re-emitted as raw HTML so the `<pre>` can
// carry classes. Text events inside the block still go through the renderer
// and are escaped as usual.
fn convert(ev: Event) -> Event {
    match ev {
        Event::Start(Tag::CodeBlock(kind)) => {
            let mut open = String::from(r#"<pre class="wp-block-code highlight"><code"#);
            if let CodeBlockKind::Fenced(lang) = kind {
                if let Some(lang) = lang.split_whitespace().next() {
                    open.push_str(r#" class="language-"#);
                    // Writing into a String can't fail.
                    let _ = escape_html(&mut open, lang);
                    open.push('"');
                }
            }
            open.push('>');
            Event::Html(CowStr::Boxed(open.into_boxed_str()))
        }
        Event::End(Tag::CodeBlock(_)) => Event::Html(CowStr::Borrowed("</code></pre>\n")),
        _ => ev,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_code_block_classes() {
        assert_eq!(
            "<pre class=\"wp-block-code highlight\"><code class=\"language-python\">\
             print(&quot;&lt;hi&gt;&quot;)\n</code></pre>\n",
            to_html("```python\nprint(\"<hi>\")\n```\n"),
        );
    }

    #[test]
    fn test_indented_code_block_has_no_language() {
        assert_eq!(
            "<p>Output:</p>\n<pre class=\"wp-block-code highlight\"><code>42\n</code></pre>\n",
            to_html("Output:\n\n    42\n"),
        );
    }

    #[test]
    fn test_table_class() {
        let html = to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.starts_with("<table class=\"wp-block-table\"><thead>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_raw_html_tables_untouched() {
        let html =
            to_html("<table border=\"1\" class=\"dataframe\"><tr><td>1</td></tr></table>\n");
        assert!(html.contains("<table border=\"1\" class=\"dataframe\">"));
        assert!(!html.contains("wp-block-table"));
    }
}
