//! Markdown to plain-text rendering for search.
//!
//! Block elements (paragraphs, lists, tables, code blocks) become blank-line
//! separated blocks; list items and table rows stay on their own lines inside
//! their block. A heading opens the block that follows it, so it is scored
//! together with its body. Markup is dropped.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

pub fn render_plain_text(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(markdown, options);

    let mut blocks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut list_depth = 0usize;
    let mut after_heading = false;

    for event in parser {
        match event {
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak | Event::HardBreak => current.push('\n'),
            Event::Start(Tag::List(_)) => {
                if list_depth == 0 && !after_heading {
                    flush(&mut blocks, &mut current);
                }
                list_depth += 1;
            }
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 {
                    flush(&mut blocks, &mut current);
                    after_heading = false;
                }
            }
            Event::Start(Tag::Item) => line_break(&mut current),
            Event::End(TagEnd::TableCell) => current.push_str(" | "),
            Event::End(TagEnd::TableHead) | Event::End(TagEnd::TableRow) => {
                let trimmed_len = current.trim_end_matches(" | ").len();
                current.truncate(trimmed_len);
                current.push('\n');
            }
            Event::End(TagEnd::Heading(_)) => {
                line_break(&mut current);
                if list_depth == 0 {
                    after_heading = true;
                }
            }
            Event::End(TagEnd::Paragraph)
            | Event::End(TagEnd::CodeBlock)
            | Event::End(TagEnd::Table) => {
                if list_depth > 0 {
                    line_break(&mut current);
                } else {
                    flush(&mut blocks, &mut current);
                    after_heading = false;
                }
            }
            Event::Rule => {
                flush(&mut blocks, &mut current);
                after_heading = false;
            }
            _ => {}
        }
    }
    flush(&mut blocks, &mut current);
    blocks.join("\n\n")
}

fn line_break(current: &mut String) {
    if !current.is_empty() && !current.ends_with('\n') {
        current.push('\n');
    }
}

fn flush(blocks: &mut Vec<String>, current: &mut String) {
    let block = current.trim();
    if !block.is_empty() {
        blocks.push(block.to_string());
    }
    current.clear();
}
