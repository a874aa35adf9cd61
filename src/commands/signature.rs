//! `signature` (spec.md §4.E.6): declaration plus wrapped documentation for
//! a resolved symbol, one section per overload.

use crate::commands::resolve::resolve_input;
use crate::commands::{Engine, hover_to_markdown, word_wrap};
use crate::hover_parser::parse_hover_markdown;
use anyhow::Result;

const WRAP_WIDTH: usize = 80;

pub async fn run(engine: &Engine, symbol: &str) -> Result<String> {
    let resolved = match resolve_input(engine, symbol).await {
        Ok(r) => r,
        Err(e) => return Ok(format!("{e}\n")),
    };

    let hover = engine.clangd.hover(&resolved.path, resolved.line, resolved.character).await?;
    let Some(hover) = hover else {
        return Ok("no hover information available\n".to_string());
    };

    let markdown = hover_to_markdown(hover);
    let sections = split_overloads(&markdown);
    let mut output = String::new();
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            output.push('\n');
        }
        let doc = parse_hover_markdown(section);
        if let Some(template_params) = &doc.template_params {
            output.push_str(template_params);
            output.push('\n');
        }
        if let Some(signature) = &doc.signature {
            output.push_str(signature);
            output.push('\n');
        }
        output.push('\n');
        if let Some(description) = &doc.description {
            output.push_str(&word_wrap(description, WRAP_WIDTH, ""));
            output.push('\n');
        }
    }

    Ok(output)
}

/// Split hover markdown that contains multiple fenced declarations
/// (overloads) into one section per declaration. Each section spans from
/// its opening fence to just before the next declaration's opening fence,
/// so trailing `→`/`Parameters:`/doc lines stay attached to the overload
/// they describe.
fn split_overloads(markdown: &str) -> Vec<String> {
    let lines: Vec<&str> = markdown.lines().collect();
    let fence_indices: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.trim_start().starts_with("```"))
        .map(|(i, _)| i)
        .collect();

    if fence_indices.len() < 4 {
        return vec![markdown.to_string()];
    }

    let opens: Vec<usize> = fence_indices.iter().step_by(2).copied().collect();
    let mut sections = Vec::new();
    for (idx, &open) in opens.iter().enumerate() {
        let next_open = opens.get(idx + 1).copied().unwrap_or(lines.len());
        let start = if idx == 0 { 0 } else { open };
        sections.push(lines[start..next_open].join("\n"));
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_declaration_is_not_split() {
        let markdown = "```cpp\nvoid Foo()\n```\n\nDoes a thing.";
        assert_eq!(split_overloads(markdown).len(), 1);
    }

    #[test]
    fn two_declarations_split_into_two_sections() {
        let markdown = "```cpp\nvoid Foo(int)\n```\n→ `void`\n\n```cpp\nvoid Foo(int, int)\n```\n→ `void`";
        let sections = split_overloads(markdown);
        assert_eq!(sections.len(), 2);
        assert!(sections[0].contains("Foo(int)"));
        assert!(sections[1].contains("Foo(int, int)"));
    }
}
