//! Parse clangd's markdown hover text into a [`ParsedDocumentation`]
//! (spec.md §4.F).
//!
//! clangd's hover markdown is not a stable, documented format; it is
//! whatever the current clangd version happens to emit for a given symbol
//! kind. Grounded on the teacher's `response_parser.rs`, which treats every
//! clangd response shape as something to degrade out of gracefully rather
//! than something to validate strictly — the same philosophy applies here:
//! every field is optional, and a line we don't recognize is skipped rather
//! than treated as a parse error.

use crate::types::{AccessLevel, ParsedDocumentation};

/// Parse one hover markdown blob (the `value` of a `MarkupContent` with
/// `kind: "markdown"`) into a best-effort structured record.
pub fn parse_hover_markdown(markdown: &str) -> ParsedDocumentation {
    let mut doc = ParsedDocumentation::default();
    let mut description_lines = Vec::new();
    let mut in_code_block = false;
    let mut code_block_lines: Vec<String> = Vec::new();

    let lines: Vec<&str> = markdown.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim_end();

        if line.trim_start().starts_with("```") {
            if in_code_block {
                // Closing fence: pull the access level (if any) and
                // signature out of the collected block.
                if doc.signature.is_none() && !code_block_lines.is_empty() {
                    let (access, signature) = extract_signature_and_access(&code_block_lines);
                    if doc.access_level.is_none() {
                        doc.access_level = access;
                    }
                    doc.signature = signature;
                }
                code_block_lines.clear();
            }
            in_code_block = !in_code_block;
            i += 1;
            continue;
        }
        if in_code_block {
            code_block_lines.push(line.to_string());
            i += 1;
            continue;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("→ ") {
            doc.return_type = Some(strip_backticks(rest.trim()));
            i += 1;
            continue;
        }
        if let Some(rest) = strip_labeled(trimmed, "Type:") {
            doc.r#type = Some(rest);
            i += 1;
            continue;
        }
        if strip_labeled(trimmed, "Parameters:").is_some() {
            // Subsequent lines beginning with `-` are parameter entries,
            // collected until a non-dash non-empty line (spec.md §4.F
            // step 2). Blank lines in between don't terminate the block.
            let mut params = Vec::new();
            i += 1;
            while i < lines.len() {
                let next = lines[i].trim();
                if next.is_empty() {
                    i += 1;
                } else if next.starts_with('-') {
                    params.push(next.to_string());
                    i += 1;
                } else {
                    break;
                }
            }
            doc.parameters_text = Some(params.join("\n"));
            continue;
        }
        if let Some(rest) = strip_labeled(trimmed, "Default:") {
            doc.default_value = Some(rest);
            i += 1;
            continue;
        }
        if let Some(rest) = strip_labeled(trimmed, "Size:") {
            doc.modifiers.push(format!("size: {rest}"));
            i += 1;
            continue;
        }
        if let Some(rest) = strip_labeled(trimmed, "Offset:") {
            doc.modifiers.push(format!("offset: {rest}"));
            i += 1;
            continue;
        }
        if let Some(rest) = strip_labeled(trimmed, "Alignment:") {
            doc.modifiers.push(format!("alignment: {rest}"));
            i += 1;
            continue;
        }
        if trimmed.starts_with("// In ") {
            doc.inheritance = Some(trimmed.trim_start_matches("// ").to_string());
            i += 1;
            continue;
        }

        description_lines.push(trimmed.to_string());
        i += 1;
    }

    if !description_lines.is_empty() {
        doc.description = Some(description_lines.join(" "));
    }

    if let Some(signature) = &doc.signature {
        doc.modifiers.extend(extract_modifiers(signature));
        if let Some((template_params, rest)) = extract_template_params(signature) {
            doc.template_params = Some(template_params);
            doc.signature = Some(rest);
        }
    }

    doc
}

fn strip_labeled(line: &str, label: &str) -> Option<String> {
    line.strip_prefix(label).map(|rest| rest.trim().to_string())
}

/// Strip a single pair of surrounding backticks, if present (spec.md §4.F
/// step 2: "`→ T` → the return type (strip backticks)").
fn strip_backticks(s: &str) -> String {
    s.strip_prefix('`').and_then(|s| s.strip_suffix('`')).unwrap_or(s).to_string()
}

/// Pull the access level and signature out of a fenced code block's lines,
/// per spec.md §4.F step 1:
///
/// - a line exactly `public:`/`private:`/`protected:` records the access
///   level; the signature is the next non-comment, non-blank line (joined
///   with the following line if it starts with `template <…>`).
/// - a line beginning with `public: `/`private: `/`protected: ` records the
///   access level and takes the remainder of that line as the signature.
/// - otherwise the first non-comment, non-blank line is the signature.
fn extract_signature_and_access(lines: &[String]) -> (Option<AccessLevel>, Option<String>) {
    let mut idx = skip_comments_and_blanks(lines, 0);
    if idx >= lines.len() {
        return (None, None);
    }

    let trimmed = lines[idx].trim();
    if let Some(access) = exact_access_specifier(trimmed) {
        idx = skip_comments_and_blanks(lines, idx + 1);
        if idx >= lines.len() {
            return (Some(access), None);
        }
        return (Some(access), Some(join_signature(lines, idx)));
    }
    if let Some((access, rest)) = prefixed_access_specifier(trimmed) {
        return (Some(access), Some(join_signature_from(rest, lines, idx)));
    }

    (None, Some(join_signature(lines, idx)))
}

fn skip_comments_and_blanks(lines: &[String], mut idx: usize) -> usize {
    while idx < lines.len() {
        let trimmed = lines[idx].trim();
        if trimmed.is_empty() || is_comment_line(trimmed) {
            idx += 1;
        } else {
            break;
        }
    }
    idx
}

fn is_comment_line(line: &str) -> bool {
    line.starts_with("//") || line.starts_with("/*") || line.starts_with('*') || line.starts_with("*/")
}

fn exact_access_specifier(line: &str) -> Option<AccessLevel> {
    match line {
        "public:" => Some(AccessLevel::Public),
        "private:" => Some(AccessLevel::Private),
        "protected:" => Some(AccessLevel::Protected),
        _ => None,
    }
}

fn prefixed_access_specifier(line: &str) -> Option<(AccessLevel, &str)> {
    for (prefix, level) in [
        ("public: ", AccessLevel::Public),
        ("private: ", AccessLevel::Private),
        ("protected: ", AccessLevel::Protected),
    ] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Some((level, rest));
        }
    }
    None
}

fn join_signature(lines: &[String], idx: usize) -> String {
    join_signature_from(lines[idx].trim(), lines, idx)
}

/// Build the signature starting from `first`, joining in the following line
/// when `first` is a `template <…>` header (spec.md §4.F step 1).
fn join_signature_from(first: &str, lines: &[String], idx: usize) -> String {
    let mut signature = first.to_string();
    if first.trim_start().starts_with("template") {
        if let Some(next) = lines.get(idx + 1) {
            signature.push(' ');
            signature.push_str(next.trim());
        }
    }
    normalize_signature(&signature)
}

/// Normalize `&`/`*` spacing in a C++ declaration so the marker binds to the
/// type on its left (`T& x`, `T* x`), never the variable on its right
/// (`T &x`, `T *x`) — clangd renders this inconsistently across overloads.
fn normalize_signature(signature: &str) -> String {
    let mut normalized = String::with_capacity(signature.len());
    let mut chars = signature.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '&' || c == '*' {
            while normalized.ends_with(' ') {
                normalized.pop();
            }
            normalized.push(c);
            while chars.peek() == Some(&' ') {
                chars.next();
            }
            if chars.peek().is_some() {
                normalized.push(' ');
            }
        } else {
            normalized.push(c);
        }
    }
    normalized.trim().to_string()
}

/// Pull qualifiers out of a normalized signature: `virtual`, `static`,
/// `override`, `inline`, `explicit`, `noexcept` as whole words anywhere in
/// the signature; `const` only after the closing `)`; `= 0`/`= delete`/
/// `= default` (spec.md §4.F step 3).
fn extract_modifiers(signature: &str) -> Vec<String> {
    let mut modifiers = Vec::new();
    let after_paren = signature.rsplit_once(')').map(|(_, rest)| rest).unwrap_or("");

    if after_paren.split_whitespace().any(|tok| tok == "const") {
        modifiers.push("const".to_string());
    }

    for keyword in ["virtual", "static", "override", "inline", "explicit", "noexcept"] {
        if signature.split_whitespace().any(|tok| tok == keyword) {
            modifiers.push(keyword.to_string());
        }
    }

    if let Some((_, rhs)) = signature.rsplit_once('=') {
        let rhs = rhs.trim().trim_end_matches(';').trim();
        match rhs {
            "0" => modifiers.push("pure virtual".to_string()),
            "delete" => modifiers.push("deleted".to_string()),
            "default" => modifiers.push("defaulted".to_string()),
            _ => {}
        }
    }

    modifiers
}

/// If `signature` begins with a `template <...>` clause, split it into the
/// clause (with its `template` keyword, e.g. `template <typename T>`) and
/// the remaining signature with that prefix stripped (spec.md §4.F step 4:
/// "capture the bracketed text into `template_params` and strip it from the
/// signature").
fn extract_template_params(signature: &str) -> Option<(String, String)> {
    let trimmed = signature.trim_start();
    let after_keyword = trimmed.strip_prefix("template")?;
    let start = after_keyword.find('<')?;
    if !after_keyword[..start].trim().is_empty() {
        return None;
    }
    let mut depth = 0usize;
    for (i, c) in after_keyword[start..].char_indices() {
        match c {
            '<' => depth += 1,
            '>' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + i + 1;
                    let clause = format!("template {}", after_keyword[start..end].trim());
                    let rest = after_keyword[end..].trim_start().to_string();
                    return Some((clause, rest));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_access_level_and_return_type() {
        let markdown = "```cpp\npublic:\nint GetValue() const\n```\n→ `int`\n\nReturns the cached value.";
        let doc = parse_hover_markdown(markdown);
        assert_eq!(doc.access_level, Some(AccessLevel::Public));
        assert_eq!(doc.signature.as_deref(), Some("int GetValue() const"));
        assert_eq!(doc.return_type.as_deref(), Some("int"));
        assert_eq!(doc.description.as_deref(), Some("Returns the cached value."));
    }

    #[test]
    fn parses_prefixed_access_specifier() {
        let markdown = "```cpp\nprivate: int count_\n```";
        let doc = parse_hover_markdown(markdown);
        assert_eq!(doc.access_level, Some(AccessLevel::Private));
        assert_eq!(doc.signature.as_deref(), Some("int count_"));
    }

    #[test]
    fn normalizes_reference_spacing() {
        assert_eq!(normalize_signature("int&  x"), "int& x");
        assert_eq!(normalize_signature("int &x"), "int& x");
        assert_eq!(normalize_signature("const int * p"), "const int* p");
    }

    #[test]
    fn extracts_pure_virtual_and_const() {
        let modifiers = extract_modifiers("virtual void draw() const = 0");
        assert!(modifiers.contains(&"const".to_string()));
        assert!(modifiers.contains(&"pure virtual".to_string()));
    }

    #[test]
    fn extracts_template_params() {
        let (clause, rest) = extract_template_params("template <typename T, int N> class Array").unwrap();
        assert_eq!(clause, "template <typename T, int N>");
        assert_eq!(rest, "class Array");
    }

    #[test]
    fn strips_template_clause_from_parsed_signature() {
        let markdown = "```cpp\ntemplate <typename T>\nstd::optional<std::shared_ptr<T>> GetComponent() const\n```";
        let doc = parse_hover_markdown(markdown);
        assert_eq!(doc.template_params.as_deref(), Some("template <typename T>"));
        assert_eq!(doc.signature.as_deref(), Some("std::optional<std::shared_ptr<T>> GetComponent() const"));
    }

    #[test]
    fn parses_parameters_and_type_lines() {
        let markdown = "Type: `std::vector<int>`\n\nParameters:\n- `int x`\n- `int y`";
        let doc = parse_hover_markdown(markdown);
        assert_eq!(doc.r#type.as_deref(), Some("`std::vector<int>`"));
        assert_eq!(doc.parameters_text.as_deref(), Some("- `int x`\n- `int y`"));
    }

    #[test]
    fn parameters_stop_at_first_non_dash_line() {
        let markdown = "Parameters:\n- `int x`\n- `int y`\n\nDoes a thing.";
        let doc = parse_hover_markdown(markdown);
        assert_eq!(doc.parameters_text.as_deref(), Some("- `int x`\n- `int y`"));
        assert_eq!(doc.description.as_deref(), Some("Does a thing."));
    }

    #[test]
    fn strips_backticks_from_return_type() {
        assert_eq!(strip_backticks("`int`"), "int");
        assert_eq!(strip_backticks("int"), "int");
    }
}
