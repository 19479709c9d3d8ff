//! Markdown-lite renderer for chat message content.
//!
//! The assistant emits a small dialect: `##`/`###`/`####` headings, `- `
//! bullets, `N. ` numbered items, `**bold**`/`*italic*` spans, fenced code
//! blocks, and `---`/`***` rules. This is a pure line scanner; no network,
//! no allocation beyond the output blocks.

/// Inline span within a non-code line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Text(String),
    Bold(String),
    Italic(String),
}

/// One block-level element of rendered output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, spans: Vec<Span> },
    Paragraph(Vec<Span>),
    Bullet(Vec<Span>),
    Numbered { number: String, spans: Vec<Span> },
    Code(String),
    Rule,
    Spacer,
}

/// Scan `content` into blocks. Fences open/close on a line whose trimmed
/// content is exactly three backticks; an unterminated trailing fence still
/// flushes whatever was buffered. Consecutive blank lines collapse to a
/// single spacer.
pub fn render(content: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut in_code = false;
    let mut code_buf: Vec<&str> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if trimmed == "```" {
            if in_code {
                blocks.push(Block::Code(code_buf.join("\n")));
                code_buf.clear();
            }
            in_code = !in_code;
            continue;
        }

        if in_code {
            code_buf.push(line);
            continue;
        }

        if trimmed.is_empty() {
            // Collapse runs of blank lines to one spacer.
            if !matches!(blocks.last(), Some(Block::Spacer)) {
                blocks.push(Block::Spacer);
            }
            continue;
        }

        if trimmed == "---" || trimmed == "***" {
            blocks.push(Block::Rule);
        } else if let Some(rest) = trimmed.strip_prefix("#### ") {
            blocks.push(Block::Heading { level: 3, spans: spans(rest) });
        } else if let Some(rest) = trimmed.strip_prefix("### ") {
            blocks.push(Block::Heading { level: 2, spans: spans(rest) });
        } else if let Some(rest) = trimmed.strip_prefix("## ") {
            blocks.push(Block::Heading { level: 1, spans: spans(rest) });
        } else if let Some(rest) = trimmed.strip_prefix("- ") {
            blocks.push(Block::Bullet(spans(rest)));
        } else if let Some((number, rest)) = split_numbered(trimmed) {
            blocks.push(Block::Numbered { number, spans: spans(rest) });
        } else {
            blocks.push(Block::Paragraph(spans(trimmed)));
        }
    }

    // Unterminated fence at end of input.
    if in_code && !code_buf.is_empty() {
        blocks.push(Block::Code(code_buf.join("\n")));
    }

    blocks
}

/// Match `^\d+\.\s+rest`, capturing the number token and the remainder.
fn split_numbered(line: &str) -> Option<(String, &str)> {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = line[digits.len()..].strip_prefix('.')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((digits, rest.trim_start()))
}

/// Split a line into text/bold/italic spans. Bold is checked before italic
/// so `**` is never half-consumed as two italics; unmatched asterisks pass
/// through as literal text.
pub fn spans(line: &str) -> Vec<Span> {
    let mut out = Vec::new();
    let mut rest = line;

    while let Some((before, inner, after)) = split_delimited(rest, "**") {
        push_italics(&mut out, before);
        out.push(Span::Bold(inner.to_string()));
        rest = after;
    }
    push_italics(&mut out, rest);
    out
}

/// Italic pass over a bold-free segment.
fn push_italics(out: &mut Vec<Span>, segment: &str) {
    let mut rest = segment;
    while let Some((before, inner, after)) = split_delimited(rest, "*") {
        push_text(out, before);
        out.push(Span::Italic(inner.to_string()));
        rest = after;
    }
    push_text(out, rest);
}

fn push_text(out: &mut Vec<Span>, text: &str) {
    if !text.is_empty() {
        out.push(Span::Text(text.to_string()));
    }
}

/// Find the first `<delim>inner<delim>` with a non-empty inner, returning
/// (before, inner, after). None when no complete pair exists.
fn split_delimited<'a>(s: &'a str, delim: &str) -> Option<(&'a str, &'a str, &'a str)> {
    let mut search_from = 0;
    loop {
        let open = search_from + s[search_from..].find(delim)?;
        let inner_start = open + delim.len();
        match s[inner_start..].find(delim) {
            Some(0) => {
                // Empty pair (e.g. "**" seen by the italic pass) — treat the
                // first delimiter as literal and keep scanning.
                search_from = inner_start;
            }
            Some(close) => {
                let inner_end = inner_start + close;
                return Some((
                    &s[..open],
                    &s[inner_start..inner_end],
                    &s[inner_end + delim.len()..],
                ));
            }
            None => return None,
        }
    }
}
