//! Extracts plain-text excerpts from markdown post bodies. Rendering the
//! body itself is the renderer's job; the excerpt only needs the text.

use pulldown_cmark::{Event, Options, Parser, TagEnd};

/// The marker appended to a truncated excerpt.
const ELLIPSIS: char = '…';

/// Returns the text of `markdown` with formatting stripped and whitespace
/// collapsed, pruned to at most `prune_length` characters. Pruning happens
/// on a word boundary and appends an ellipsis, so the result may be a little
/// shorter than `prune_length`.
pub fn excerpt(markdown: &str, prune_length: usize) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut text = String::new();
    for ev in Parser::new_ext(markdown, options) {
        match ev {
            Event::Text(s) | Event::Code(s) => text.push_str(&s),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableCell,
            ) => text.push(' '),
            _ => {}
        }
    }

    prune(&text.split_whitespace().collect::<Vec<_>>().join(" "), prune_length)
}

fn prune(text: &str, prune_length: usize) -> String {
    if text.chars().count() <= prune_length {
        return text.to_owned();
    }

    // Leave room for the ellipsis.
    let limit = prune_length.saturating_sub(1);
    let cut = text
        .char_indices()
        .nth(limit)
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let head = &text[..cut];

    // If the cut landed mid-word, back up to the previous word boundary.
    let head = match text[cut..].starts_with(' ') {
        true => head,
        false => match head.rfind(' ') {
            Some(i) => &head[..i],
            None => head,
        },
    };

    let mut pruned = head.trim_end().to_owned();
    pruned.push(ELLIPSIS);
    pruned
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_excerpt_strips_formatting() {
        assert_eq!(
            "Hello world Some emphasis and code.",
            excerpt("# Hello world\n\nSome *emphasis* and `code`.", 280)
        );
    }

    #[test]
    fn test_excerpt_keeps_link_text() {
        assert_eq!(
            "See the docs and a picture.",
            excerpt("See [the docs](https://example.org) and ![a picture](x.png).", 280)
        );
    }

    #[test]
    fn test_excerpt_prunes_on_word_boundary() {
        assert_eq!("one two…", excerpt("one two three four", 10));
    }

    #[test]
    fn test_excerpt_exact_length_is_not_pruned() {
        assert_eq!("one two", excerpt("one two", 7));
    }

    #[test]
    fn test_excerpt_single_long_word() {
        assert_eq!("abcd…", excerpt("abcdefghij", 5));
    }

    #[test]
    fn test_excerpt_multibyte() {
        assert_eq!("héllo…", excerpt("héllo wörld", 8));
    }
}
