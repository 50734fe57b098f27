//! Link-annotation rendering: splits a reply into text and link nodes.
//!
//! Assistant replies may embed `[label](url)` tokens. This is the only
//! markup the widget understands; everything else is plain text. The
//! scanner walks the input once, left to right, and covers every byte of
//! the input with no gaps or overlaps. Labels cannot contain `]`, urls
//! cannot contain `)`, and anything malformed stays literal text.

/// One rendered piece of a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageNode {
    Text(String),
    Link { label: String, url: String },
}

impl MessageNode {
    /// A link url beginning with `/` is an in-app navigable route.
    pub fn is_internal_link(&self) -> bool {
        matches!(self, MessageNode::Link { url, .. } if url.starts_with('/'))
    }
}

/// Parse a reply string into an ordered node sequence.
///
/// Zero matches yields a single text node equal to the input.
pub fn parse_markup(text: &str) -> Vec<MessageNode> {
    let bytes = text.as_bytes();
    let mut nodes = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'[' {
            if let Some((label, url, end)) = match_link(text, i) {
                if plain_start < i {
                    nodes.push(MessageNode::Text(text[plain_start..i].to_string()));
                }
                nodes.push(MessageNode::Link { label, url });
                plain_start = end;
                i = end;
                continue;
            }
        }
        i += 1;
    }

    if plain_start < text.len() || nodes.is_empty() {
        nodes.push(MessageNode::Text(text[plain_start..].to_string()));
    }
    nodes
}

/// Try to match `[label](url)` with the `[` at byte offset `start`.
///
/// Returns the label, the url, and the byte offset just past the closing
/// `)`. The delimiters are ASCII, so byte offsets always sit on UTF-8
/// boundaries even with Arabic labels.
fn match_link(text: &str, start: usize) -> Option<(String, String, usize)> {
    let bytes = text.as_bytes();

    let label_start = start + 1;
    let mut i = label_start;
    while i < bytes.len() && bytes[i] != b']' {
        i += 1;
    }
    if i >= bytes.len() || i == label_start {
        return None;
    }
    let label_end = i;

    if i + 1 >= bytes.len() || bytes[i + 1] != b'(' {
        return None;
    }
    let url_start = i + 2;
    let mut j = url_start;
    while j < bytes.len() && bytes[j] != b')' {
        j += 1;
    }
    if j >= bytes.len() || j == url_start {
        return None;
    }

    Some((
        text[label_start..label_end].to_string(),
        text[url_start..j].to_string(),
        j + 1,
    ))
}
