//! MIME structure: a tagged part tree built from raw messages, and the
//! attachment enumerator that walks it.

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Encoding, Message, MessageParser, MessagePart, MimeHeaders, PartType};
use tracing::warn;

use crate::error::{RelayError, Result};
use crate::model::attachment::AttachmentPart;
use crate::model::message::MessageSummary;

/// Maximum nesting of multiparts and embedded messages that is walked.
/// Deeper parts are kept as opaque leaves.
const MAX_DEPTH: usize = 10;

/// One node of a message's MIME tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MimeNode {
    /// `multipart/*`, or an embedded `message/rfc822` whose parts are walked.
    Container {
        content_type: String,
        children: Vec<MimeNode>,
    },
    /// Leaf with a `Content-Disposition` header.
    Disposed {
        content_type: String,
        filename: Option<String>,
        body: Vec<u8>,
    },
    /// Leaf without a disposition (message bodies, inline alternatives).
    Plain { content_type: String },
}

impl MimeNode {
    /// `true` for `Container` nodes.
    pub fn is_container(&self) -> bool {
        matches!(self, MimeNode::Container { .. })
    }

    /// Content type of this node.
    pub fn content_type(&self) -> &str {
        match self {
            MimeNode::Container { content_type, .. }
            | MimeNode::Disposed { content_type, .. }
            | MimeNode::Plain { content_type } => content_type,
        }
    }
}

/// A raw message reduced to what the relay needs.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub summary: MessageSummary,
    pub tree: MimeNode,
}

/// Parse a complete raw message (headers + body) into its MIME tree.
pub fn parse_message(raw_message: &[u8]) -> Result<ParsedMessage> {
    let message_bytes = skip_from_line(raw_message);

    let parser = MessageParser::default();
    let msg = parser
        .parse(message_bytes)
        .ok_or_else(|| RelayError::Mime("message has no parseable headers".into()))?;

    let summary = MessageSummary {
        from: msg
            .from()
            .and_then(|addrs| addrs.first())
            .map(|addr| match addr.name() {
                Some(name) => format!("{} <{}>", name, addr.address().unwrap_or_default()),
                None => addr.address().unwrap_or_default().to_string(),
            })
            .unwrap_or_default(),
        subject: msg.subject().unwrap_or_default().to_string(),
    };
    let tree = build_node(&msg, msg.root_part(), 0);

    Ok(ParsedMessage { summary, tree })
}

/// Parse `raw_message` and enumerate its attachments in one step.
pub fn list_attachments(raw_message: &[u8]) -> Result<Vec<AttachmentPart>> {
    Ok(enumerate(parse_message(raw_message)?.tree).collect())
}

/// Enumerate the attachment parts of a message tree.
///
/// The walk is depth-first in document order and consumes the tree. A tree
/// whose root is not a container yields nothing, even if the single part
/// carries a filename.
pub fn enumerate(tree: MimeNode) -> Attachments {
    let stack = match tree {
        MimeNode::Container { children, .. } => vec![children.into_iter()],
        _ => Vec::new(),
    };
    Attachments { stack }
}

/// Lazy iterator returned by [`enumerate`].
#[derive(Debug)]
pub struct Attachments {
    stack: Vec<std::vec::IntoIter<MimeNode>>,
}

impl Iterator for Attachments {
    type Item = AttachmentPart;

    fn next(&mut self) -> Option<AttachmentPart> {
        while let Some(level) = self.stack.last_mut() {
            match level.next() {
                None => {
                    self.stack.pop();
                }
                Some(MimeNode::Container { children, .. }) => {
                    self.stack.push(children.into_iter());
                }
                Some(MimeNode::Disposed {
                    content_type,
                    filename: Some(filename),
                    body,
                }) => {
                    return Some(AttachmentPart {
                        filename,
                        content_type,
                        bytes: body,
                    });
                }
                Some(_) => {}
            }
        }
        None
    }
}

fn build_node(msg: &Message<'_>, part: &MessagePart<'_>, depth: usize) -> MimeNode {
    let content_type = content_type_of(part);

    match &part.body {
        PartType::Multipart(ids) => {
            if depth >= MAX_DEPTH {
                warn!(content_type = %content_type, "MIME nesting too deep, not descending");
                return MimeNode::Plain { content_type };
            }
            let children = ids
                .iter()
                .filter_map(|&id| msg.part(id))
                .map(|child| build_node(msg, child, depth + 1))
                .collect();
            MimeNode::Container {
                content_type,
                children,
            }
        }
        PartType::Message(inner) => {
            if depth >= MAX_DEPTH {
                warn!(content_type = %content_type, "MIME nesting too deep, not descending");
                return MimeNode::Plain { content_type };
            }
            MimeNode::Container {
                content_type,
                children: vec![build_node(inner, inner.root_part(), depth + 1)],
            }
        }
        _ if part.content_disposition().is_some() => MimeNode::Disposed {
            content_type,
            filename: part.attachment_name().map(String::from),
            body: transfer_decoded(msg, part),
        },
        _ => MimeNode::Plain { content_type },
    }
}

/// Body bytes with only the Content-Transfer-Encoding undone.
///
/// mail-parser converts text parts to UTF-8 using their charset, so their
/// bytes are taken from the raw message instead. Binary parts are already
/// exactly the decoded bytes.
fn transfer_decoded(msg: &Message<'_>, part: &MessagePart<'_>) -> Vec<u8> {
    if !matches!(part.body, PartType::Text(_) | PartType::Html(_)) {
        return part.contents().to_vec();
    }

    let Some(raw) = msg
        .raw_message
        .get(part.raw_body_offset()..part.raw_end_offset())
    else {
        return part.contents().to_vec();
    };

    let decoded = match part.encoding {
        Encoding::Base64 => base64_decode(raw),
        Encoding::QuotedPrintable => quoted_printable_decode(raw),
        Encoding::None => Some(raw.to_vec()),
    };
    decoded.unwrap_or_else(|| {
        warn!(
            filename = part.attachment_name().unwrap_or_default(),
            "Cannot undo transfer encoding, using parsed contents"
        );
        part.contents().to_vec()
    })
}

fn content_type_of(part: &MessagePart<'_>) -> String {
    part.content_type()
        .map(|ct: &mail_parser::ContentType| {
            let main = ct.ctype();
            match ct.subtype() {
                Some(sub) => format!("{main}/{sub}").to_ascii_lowercase(),
                None => main.to_ascii_lowercase(),
            }
        })
        .unwrap_or_else(|| "text/plain".to_string())
}

/// Skip a leading BOM and an mbox `From ` envelope line, if present.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(name: Option<&str>, body: &[u8]) -> MimeNode {
        MimeNode::Disposed {
            content_type: "text/csv".into(),
            filename: name.map(String::from),
            body: body.to_vec(),
        }
    }

    fn plain() -> MimeNode {
        MimeNode::Plain {
            content_type: "text/plain".into(),
        }
    }

    fn container(children: Vec<MimeNode>) -> MimeNode {
        MimeNode::Container {
            content_type: "multipart/mixed".into(),
            children,
        }
    }

    fn names(tree: MimeNode) -> Vec<String> {
        enumerate(tree).map(|a| a.filename).collect()
    }

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        assert_eq!(skip_from_line(data), data);
    }

    #[test]
    fn test_enumerate_non_container_root_is_empty() {
        assert!(names(leaf(Some("a_KEY.csv"), b"x")).is_empty());
        assert!(names(plain()).is_empty());
    }

    #[test]
    fn test_enumerate_depth_first_document_order() {
        let tree = container(vec![
            plain(),
            leaf(Some("first.csv"), b"1"),
            container(vec![leaf(Some("nested.csv"), b"2"), plain()]),
            leaf(Some("last.csv"), b"3"),
        ]);
        assert_eq!(names(tree), vec!["first.csv", "nested.csv", "last.csv"]);
    }

    #[test]
    fn test_enumerate_skips_disposed_without_filename() {
        let tree = container(vec![leaf(None, b"x"), leaf(Some("named.pdf"), b"y")]);
        assert_eq!(names(tree), vec!["named.pdf"]);
    }

    #[test]
    fn test_enumerate_carries_bytes() {
        let tree = container(vec![leaf(Some("a.csv"), b"col1,col2\n")]);
        let parts: Vec<_> = enumerate(tree).collect();
        assert_eq!(parts[0].bytes, b"col1,col2\n");
        assert_eq!(parts[0].content_type, "text/csv");
        assert_eq!(parts[0].size(), 10);
    }

    #[test]
    fn test_parse_multipart_with_attachment() {
        let raw = b"From: Alice <alice@example.com>\r\n\
Subject: Daily report\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--b1\r\n\
Content-Type: text/csv; name=\"sales_KEY_1.csv\"\r\n\
Content-Disposition: attachment; filename=\"sales_KEY_1.csv\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
YSxiCjEsMgo=\r\n\
--b1--\r\n";
        let parsed = parse_message(raw).unwrap();
        assert!(parsed.tree.is_container());
        assert_eq!(parsed.summary.subject, "Daily report");
        assert!(parsed.summary.from.contains("alice@example.com"));

        let parts: Vec<_> = enumerate(parsed.tree).collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].filename, "sales_KEY_1.csv");
        assert_eq!(parts[0].bytes, b"a,b\n1,2\n");
    }

    #[test]
    fn test_parse_single_part_message_has_no_attachments() {
        let raw = b"From: bob@example.com\r\n\
Subject: Inline file\r\n\
Content-Type: text/csv; name=\"x_KEY.csv\"\r\n\
Content-Disposition: attachment; filename=\"x_KEY.csv\"\r\n\
\r\n\
a,b\r\n";
        let parsed = parse_message(raw).unwrap();
        assert!(!parsed.tree.is_container());
        assert_eq!(enumerate(parsed.tree).count(), 0);
    }

    #[test]
    fn test_text_attachment_keeps_original_bytes() {
        let raw = b"From: carol@example.com\r\n\
Subject: Legacy exports\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/csv; charset=iso-8859-1; name=\"latin_KEY.csv\"\r\n\
Content-Disposition: attachment; filename=\"latin_KEY.csv\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
Y2Fm6Q==\r\n\
--b1\r\n\
Content-Type: text/plain; name=\"raw_KEY.txt\"\r\n\
Content-Disposition: attachment; filename=\"raw_KEY.txt\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
//4AAQ==\r\n\
--b1\r\n\
Content-Type: text/plain; charset=iso-8859-1; name=\"qp_KEY.txt\"\r\n\
Content-Disposition: attachment; filename=\"qp_KEY.txt\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
na=EFve\r\n\
--b1--\r\n";
        let parts = list_attachments(raw).unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].bytes, [b'c', b'a', b'f', 0xE9]);
        assert_eq!(parts[1].bytes, [0xFF, 0xFE, 0x00, 0x01]);
        assert_eq!(parts[2].bytes, [b'n', b'a', 0xEF, b'v', b'e']);
    }
}
