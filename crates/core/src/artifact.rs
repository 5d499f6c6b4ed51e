//! Opaque job output references.

use serde::{Deserialize, Serialize};

/// The output of a completed job, or the input to an edit.
///
/// The orchestrator never looks inside an artifact. Both variants are
/// handed to the provider verbatim when an artifact feeds the next job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Artifact {
    /// A location the provider (or anyone) can fetch the content from.
    Url(String),
    /// Already-encoded content, e.g. a `data:` URL or a base64 payload.
    Inline(String),
}

impl Artifact {
    /// The raw string carried by either variant.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Url(s) | Self::Inline(s) => s,
        }
    }

    /// Classify a caller-supplied reference: `http(s)://` is a URL,
    /// anything else is treated as inline content.
    pub fn from_reference(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::Url(reference)
        } else {
            Self::Inline(reference)
        }
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            // Inline payloads can be megabytes; only show their size.
            Self::Inline(data) => write!(f, "<inline {} bytes>", data.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_reference_detects_urls() {
        assert_eq!(
            Artifact::from_reference("https://cdn.example/a.jpg"),
            Artifact::Url("https://cdn.example/a.jpg".into())
        );
        assert_eq!(
            Artifact::from_reference("data:image/png;base64,AAAA"),
            Artifact::Inline("data:image/png;base64,AAAA".into())
        );
    }

    #[test]
    fn display_hides_inline_payload() {
        let inline = Artifact::Inline("x".repeat(2048));
        assert_eq!(inline.to_string(), "<inline 2048 bytes>");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(Artifact::Url("u".into())).unwrap();
        assert_eq!(json["kind"], "url");
        assert_eq!(json["value"], "u");
    }
}
