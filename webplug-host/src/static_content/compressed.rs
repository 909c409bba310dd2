//! Precompressed variant negotiation

use webplug_api::Precompressed;

/// A precompressed sibling file type, e.g. `app.js.br` next to `app.js`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressedFileType {
    Brotli,
    Gzip,
    Zstd,
}

impl CompressedFileType {
    /// Suffix appended to the asset file name
    pub fn extension(&self) -> &'static str {
        match self {
            CompressedFileType::Brotli => "br",
            CompressedFileType::Gzip => "gz",
            CompressedFileType::Zstd => "zst",
        }
    }

    /// `Content-Encoding` / `Accept-Encoding` token
    pub fn encoding(&self) -> &'static str {
        match self {
            CompressedFileType::Brotli => "br",
            CompressedFileType::Gzip => "gzip",
            CompressedFileType::Zstd => "zstd",
        }
    }
}

impl From<Precompressed> for CompressedFileType {
    fn from(kind: Precompressed) -> Self {
        match kind {
            Precompressed::Brotli => CompressedFileType::Brotli,
            Precompressed::Gzip => CompressedFileType::Gzip,
            Precompressed::Zstd => CompressedFileType::Zstd,
        }
    }
}

/// Parsed `Accept-Encoding` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptEncoding {
    accepted: Vec<String>,
    refused: Vec<String>,
    wildcard: bool,
}

impl AcceptEncoding {
    /// Nothing beyond identity is accepted
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn parse(header: &str) -> Self {
        let mut parsed = Self::default();

        for item in header.split(',') {
            let mut parts = item.split(';');
            let token = parts.next().unwrap_or("").trim().to_ascii_lowercase();
            if token.is_empty() {
                continue;
            }

            let refused = parts.any(|p| {
                let p = p.trim();
                p.strip_prefix("q=")
                    .and_then(|q| q.trim().parse::<f32>().ok())
                    .is_some_and(|q| q <= 0.0)
            });

            match (token.as_str(), refused) {
                ("*", false) => parsed.wildcard = true,
                ("*", true) => {}
                (_, true) => parsed.refused.push(token),
                (_, false) => parsed.accepted.push(token),
            }
        }

        parsed
    }

    pub fn accepts(&self, kind: CompressedFileType) -> bool {
        let token = kind.encoding();
        if self.refused.iter().any(|t| t == token) {
            return false;
        }
        self.wildcard || self.accepted.iter().any(|t| t == token)
    }
}
