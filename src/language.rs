// src/language.rs - Language identities and grammar scopes

use std::path::Path;

/// Grammar scope of Go source, the default formatting target.
pub const GO_SCOPE: &str = "source.go";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    Go,
    Rust,
    Python,
    JavaScript,
    TypeScript,
}

impl LanguageId {
    pub fn scope_name(self) -> &'static str {
        match self {
            LanguageId::Go => GO_SCOPE,
            LanguageId::Rust => "source.rust",
            LanguageId::Python => "source.python",
            LanguageId::JavaScript => "source.js",
            LanguageId::TypeScript => "source.ts",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "go" => Some(LanguageId::Go),
            "rs" => Some(LanguageId::Rust),
            "py" => Some(LanguageId::Python),
            "js" | "mjs" | "cjs" => Some(LanguageId::JavaScript),
            "ts" => Some(LanguageId::TypeScript),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Grammar scope for a file, if its extension is known.
pub fn scope_for_path(path: &Path) -> Option<&'static str> {
    LanguageId::from_path(path).map(LanguageId::scope_name)
}
