use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Source language recognized by the chunker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Markdown,
    Yaml,
    Json,
    Config,
    Sql,
    Shell,
    Html,
    Css,
    Unknown,
}

impl Language {
    /// Detect language from a file extension (without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyw" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
            "cs" => Self::CSharp,
            "rb" => Self::Ruby,
            "md" | "mdx" | "rst" | "adoc" => Self::Markdown,
            "yaml" | "yml" => Self::Yaml,
            "json" => Self::Json,
            "toml" | "ini" | "cfg" | "conf" | "properties" | "env" => Self::Config,
            "sql" | "dbml" => Self::Sql,
            "sh" | "bash" | "zsh" | "fish" | "ps1" | "bat" | "cmd" => Self::Shell,
            "html" => Self::Html,
            "css" | "scss" | "less" => Self::Css,
            _ => Self::Unknown,
        }
    }

    /// Detect language from a file path, falling back to known filename conventions.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .or_else(|| {
                path.as_ref()
                    .file_name()
                    .and_then(|name| name.to_str())
                    .and_then(|name| match name {
                        "Makefile" | "makefile" => Some(Self::Shell),
                        "Dockerfile" => Some(Self::Shell),
                        _ => None,
                    })
            })
            .unwrap_or(Self::Unknown)
    }

    /// Language name as used in chunk metadata and embedding templates.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Markdown => "markdown",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Config => "config",
            Self::Sql => "sql",
            Self::Shell => "shell",
            Self::Html => "html",
            Self::Css => "css",
            Self::Unknown => "unknown",
        }
    }

    /// Whether tree-sitter structural chunking is available for this language.
    pub const fn supports_ast(self) -> bool {
        matches!(
            self,
            Self::Rust | Self::Python | Self::JavaScript | Self::TypeScript
        )
    }

    /// Tree-sitter grammar for structural chunking, if supported.
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Self::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            _ => Err(ChunkerError::unsupported_language(self.as_str())),
        }
    }

    /// Line prefixes that mark an ordinary comment in this language.
    pub const fn comment_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["//", "/*"],
            Self::JavaScript | Self::TypeScript | Self::Go | Self::Java | Self::C | Self::Cpp
            | Self::CSharp => &["//", "/*"],
            Self::Python | Self::Ruby => &["#"],
            Self::Markdown => &[">"],
            Self::Yaml | Self::Config | Self::Shell => &["#"],
            Self::Sql => &["--", "/*"],
            Self::Html | Self::Css => &["<!--", "/*"],
            Self::Json | Self::Unknown => &[],
        }
    }

    /// Line prefixes that mark a doc comment attached to the following symbol.
    pub const fn doc_comment_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["///", "//!", "/**"],
            Self::JavaScript | Self::TypeScript => &["/**"],
            Self::Python => &["\"\"\"", "'''"],
            Self::Go => &["//"],
            Self::Java | Self::CSharp => &["/**"],
            _ => &[],
        }
    }

    /// Leading tokens that mark an import/dependency declaration line.
    pub const fn import_patterns(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["use ", "extern crate "],
            Self::Python => &["import ", "from "],
            Self::JavaScript | Self::TypeScript => &["import ", "require("],
            Self::Go | Self::Java => &["import "],
            Self::CSharp => &["using "],
            Self::Ruby => &["require ", "require_relative ", "include "],
            Self::C | Self::Cpp => &["#include "],
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Language;

    #[test]
    fn detects_common_extensions() {
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("RS"), Language::Rust);
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("js"), Language::JavaScript);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("toml"), Language::Config);
        assert_eq!(Language::from_extension("xyz"), Language::Unknown);
    }

    #[test]
    fn detects_from_path_and_manifest_names() {
        assert_eq!(Language::from_path("src/main.rs"), Language::Rust);
        assert_eq!(Language::from_path("README.md"), Language::Markdown);
        assert_eq!(Language::from_path("Makefile"), Language::Shell);
        assert_eq!(Language::from_path("no_extension_at_all"), Language::Unknown);
    }

    #[test]
    fn ast_support_matches_tree_sitter_grammars_available() {
        for lang in [
            Language::Rust,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
        ] {
            assert!(lang.supports_ast());
            assert!(lang.tree_sitter_language().is_ok());
        }
        assert!(!Language::Go.supports_ast());
        assert!(Language::Go.tree_sitter_language().is_err());
    }
}
