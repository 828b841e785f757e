use crate::chunk::{ChunkMetadata, ChunkType, CodeChunk};
use crate::contextual_imports::{extract_imports_from_lines, filter_relevant_imports};
use crate::error::{ChunkerError, Result};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

/// How a file is split into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Walk the tree-sitter AST and cut along symbol boundaries.
    Structural,
    /// Fixed-size windows over the raw lines, used for languages without a
    /// grammar and as a fallback.
    LineCount,
}

/// How adjacent chunks share context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapStrategy {
    /// Chunks are hard boundaries, no shared content or metadata.
    None,
    /// Duplicate the trailing N lines of a chunk at the start of the next one.
    Fixed(usize),
    /// Don't duplicate raw content; attach inferred imports to metadata instead.
    Contextual,
}

impl Default for OverlapStrategy {
    fn default() -> Self {
        Self::None
    }
}

/// Tunables for [`Chunker`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChunkerConfig {
    pub strategy: ChunkingStrategy,
    pub overlap: OverlapStrategy,
    pub target_chunk_tokens: usize,
    pub max_chunk_tokens: usize,
    pub min_chunk_tokens: usize,
    pub include_imports: bool,
    pub include_parent_context: bool,
    pub include_documentation: bool,
    pub max_imports_per_chunk: usize,
    /// Restrict chunking to these languages; empty means all supported languages.
    #[serde(default)]
    pub supported_languages: Vec<Language>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Structural,
            overlap: OverlapStrategy::None,
            target_chunk_tokens: 400,
            max_chunk_tokens: 800,
            min_chunk_tokens: 20,
            include_imports: true,
            include_parent_context: true,
            include_documentation: true,
            max_imports_per_chunk: 5,
            supported_languages: Vec::new(),
        }
    }
}

impl ChunkerConfig {
    /// Tuned for feeding chunks into an embedding model: contextual overlap
    /// on, generous import/doc budgets.
    pub fn for_embeddings() -> Self {
        Self {
            overlap: OverlapStrategy::Contextual,
            ..Self::default()
        }
    }
}

/// Splits source files into chunks along symbol boundaries where an AST is
/// available, falling back to fixed-size line windows otherwise.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk a file's content. `path` is used for language detection and is
    /// recorded on every chunk's metadata.
    pub fn chunk_str(&self, content: &str, path: Option<&str>) -> Result<Vec<CodeChunk>> {
        let file_path = path.unwrap_or("unknown");
        let language = path.map(Language::from_path).unwrap_or(Language::Unknown);

        if !self.config.supported_languages.is_empty()
            && !self.config.supported_languages.contains(&language)
        {
            return Ok(Vec::new());
        }

        let raw = if self.config.strategy == ChunkingStrategy::Structural && language.supports_ast()
        {
            self.chunk_structural(content, file_path, language)?
        } else {
            self.chunk_by_lines(content, file_path, language)
        };

        let chunks = self.finalize(raw, content, language);
        log::debug!("chunked {file_path} ({language:?}) into {} chunks", chunks.len());
        Ok(chunks)
    }

    fn chunk_structural(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
    ) -> Result<Vec<CodeChunk>> {
        let ts_language = language.tree_sitter_language()?;
        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| ChunkerError::ParseError(e.to_string()))?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| ChunkerError::ParseError("tree-sitter produced no tree".to_string()))?;

        let mut out = Vec::new();
        walk_symbols(tree.root_node(), content, file_path, language, None, &mut out);
        Ok(out)
    }

    fn chunk_by_lines(&self, content: &str, file_path: &str, language: Language) -> Vec<CodeChunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let lines_per_chunk = (self.config.target_chunk_tokens / 2).max(1);
        let mut ranges: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        while start < lines.len() {
            let end = (start + lines_per_chunk).min(lines.len());
            ranges.push((start, end));
            start = end;
        }

        // Merge a small trailing tail into the previous chunk rather than
        // leaving a sliver on its own.
        if ranges.len() > 1 {
            let threshold = self.config.target_chunk_tokens / 2;
            let (tail_start, tail_end) = *ranges.last().expect("ranges non-empty");
            let tail_text = lines[tail_start..tail_end].join("\n");
            if approx_tokens(&tail_text) < threshold {
                ranges.pop();
                let (prev_start, _) = ranges.pop().expect("at least two ranges");
                ranges.push((prev_start, tail_end));
            }
        }

        let fixed_overlap = match self.config.overlap {
            OverlapStrategy::Fixed(n) => n,
            _ => 0,
        };

        ranges
            .into_iter()
            .map(|(start, end)| {
                let overlap_start = start.saturating_sub(fixed_overlap);
                let body = lines[overlap_start..end].join("\n");
                let start_line = start + 1;
                let end_line = end;
                let id = CodeChunk::derive_id(file_path, start_line, end_line, &body);
                CodeChunk {
                    id,
                    content: body,
                    metadata: ChunkMetadata {
                        file_path: file_path.to_string(),
                        language: Some(language),
                        start_line,
                        end_line,
                        chunk_type: Some(ChunkType::Block),
                        symbol_name: None,
                        parent_scope: None,
                        qualified_name: None,
                        documentation: None,
                        context_imports: Vec::new(),
                        tags: Vec::new(),
                    },
                }
            })
            .collect()
    }

    fn finalize(&self, mut chunks: Vec<CodeChunk>, content: &str, language: Language) -> Vec<CodeChunk> {
        let lines: Vec<&str> = content.lines().collect();
        let file_imports = extract_imports_from_lines(language, &lines, usize::MAX);

        for chunk in &mut chunks {
            chunk.metadata.context_imports = if self.config.include_imports {
                filter_relevant_imports(
                    language,
                    &file_imports,
                    &chunk.content,
                    self.config.max_imports_per_chunk,
                )
            } else {
                Vec::new()
            };

            if !self.config.include_parent_context {
                chunk.metadata.parent_scope = None;
                chunk.metadata.qualified_name = chunk.metadata.symbol_name.clone();
            }

            if !self.config.include_documentation {
                chunk.metadata.documentation = None;
            }
        }

        chunks.retain(|chunk| approx_tokens(&chunk.content) >= self.config.min_chunk_tokens);
        chunks
    }
}

fn approx_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

fn function_kind(language: Language) -> &'static str {
    match language {
        Language::Rust => "function_item",
        Language::Python => "function_definition",
        Language::JavaScript | Language::TypeScript => "function_declaration",
        _ => "",
    }
}

fn method_kind(language: Language) -> &'static str {
    function_kind(language)
}

fn container_kind(language: Language) -> &'static str {
    match language {
        Language::Rust => "impl_item",
        Language::Python => "class_definition",
        Language::JavaScript | Language::TypeScript => "class_declaration",
        _ => "",
    }
}

fn container_name_field(language: Language) -> &'static str {
    match language {
        Language::Rust => "type",
        _ => "name",
    }
}

fn other_top_level_kinds(language: Language) -> &'static [(&'static str, ChunkType)] {
    match language {
        Language::Rust => &[
            ("struct_item", ChunkType::Struct),
            ("enum_item", ChunkType::Enum),
            ("trait_item", ChunkType::Trait),
        ],
        _ => &[],
    }
}

/// Walk a node's named children, emitting a chunk per recognized symbol.
/// `scope` is the enclosing module/namespace path, if any.
fn walk_symbols(
    node: Node,
    source: &str,
    file_path: &str,
    language: Language,
    scope: Option<&str>,
    out: &mut Vec<CodeChunk>,
) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let kind = child.kind();

        if kind == function_kind(language) {
            emit_symbol(
                &child,
                source,
                file_path,
                language,
                ChunkType::Function,
                scope.map(str::to_string),
                out,
            );
        } else if !container_kind(language).is_empty() && kind == container_kind(language) {
            let container_name = child
                .child_by_field_name(container_name_field(language))
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .map(str::to_string);

            if let (Some(body), Some(name)) =
                (child.child_by_field_name("body"), container_name)
            {
                let mut body_cursor = body.walk();
                for member in body.named_children(&mut body_cursor) {
                    if member.kind() == method_kind(language) {
                        emit_symbol(
                            &member,
                            source,
                            file_path,
                            language,
                            ChunkType::Method,
                            Some(name.clone()),
                            out,
                        );
                    }
                }
            }
        } else if language == Language::Rust && kind == "mod_item" {
            let mod_name = child
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source.as_bytes()).ok())
                .map(str::to_string);
            emit_symbol(
                &child,
                source,
                file_path,
                language,
                ChunkType::Module,
                scope.map(str::to_string),
                out,
            );
            if let Some(body) = child.child_by_field_name("body") {
                walk_symbols(body, source, file_path, language, mod_name.as_deref(), out);
            }
        } else {
            for (match_kind, chunk_type) in other_top_level_kinds(language) {
                if kind == *match_kind {
                    emit_symbol(
                        &child,
                        source,
                        file_path,
                        language,
                        *chunk_type,
                        scope.map(str::to_string),
                        out,
                    );
                }
            }
        }
    }
}

fn emit_symbol(
    node: &Node,
    source: &str,
    file_path: &str,
    language: Language,
    chunk_type: ChunkType,
    parent_scope: Option<String>,
    out: &mut Vec<CodeChunk>,
) {
    let name = node
        .child_by_field_name("name")
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(str::to_string);
    let content = node
        .utf8_text(source.as_bytes())
        .unwrap_or_default()
        .to_string();
    let start_line = node.start_position().row + 1;
    let end_line = node.end_position().row + 1;
    let documentation = leading_doc_comment(*node, source, language);

    let separator = if language == Language::Rust { "::" } else { "." };
    let qualified_name = match (&parent_scope, &name) {
        (Some(scope), Some(sym)) => Some(format!("{scope}{separator}{sym}")),
        (None, Some(sym)) => Some(sym.clone()),
        _ => None,
    };

    let id = CodeChunk::derive_id(file_path, start_line, end_line, &content);
    out.push(CodeChunk {
        id,
        content,
        metadata: ChunkMetadata {
            file_path: file_path.to_string(),
            language: Some(language),
            start_line,
            end_line,
            chunk_type: Some(chunk_type),
            symbol_name: name,
            parent_scope,
            qualified_name,
            documentation,
            context_imports: Vec::new(),
            tags: Vec::new(),
        },
    });
}

/// Gather consecutive doc-comment siblings immediately preceding `node`.
fn leading_doc_comment(node: Node, source: &str, language: Language) -> Option<String> {
    let prefixes = language.doc_comment_prefixes();
    if prefixes.is_empty() {
        return None;
    }

    let mut lines = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        if !sibling.kind().contains("comment") {
            break;
        }
        let text = sibling.utf8_text(source.as_bytes()).unwrap_or("").trim();
        if !prefixes.iter().any(|p| text.starts_with(p)) {
            break;
        }
        lines.push(text.to_string());
        current = sibling.prev_sibling();
    }

    if lines.is_empty() {
        None
    } else {
        lines.reverse();
        Some(lines.join("\n"))
    }
}
