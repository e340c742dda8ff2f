//! File chunking: fixed line windows for code, header-delimited
//! sections for prose.
//!
//! Chunk ids are a pure function of `(domain, path, chunk_index)`, so
//! reindexing an unchanged file regenerates byte-identical ids and the
//! upsert overwrites in place instead of duplicating.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Domain;

/// Window size for code chunks, in lines.
pub const WINDOW_LINES: usize = 100;

/// Overlap between consecutive code chunks, in lines.
pub const OVERLAP_LINES: usize = 20;

/// Stride between window starts.
pub const STRIDE_LINES: usize = WINDOW_LINES - OVERLAP_LINES;

/// Files larger than this (in characters) are skipped entirely.
pub const MAX_FILE_CHARS: usize = 100_000;

/// Metadata carried by every chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Project-relative path of the source file
    pub path: String,

    /// Content domain this chunk belongs to
    pub domain: Domain,

    /// Position of this chunk within its file
    pub chunk_index: usize,

    /// Total number of chunks produced from the file
    pub total_chunks: usize,

    /// Start line (1-indexed, code chunks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,

    /// End line (1-indexed, code chunks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,

    /// File extension (code chunks only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,

    /// Section title (prose chunks only; empty for preamble text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Document-level front-matter key/values, copied onto every chunk
    /// of the document
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl ChunkMetadata {
    fn new(path: &str, domain: Domain, chunk_index: usize, total_chunks: usize) -> Self {
        Self {
            path: path.to_string(),
            domain,
            chunk_index,
            total_chunks,
            start_line: None,
            end_line: None,
            extension: None,
            section: None,
            extra: BTreeMap::new(),
        }
    }
}

/// A bounded slice of a source file, the unit of indexing and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic logical id: `"{domain}:{path}:{chunk_index}"`
    pub id: String,

    /// The chunk text
    pub content: String,

    /// Metadata about this chunk
    pub metadata: ChunkMetadata,
}

/// Build the deterministic logical id for a chunk.
pub fn chunk_id(domain: Domain, path: &str, chunk_index: usize) -> String {
    format!("{}:{}:{}", domain, path, chunk_index)
}

/// Derive the Qdrant point id for a logical chunk id.
///
/// Qdrant only accepts UUID or integer point ids, so the logical id is
/// mapped through UUIDv5. Still a pure function of the logical id,
/// which is what keeps reindexing idempotent.
pub fn point_id(logical_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, logical_id.as_bytes()).to_string()
}

/// Chunk source code into overlapping fixed-size line windows.
///
/// Windows start every [`STRIDE_LINES`] lines and span [`WINDOW_LINES`]
/// lines, clipped at the end of the file. Windows that are empty after
/// trimming are skipped. Files over [`MAX_FILE_CHARS`] characters
/// produce no chunks at all.
pub fn chunk_code(path: &str, content: &str, extension: &str) -> Vec<Chunk> {
    if content.chars().count() > MAX_FILE_CHARS {
        return Vec::new();
    }

    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Vec::new();
    }

    let total_chunks = lines.len().div_ceil(STRIDE_LINES);
    let mut chunks = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let end = (i + WINDOW_LINES).min(lines.len());
        let text = lines[i..end].join("\n");

        if !text.trim().is_empty() {
            let chunk_index = i / STRIDE_LINES;
            let mut metadata = ChunkMetadata::new(path, Domain::Code, chunk_index, total_chunks);
            metadata.start_line = Some(i + 1);
            metadata.end_line = Some(end);
            metadata.extension = Some(extension.to_string());

            chunks.push(Chunk {
                id: chunk_id(Domain::Code, path, chunk_index),
                content: text,
                metadata,
            });
        }

        i += STRIDE_LINES;
    }

    chunks
}

/// Chunk a markdown document into header-delimited sections.
///
/// Splits on level 1-3 headers, keeping the header line with its
/// section. Text before the first header becomes a section with an
/// empty title. Sections whose body is empty after trimming are
/// dropped. For [`Domain::Skills`] documents a leading `---` front
/// matter block is parsed and its key/values merged into every chunk.
///
/// Two passes: sections are collected first, then `total_chunks` is
/// stamped from the final count, which is only known after the whole
/// file has been scanned.
pub fn chunk_markdown(domain: Domain, path: &str, content: &str) -> Vec<Chunk> {
    if content.chars().count() > MAX_FILE_CHARS {
        return Vec::new();
    }

    let (extra, body) = if domain == Domain::Skills {
        parse_front_matter(content)
    } else {
        (BTreeMap::new(), content)
    };

    let mut sections: Vec<(Option<String>, String, Vec<&str>)> = Vec::new();
    let mut header_line: Option<String> = None;
    let mut title = String::new();
    let mut buf: Vec<&str> = Vec::new();

    for line in body.lines() {
        if let Some(stripped) = header_title(line) {
            flush_section(&mut sections, header_line.take(), &title, &buf);
            title = stripped.to_string();
            header_line = Some(line.to_string());
            buf.clear();
        } else {
            buf.push(line);
        }
    }
    flush_section(&mut sections, header_line, &title, &buf);

    // Second pass: the section count is final now, back-fill it.
    let total_chunks = sections.len();
    sections
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (header, section_title, body_lines))| {
            let body_text = body_lines.join("\n");
            let content = match header {
                Some(h) => format!("{}\n{}", h, body_text),
                None => body_text,
            };

            let mut metadata = ChunkMetadata::new(path, domain, chunk_index, total_chunks);
            metadata.section = Some(section_title);
            metadata.extra = extra.clone();

            Chunk {
                id: chunk_id(domain, path, chunk_index),
                content,
                metadata,
            }
        })
        .collect()
}

fn flush_section<'a>(
    sections: &mut Vec<(Option<String>, String, Vec<&'a str>)>,
    header_line: Option<String>,
    title: &str,
    buf: &[&'a str],
) {
    if buf.join("\n").trim().is_empty() {
        return;
    }
    sections.push((header_line, title.to_string(), buf.to_vec()));
}

/// Return the stripped title if `line` is a level 1-3 markdown header.
fn header_title(line: &str) -> Option<&str> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 3 {
        return None;
    }
    let rest = &line[hashes..];
    if rest.is_empty() {
        Some("")
    } else if rest.starts_with(' ') {
        Some(rest.trim())
    } else {
        None
    }
}

/// Parse a leading `---` delimited YAML front matter block.
///
/// Returns the scalar key/values and the remaining document body. A
/// malformed block is left in place and treated as body text.
fn parse_front_matter(content: &str) -> (BTreeMap<String, String>, &str) {
    let mut extra = BTreeMap::new();

    let Some(after_open) = content.strip_prefix("---\n") else {
        return (extra, content);
    };
    let Some(close) = after_open.find("\n---") else {
        return (extra, content);
    };

    let block = &after_open[..close];
    let body_start = match after_open[close + 1..].find('\n') {
        Some(nl) => close + 1 + nl + 1,
        None => after_open.len(),
    };
    let body = &after_open[body_start..];

    match serde_yaml::from_str::<serde_yaml::Value>(block) {
        Ok(serde_yaml::Value::Mapping(map)) => {
            for (key, value) in map {
                let Some(key) = key.as_str() else { continue };
                let value = match value {
                    serde_yaml::Value::String(s) => s,
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                extra.insert(key.to_string(), value);
            }
            (extra, body)
        }
        _ => (extra, content),
    }
}
