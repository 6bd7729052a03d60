//! Load documents from JSON / JSONL files or directory trees.

use anyhow::{bail, Context, Result};
use bm25_core::{DocId, NewDocument};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    id: Option<DocId>,
    #[serde(default)]
    title: String,
    #[serde(default, alias = "body")]
    content: String,
    #[serde(default)]
    category: String,
    #[serde(default, alias = "created", with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
}

impl From<InputDoc> for NewDocument {
    fn from(doc: InputDoc) -> Self {
        let mut out = NewDocument::new()
            .field("title", doc.title)
            .field("content", doc.content)
            .field("category", doc.category);
        out.id = doc.id;
        out.created_at = doc.created_at;
        out
    }
}

fn collect_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input path {} does not exist", input.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
        let p = entry.path();
        if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
            files.push(p.to_path_buf());
        }
    }
    Ok(files)
}

fn read_jsonl(file: &Path, out: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: InputDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid document", file.display(), lineno + 1))?;
        out.push(doc.into());
    }
    Ok(())
}

fn read_json(file: &Path, out: &mut Vec<NewDocument>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                out.push(doc.into());
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            out.push(doc.into());
        }
        _ => tracing::warn!(file = %file.display(), "skipping JSON that is neither an object nor an array"),
    }
    Ok(())
}

/// Read every document under `input` in file-name order.
pub fn load(input: &Path) -> Result<Vec<NewDocument>> {
    let mut docs = Vec::new();
    for file in collect_files(input)? {
        let before = docs.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs).with_context(|| format!("reading {}", file.display()))?;
        }
        tracing::debug!(file = %file.display(), docs = docs.len() - before, "read input file");
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_json_and_jsonl_trees() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a.json"),
            r#"[{"title":"Cat","content":"the cat sat","category":"animals"},{"title":"Dog","body":"ran"}]"#,
        )
        .unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(
            dir.path().join("nested/b.jsonl"),
            "{\"id\": 9, \"title\":\"Bird\",\"created_at\":\"2024-01-01T00:00:00Z\"}\n\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let docs = load(dir.path()).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[1].fields["content"], "ran");
        assert_eq!(docs[2].id, Some(9));
        assert!(docs[2].created_at.is_some());
    }

    #[test]
    fn bad_lines_name_their_location() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.jsonl");
        fs::write(&file, "{\"title\":\"ok\"}\nnot json\n").unwrap();
        let err = load(&file).unwrap_err();
        assert!(format!("{err:#}").contains("bad.jsonl:2"));
    }

    #[test]
    fn missing_input_is_an_error() {
        assert!(load(Path::new("/definitely/not/here")).is_err());
    }
}
