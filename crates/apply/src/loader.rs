use std::path::{Path, PathBuf};

use kman_core::{KmanError, KmanResult, ManifestDocument};
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Files larger than this are rejected before parsing.
    pub max_file_bytes: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { max_file_bytes: 1_000_000 } // 1 MB
    }
}

pub fn load_manifests(path: &Path) -> KmanResult<Vec<ManifestDocument>> {
    load_manifests_with(path, &LoadOptions::default())
}

/// Load every YAML document under `path` (a directory or a single file).
///
/// Files are visited in lexical order per directory and documents in stream
/// order within a file. Empty documents are skipped; any decode failure aborts
/// the whole load.
pub fn load_manifests_with(path: &Path, opts: &LoadOptions) -> KmanResult<Vec<ManifestDocument>> {
    let mut files = Vec::new();
    collect_yaml_files(path, &mut files)?;

    let mut out = Vec::new();
    for file in &files {
        let meta = std::fs::metadata(file).map_err(|e| io_err(file, e))?;
        if meta.len() > opts.max_file_bytes {
            return Err(KmanError::Parse {
                path: file.display().to_string(),
                message: format!("YAML payload too large (>{} bytes)", opts.max_file_bytes),
            });
        }
        let text = std::fs::read_to_string(file).map_err(|e| io_err(file, e))?;
        let docs = parse_documents(&text, file)?;
        debug!(file = %file.display(), docs = docs.len(), "manifest file parsed");
        out.extend(docs);
    }
    info!(path = %path.display(), files = files.len(), docs = out.len(), "manifests loaded");
    Ok(out)
}

/// Split a multi-document YAML stream and decode each document independently.
/// `source` is only used to label errors.
pub fn parse_documents(text: &str, source: &Path) -> KmanResult<Vec<ManifestDocument>> {
    let parse_err = |message: String| KmanError::Parse { path: source.display().to_string(), message };
    let mut out = Vec::new();
    for de in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(de).map_err(|e| parse_err(e.to_string()))?;
        if is_empty_document(&value) {
            continue;
        }
        let json = serde_json::to_value(value).map_err(|e| parse_err(format!("converting YAML to JSON: {}", e)))?;
        out.push(ManifestDocument::from_json(json).map_err(parse_err)?);
    }
    Ok(out)
}

fn is_empty_document(v: &serde_yaml::Value) -> bool {
    match v {
        serde_yaml::Value::Null => true,
        serde_yaml::Value::Mapping(m) => m.is_empty(),
        _ => false,
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"))
}

fn collect_yaml_files(path: &Path, out: &mut Vec<PathBuf>) -> KmanResult<()> {
    let meta = std::fs::metadata(path).map_err(|e| io_err(path, e))?;
    if !meta.is_dir() {
        if is_yaml(path) {
            out.push(path.to_path_buf());
        }
        return Ok(());
    }
    let mut entries = std::fs::read_dir(path)
        .map_err(|e| io_err(path, e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io_err(path, e))?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let p = entry.path();
        // file_type does not follow symlinks: linked directories are not descended
        let ft = entry.file_type().map_err(|e| io_err(&p, e))?;
        if ft.is_dir() {
            collect_yaml_files(&p, out)?;
        } else if is_yaml(&p) {
            out.push(p);
        }
    }
    Ok(())
}

fn io_err(path: &Path, e: std::io::Error) -> KmanError {
    KmanError::Io { path: path.display().to_string(), message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> &'static Path {
        Path::new("inline.yaml")
    }

    #[test]
    fn empty_documents_are_skipped() {
        let y = "---\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: a\n---\n{}\n";
        let docs = parse_documents(y, src()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name(), "a");
    }

    #[test]
    fn documents_keep_stream_order() {
        let y = "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: apps\n---\napiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  namespace: apps\n";
        let docs = parse_documents(y, src()).unwrap();
        let keys: Vec<_> = docs.iter().map(|d| d.display_key()).collect();
        assert_eq!(keys, vec!["Namespace/apps", "Deployment/web"]);
        assert_eq!(docs[1].namespace(), "apps");
    }

    #[test]
    fn malformed_yaml_names_the_source() {
        let y = "apiVersion: v1\nkind: ConfigMap\nmetadata: [unclosed\n";
        let e = parse_documents(y, src()).unwrap_err();
        assert_eq!(e.kind(), "parse");
        assert!(e.to_string().contains("inline.yaml"), "e={}", e);
    }

    #[test]
    fn scalar_document_is_rejected() {
        let e = parse_documents("just a string\n", src()).unwrap_err();
        assert!(e.to_string().contains("mapping"), "e={}", e);
    }

    #[test]
    fn yaml_extension_check() {
        assert!(is_yaml(Path::new("a/b.yaml")));
        assert!(is_yaml(Path::new("b.yml")));
        assert!(!is_yaml(Path::new("b.json")));
        assert!(!is_yaml(Path::new("b.YAML")));
        assert!(!is_yaml(Path::new("yaml")));
    }
}
