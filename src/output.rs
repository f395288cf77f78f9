// Writing the collected pages to disk.

use crate::error::Result;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_BASE_NAME: &str = "response";
pub const JSON_EXTENSION: &str = "json";

/// Characters of output shown in the interactive preview.
pub const PREVIEW_LIMIT: usize = 10_000;

/// Path number `n` in the sequence `base.ext`, `base_1.ext`, `base_2.ext`, ...
fn candidate(dir: &Path, base: &str, ext: &str, n: u64) -> PathBuf {
    if n == 0 {
        dir.join(format!("{}.{}", base, ext))
    } else {
        dir.join(format!("{}_{}.{}", base, n, ext))
    }
}

/// First free path among `base.ext`, `base_1.ext`, `base_2.ext`, ... in `dir`.
/// Existing files are never reused.
pub fn unique_path(dir: &Path, base: &str, ext: &str) -> PathBuf {
    let mut n = 0u64;
    loop {
        let path = candidate(dir, base, ext, n);
        if !path.exists() {
            return path;
        }
        n += 1;
    }
}

/// Create the first path in the `unique_path` sequence that does not exist
/// yet. Creation is exclusive, so a file that appears after the name was
/// picked is skipped rather than overwritten.
fn create_unique(dir: &Path, base: &str, ext: &str) -> Result<(PathBuf, File)> {
    let mut n = 0u64;
    loop {
        let path = candidate(dir, base, ext, n);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Serialize pages as a JSON array indented by four spaces. Non-ASCII text is
/// written as-is.
pub fn render(pages: &[Value]) -> Result<String> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    pages.serialize(&mut ser)?;
    // serde_json only emits valid UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Render the whole result set and write it once to a fresh file in `dir`.
/// Returns the path written.
pub fn write_results(dir: &Path, base: &str, pages: &[Value]) -> Result<PathBuf> {
    let text = render(pages)?;
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir)?;
    }
    let (path, mut file) = create_unique(dir, base, JSON_EXTENSION)?;
    file.write_all(text.as_bytes())?;
    info!(path = %path.display(), pages = pages.len(), "response saved");
    Ok(path)
}

/// Copy a written result file to a location the user picked, replacing
/// whatever is there.
pub fn export(src: &Path, dest: &Path) -> Result<()> {
    let content = fs::read_to_string(src)?;
    fs::write(dest, content)?;
    info!(from = %src.display(), to = %dest.display(), "results exported");
    Ok(())
}

/// At most `limit` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn unique_path_skips_existing_files() {
        let dir = tempdir().unwrap();
        let d = dir.path();
        assert_eq!(unique_path(d, "response", "json"), d.join("response.json"));

        fs::write(d.join("response.json"), "[]").unwrap();
        assert_eq!(unique_path(d, "response", "json"), d.join("response_1.json"));

        fs::write(d.join("response_1.json"), "[]").unwrap();
        assert_eq!(unique_path(d, "response", "json"), d.join("response_2.json"));
    }

    #[test]
    fn render_uses_four_space_indent_and_keeps_unicode() {
        let text = render(&[json!({"nome": "São Paulo"})]).unwrap();
        assert_eq!(text, "[\n    {\n        \"nome\": \"São Paulo\"\n    }\n]");
    }

    #[test]
    fn write_never_overwrites() {
        let dir = tempdir().unwrap();
        let first = write_results(dir.path(), "response", &[json!({"a": 1})]).unwrap();
        let second = write_results(dir.path(), "response", &[json!({"b": 2})]).unwrap();
        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "response_1.json");
        let kept: Value = serde_json::from_str(&fs::read_to_string(&first).unwrap()).unwrap();
        assert_eq!(kept, json!([{"a": 1}]));
    }

    #[test]
    fn written_file_reads_back_identically() {
        let dir = tempdir().unwrap();
        let pages = vec![
            json!({"pagina": 1, "total_de_paginas": 2, "clientes": [{"razao": "Ação Ltda"}]}),
            json!({"pagina": 2, "total_de_paginas": 2, "clientes": []}),
        ];
        let path = write_results(dir.path(), "response", &pages).unwrap();
        let back: Vec<Value> = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back, pages);
    }

    #[cfg(unix)]
    #[test]
    fn write_skips_name_held_by_dangling_symlink() {
        // A dangling symlink reports `exists() == false` but still occupies
        // the name; writing through it would create its target.
        let dir = tempdir().unwrap();
        let target = dir.path().join("elsewhere.json");
        std::os::unix::fs::symlink(&target, dir.path().join("response.json")).unwrap();
        assert!(!dir.path().join("response.json").exists());

        let path = write_results(dir.path(), "response", &[json!({"a": 1})]).unwrap();
        assert_eq!(path, dir.path().join("response_1.json"));
        assert!(!target.exists());
    }

    #[test]
    fn export_overwrites_destination() {
        let dir = tempdir().unwrap();
        let src = write_results(dir.path(), "response", &[json!(1)]).unwrap();
        let dest = dir.path().join("omie_results.json");
        fs::write(&dest, "old").unwrap();
        export(&src, &dest).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), fs::read_to_string(&src).unwrap());
    }

    #[test]
    fn preview_cuts_on_char_boundaries() {
        assert_eq!(preview("abc", 10), "abc");
        assert_eq!(preview("abc", 3), "abc");
        assert_eq!(preview("ãçéxyz", 3), "ãçé...");
    }
}
