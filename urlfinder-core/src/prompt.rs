//! Prompt construction: one rendered template per CSV row.

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

/// One data row, addressed by its CSV header names.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PromptRow {
    pub index: usize,
    pub fields: BTreeMap<String, String>,
}

fn open_or_not_found(path: &Path, missing: impl FnOnce() -> Error) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            missing() } else { Error::Io(e)
        }
    })
}

/// Reads a headed CSV file. Fields are trimmed of surrounding whitespace.
pub fn load_rows(path: &Path) -> Result<Vec<PromptRow>> {
    let f = open_or_not_found(path, || Error::DataNotFound(path.to_path_buf()))?;
    read_rows(f)
}

pub fn read_rows<R: Read>(rdr: R) -> Result<Vec<PromptRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(rdr);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for (index, rec) in reader.records().enumerate() {
        let rec = rec?;
        let fields = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_string(), rec.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(PromptRow { index, fields });
    }
    debug!(rows = rows.len(), "loaded data rows");
    Ok(rows)
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap())
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    source: String,
}

impl Template {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self { name: name.into(), source: source.into() }
    }

    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = dir.join(name);
        let mut f = open_or_not_found(&path, || Error::TemplateNotFound {
            name: name.to_string(),
            dir: dir.to_path_buf(),
        })?;
        let mut source = String::new();
        f.read_to_string(&mut source)?;
        Ok(Self::new(name, source))
    }

    /// Substitutes `{{ name }}` placeholders. Unknown names render empty.
    pub fn render(&self, fields: &BTreeMap<String, String>) -> String {
        placeholder_re()
            .replace_all(&self.source, |caps: &Captures| match fields.get(&caps[1]) {
                Some(v) => v.clone(),
                None => {
                    debug!(template = %self.name, var = &caps[1], "undefined template variable");
                    String::new()
                }
            })
            .into_owned()
    }

    pub fn render_all(&self, rows: &[PromptRow]) -> Vec<String> {
        rows.iter().map(|r| self.render(&r.fields)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn render_fills_placeholders_with_or_without_spaces() {
        let t = Template::new("t", "Find {{ name }} in {{city}}; {{ missing }}.");
        let mut f = BTreeMap::new();
        f.insert("name".to_string(), "Diebold".to_string());
        f.insert("city".to_string(), "Ohio".to_string());
        assert_eq!(t.render(&f), "Find Diebold in Ohio; .");
    }

    #[test]
    fn read_rows_keys_by_header() {
        let rows = read_rows("name, site\nDiebold, diebold.com\n\"Paccar, Inc\",paccar.com\n".as_bytes())
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields["name"], "Diebold");
        assert_eq!(rows[0].fields["site"], "diebold.com");
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[1].fields["name"], "Paccar, Inc");
    }

    #[test]
    fn short_rows_fill_missing_columns_empty() {
        let rows = read_rows("a,b\n1\n".as_bytes()).unwrap();
        assert_eq!(rows[0].fields["b"], "");
    }

    #[test]
    fn missing_files_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_rows(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, Error::DataNotFound(_)));
        let err = Template::load(dir.path(), "instructions.txt").unwrap_err();
        assert!(err.to_string().contains("Template 'instructions.txt' not found"));
    }

    #[test]
    fn render_all_from_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("instructions.txt"), "Query for {{ company }}").unwrap();
        let data = dir.path().join("businesses.txt");
        fs::write(&data, "company\nDiebold\nPaccar\n").unwrap();
        let t = Template::load(dir.path(), "instructions.txt").unwrap();
        let rows = load_rows(&data).unwrap();
        assert_eq!(t.render_all(&rows), vec!["Query for Diebold", "Query for Paccar"]);
    }
}
