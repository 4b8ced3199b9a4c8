//! Rule → ODC defect type lookup.
//!
//! The mapping is a static two-column table (rule or symbol name →
//! `ODC Defect Type`) maintained as a spreadsheet next to the datasets.
//! It is loaded once per run and only read afterwards. A rule without an
//! entry is not an error: it is simply uncategorized.

pub mod policy;

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use serde::Deserialize;

use crate::error::{AuditError, Result};

pub use policy::{Disposition, ExclusionPolicy};

/// Header of the category column in every mapping spreadsheet.
pub const CATEGORY_COLUMN: &str = "ODC Defect Type";

/// Textual sentinel used in JSON files for "no ODC category".
pub const UNCATEGORIZED: &str = "--";

/// Read-only rule → category table.
#[derive(Debug, Clone, Default)]
pub struct OdcMapping {
    entries: HashMap<String, String>,
}

#[derive(Deserialize)]
struct MappingFile {
    #[serde(default)]
    mapping: HashMap<String, String>,
}

impl OdcMapping {
    /// Build a mapping from `(rule, category)` pairs. Empty and `"--"`
    /// categories are dropped.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = pairs
            .into_iter()
            .map(|(k, v)| (k.into().trim().to_string(), v.into().trim().to_string()))
            .filter(|(k, v)| !k.is_empty() && !is_sentinel(v))
            .collect();
        Self { entries }
    }

    /// Load a mapping, picking the loader from the file extension.
    ///
    /// `.toml` files hold a `[mapping]` table; anything else is opened as
    /// a spreadsheet whose header row contains `key_column` and
    /// [`CATEGORY_COLUMN`].
    pub fn load(path: &Path, key_column: &str) -> Result<Self> {
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        if is_toml {
            Self::from_toml(path)
        } else {
            Self::from_spreadsheet(path, key_column)
        }
    }

    /// Load the first worksheet of an xlsx/xls/ods file.
    pub fn from_spreadsheet(path: &Path, key_column: &str) -> Result<Self> {
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            AuditError::Mapping(format!("{} has no worksheets", path.display()))
        })??;

        let mapping = Self::from_range(&range, key_column, &path.display().to_string())?;
        tracing::debug!(
            path = %path.display(),
            entries = mapping.len(),
            "loaded ODC mapping"
        );
        Ok(mapping)
    }

    /// Build a mapping from a worksheet whose first row is the header.
    /// `source` names the sheet in error messages.
    pub fn from_range(range: &Range<Data>, key_column: &str, source: &str) -> Result<Self> {
        let mut rows = range.rows();
        let header: Vec<String> = rows
            .next()
            .ok_or_else(|| AuditError::Mapping(format!("{} is empty", source)))?
            .iter()
            .map(cell_text)
            .collect();

        let key_idx = column_index(&header, key_column, source)?;
        let cat_idx = column_index(&header, CATEGORY_COLUMN, source)?;

        let pairs = rows.filter_map(|row| {
            let key = row.get(key_idx).map(cell_text)?;
            let cat = row.get(cat_idx).map(cell_text)?;
            Some((key, cat))
        });
        Ok(Self::from_pairs(pairs))
    }

    /// Load a `[mapping]` table from a TOML file.
    pub fn from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: MappingFile = toml::from_str(&content)?;
        Ok(Self::from_pairs(file.mapping))
    }

    /// Category for `rule`, or `None` when the rule is uncategorized.
    pub fn lookup(&self, rule: &str) -> Option<&str> {
        self.entries.get(rule).map(String::as_str)
    }

    /// Category for `rule`, rendered with the `"--"` sentinel for JSON output.
    pub fn label(&self, rule: &str) -> &str {
        self.lookup(rule).unwrap_or(UNCATEGORIZED)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse an `odc_category` value read back from JSON.
pub fn parse_category(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|c| !is_sentinel(c))
}

fn is_sentinel(category: &str) -> bool {
    let category = category.trim();
    category.is_empty() || category == UNCATEGORIZED
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn column_index(header: &[String], name: &str, source: &str) -> Result<usize> {
    header.iter().position(|h| h == name).ok_or_else(|| {
        AuditError::Mapping(format!(
            "column '{}' not found in {} (header: {})",
            name,
            source,
            header.join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_categories_are_dropped() {
        let mapping = OdcMapping::from_pairs([
            ("EmptyCatchBlock", "Algorithm"),
            ("UnusedLocalVariable", "--"),
            ("ShortVariable", "  "),
        ]);
        assert_eq!(mapping.lookup("EmptyCatchBlock"), Some("Algorithm"));
        assert_eq!(mapping.lookup("UnusedLocalVariable"), None);
        assert_eq!(mapping.lookup("ShortVariable"), None);
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn unknown_rule_degrades_to_sentinel() {
        let mapping = OdcMapping::from_pairs([("unused-import", "Checking")]);
        assert_eq!(mapping.lookup("no-such-rule"), None);
        assert_eq!(mapping.label("no-such-rule"), "--");
        assert_eq!(mapping.label("unused-import"), "Checking");
    }

    #[test]
    fn loads_toml_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odc.toml");
        std::fs::write(
            &path,
            "[mapping]\n\"EmptyCatchBlock\" = \"Checking\"\n\"GodClass\" = \"--\"\n",
        )
        .unwrap();
        let mapping = OdcMapping::load(&path, "PMD Rule").unwrap();
        assert_eq!(mapping.lookup("EmptyCatchBlock"), Some("Checking"));
        assert_eq!(mapping.lookup("GodClass"), None);
    }

    #[test]
    fn missing_spreadsheet_is_an_error() {
        let result = OdcMapping::load(Path::new("/nonexistent/odc.xlsx"), "PMD Rule");
        assert!(result.is_err());
    }

    fn sheet(rows: &[&[Data]]) -> Range<Data> {
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (rows.len() as u32 - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn text(s: &str) -> Data {
        Data::String(s.to_string())
    }

    #[test]
    fn worksheet_columns_are_found_by_header() {
        let range = sheet(&[
            &[text("Description"), text(CATEGORY_COLUMN), text("PMD Rule")],
            &[text("catch"), text(" Checking "), text("EmptyCatchBlock")],
            &[text("unused"), text("--"), text("UnusedLocalVariable")],
            &[text("numeric"), text("Algorithm"), Data::Int(1042)],
            &[text("no category"), Data::Empty, text("ShortVariable")],
        ]);
        let mapping = OdcMapping::from_range(&range, "PMD Rule", "odc.xlsx").unwrap();
        assert_eq!(mapping.lookup("EmptyCatchBlock"), Some("Checking"));
        assert_eq!(mapping.lookup("UnusedLocalVariable"), None);
        assert_eq!(mapping.lookup("1042"), Some("Algorithm"));
        assert_eq!(mapping.lookup("ShortVariable"), None);
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn worksheet_without_key_column_is_an_error() {
        let range = sheet(&[
            &[text("Rule"), text(CATEGORY_COLUMN)],
            &[text("EmptyCatchBlock"), text("Checking")],
        ]);
        let err = OdcMapping::from_range(&range, "PMD Rule", "odc.xlsx").unwrap_err();
        assert!(matches!(err, AuditError::Mapping(ref m) if m.contains("PMD Rule")));
    }

    #[test]
    fn loads_xlsx_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pylint_odc.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "Pylint Symbol").unwrap();
        worksheet.write_string(0, 1, CATEGORY_COLUMN).unwrap();
        worksheet.write_string(1, 0, "unused-import").unwrap();
        worksheet.write_string(1, 1, "Checking").unwrap();
        worksheet.write_string(2, 0, "line-too-long").unwrap();
        worksheet.write_string(2, 1, "--").unwrap();
        workbook.save(&path).unwrap();

        let mapping = OdcMapping::load(&path, "Pylint Symbol").unwrap();
        assert_eq!(mapping.lookup("unused-import"), Some("Checking"));
        assert_eq!(mapping.lookup("line-too-long"), None);
        assert_eq!(mapping.len(), 1);

        let err = OdcMapping::load(&path, "PMD Rule").unwrap_err();
        assert!(matches!(err, AuditError::Mapping(_)));
    }

    #[test]
    fn parse_category_handles_sentinel() {
        assert_eq!(parse_category(Some("Interface")), Some("Interface"));
        assert_eq!(parse_category(Some("--")), None);
        assert_eq!(parse_category(None), None);
    }
}
