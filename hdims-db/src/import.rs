//! CSV bulk import of districts and facilities
//!
//! Rows are inserted one at a time in file order. A row that is malformed or
//! names an unknown parent is skipped and recorded in the [`ImportReport`];
//! rows already inserted stay inserted.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use hdims_core::{Collection, FacilityType};

use crate::error::{DbError, DbResult};
use crate::facade::DataStore;
use crate::query::Query;

/// What a CSV file contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Districts,
    Facilities,
}

impl ImportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Districts => "districts",
            Self::Facilities => "facilities",
        }
    }
}

impl std::fmt::Display for ImportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row left out of the import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based line number in the file
    pub line: usize,
    pub reason: String,
}

/// Outcome of one import
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub kind: ImportKind,
    /// Data rows seen
    pub total: usize,
    pub inserted: usize,
    pub skipped: Vec<SkippedRow>,
}

impl ImportReport {
    pub fn new(kind: ImportKind) -> Self {
        Self {
            kind,
            total: 0,
            inserted: 0,
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, line: usize, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(kind = %self.kind, line, reason = %reason, "Import row skipped");
        self.skipped.push(SkippedRow { line, reason });
    }

    /// Whether every row made it in
    pub fn all_inserted(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Print summary
    pub fn print_summary(&self) {
        println!("\nImport Summary ({}):", self.kind);
        println!("  Rows: {}", self.total);
        println!("  Inserted: {}", self.inserted);
        println!("  Skipped: {}", self.skipped.len());

        if !self.skipped.is_empty() {
            println!("\nSkipped rows:");
            for row in &self.skipped {
                println!("  [line {}] {}", row.line, row.reason);
            }
        }
    }
}

/// Group physical lines into records; a quoted field may span lines
///
/// Each record carries the 1-based number of its first line. Blank lines
/// and `#` comments between records are dropped.
pub fn csv_records(text: &str) -> Vec<(usize, String)> {
    let mut records = Vec::new();
    let mut open: Option<(usize, String)> = None;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        let (start, record) = match open.take() {
            Some((start, mut record)) => {
                record.push('\n');
                record.push_str(line);
                (start, record)
            }
            None if line.trim().is_empty() || line.trim_start().starts_with('#') => continue,
            None => (i + 1, line.to_string()),
        };
        // an odd quote count leaves a field open
        if record.matches('"').count() % 2 == 1 {
            open = Some((start, record));
        } else {
            records.push((start, record));
        }
    }
    if let Some(unterminated) = open {
        records.push(unterminated);
    }
    records
}

/// Split one CSV record, honouring double quotes and `""` escapes
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            (',', false) => fields.push(std::mem::take(&mut field).trim().to_string()),
            (c, _) => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

/// Header plus numbered data rows
struct CsvTable {
    headers: Vec<String>,
    rows: Vec<(usize, Vec<String>)>,
}

impl CsvTable {
    fn parse(text: &str) -> DbResult<Self> {
        let mut records = csv_records(text).into_iter();

        let (_, header) = records
            .next()
            .ok_or_else(|| DbError::Import("CSV file is empty".to_string()))?;
        let headers = parse_csv_line(&header)
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_lowercase())
            .collect();
        let rows = records.map(|(n, r)| (n, parse_csv_line(&r))).collect();
        Ok(Self { headers, rows })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn require(&self, name: &str) -> DbResult<usize> {
        self.column(name)
            .ok_or_else(|| DbError::Import(format!("CSV header is missing column '{}'", name)))
    }
}

fn cell(fields: &[String], index: usize) -> Option<&str> {
    fields
        .get(index)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

/// Lowercase name → id for a whole table
async fn name_index(store: &dyn DataStore, table: Collection) -> DbResult<HashMap<String, Vec<Value>>> {
    let rows = store.select(table, &Query::new().select("id,name")).await?.data;
    let mut index: HashMap<String, Vec<Value>> = HashMap::new();
    for row in rows {
        if let (Some(name), Some(id)) = (row.get("name").and_then(Value::as_str), row.get("id")) {
            index.entry(name.trim().to_lowercase()).or_default().push(id.clone());
        }
    }
    Ok(index)
}

/// Resolve a parent by name, requiring exactly one match
fn resolve<'a>(
    index: &'a HashMap<String, Vec<Value>>,
    name: &str,
    what: &str,
) -> Result<&'a Value, String> {
    match index.get(&name.to_lowercase()).map(Vec::as_slice) {
        Some([id]) => Ok(id),
        Some([]) | None => Err(format!("unknown {} '{}'", what, name)),
        Some(_) => Err(format!("ambiguous {} '{}'", what, name)),
    }
}

/// Import districts from CSV with columns `name,state` and optional `code`
pub async fn import_districts(store: &dyn DataStore, csv: &str) -> DbResult<ImportReport> {
    let table = CsvTable::parse(csv)?;
    let name_col = table.require("name")?;
    let state_col = table.require("state")?;
    let code_col = table.column("code");
    let states = name_index(store, Collection::States).await?;

    let mut report = ImportReport::new(ImportKind::Districts);
    for (line, fields) in &table.rows {
        report.total += 1;
        let Some(name) = cell(fields, name_col) else {
            report.skip(*line, "missing district name");
            continue;
        };
        let Some(state) = cell(fields, state_col) else {
            report.skip(*line, "missing state");
            continue;
        };
        let state_id = match resolve(&states, state, "state") {
            Ok(id) => id.clone(),
            Err(reason) => {
                report.skip(*line, reason);
                continue;
            }
        };

        let mut row = json!({ "name": name, "state_id": state_id });
        if let Some(code) = code_col.and_then(|c| cell(fields, c)) {
            row["code"] = json!(code);
        }
        match store.insert(Collection::Districts, row).await {
            Ok(_) => report.inserted += 1,
            Err(e) => report.skip(*line, e.to_string()),
        }
    }

    info!(
        kind = %report.kind,
        count = report.inserted,
        skipped = report.skipped.len(),
        "Import finished"
    );
    Ok(report)
}

/// Import facilities from CSV with columns `name,district,facility_type`
pub async fn import_facilities(store: &dyn DataStore, csv: &str) -> DbResult<ImportReport> {
    let table = CsvTable::parse(csv)?;
    let name_col = table.require("name")?;
    let district_col = table.require("district")?;
    let type_col = table.require("facility_type")?;
    let districts = name_index(store, Collection::Districts).await?;

    let mut report = ImportReport::new(ImportKind::Facilities);
    for (line, fields) in &table.rows {
        report.total += 1;
        let Some(name) = cell(fields, name_col) else {
            report.skip(*line, "missing facility name");
            continue;
        };
        let Some(district) = cell(fields, district_col) else {
            report.skip(*line, "missing district");
            continue;
        };
        let district_id = match resolve(&districts, district, "district") {
            Ok(id) => id.clone(),
            Err(reason) => {
                report.skip(*line, reason);
                continue;
            }
        };
        let raw_type = cell(fields, type_col).unwrap_or("");
        let Some(facility_type) = FacilityType::from_str(raw_type) else {
            report.skip(*line, format!("unknown facility type '{}'", raw_type));
            continue;
        };

        let row = json!({
            "name": name,
            "district_id": district_id,
            "facility_type": facility_type,
        });
        match store.insert(Collection::Facilities, row).await {
            Ok(_) => report.inserted += 1,
            Err(e) => report.skip(*line, e.to_string()),
        }
    }

    info!(
        kind = %report.kind,
        count = report.inserted,
        skipped = report.skipped.len(),
        "Import finished"
    );
    Ok(report)
}

/// Read a CSV file and import it
pub async fn import_file(store: &dyn DataStore, kind: ImportKind, path: &Path) -> DbResult<ImportReport> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DbError::Import(format!("Failed to read {}: {}", path.display(), e)))?;
    match kind {
        ImportKind::Districts => import_districts(store, &text).await,
        ImportKind::Facilities => import_facilities(store, &text).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use std::io::Write;

    async fn store_with_state(name: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(Collection::States, json!({ "name": name }))
            .await
            .unwrap();
        store
    }

    #[test]
    fn test_parse_csv_line_quotes() {
        assert_eq!(parse_csv_line("a, b ,c"), vec!["a", "b", "c"]);
        assert_eq!(
            parse_csv_line(r#""Pune, City",Maharashtra"#),
            vec!["Pune, City", "Maharashtra"]
        );
        assert_eq!(parse_csv_line(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
        assert_eq!(parse_csv_line("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        let text = "name,state\n\n\"Pune\nRural\",Maharashtra\n# note\nNagpur,Maharashtra\n";
        let records = csv_records(text);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].0, 3);
        assert_eq!(
            parse_csv_line(&records[1].1),
            vec!["Pune\nRural", "Maharashtra"]
        );
        assert_eq!(records[2], (6, "Nagpur,Maharashtra".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_state_row_skipped() {
        let store = store_with_state("Maharashtra").await;
        let csv = "name,state,code\nPune,Maharashtra,PN\nAtlantis,Lemuria,\nNagpur,maharashtra,\n";
        let report = import_districts(&store, csv).await.unwrap();
        assert_eq!(report.total, 3);
        assert_eq!(report.inserted, 2);
        assert_eq!(
            report.skipped,
            vec![SkippedRow {
                line: 3,
                reason: "unknown state 'Lemuria'".into()
            }]
        );

        let rows = store.rows(Collection::Districts).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["code"], "PN");
        assert!(rows[1].get("code").is_none());
    }

    #[tokio::test]
    async fn test_missing_header_column() {
        let store = MemoryStore::new();
        let err = import_districts(&store, "name,region\nPune,West\n")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("'state'"));
        assert!(import_districts(&store, "\n\n").await.is_err());
    }

    #[tokio::test]
    async fn test_facilities_import() {
        let store = store_with_state("Maharashtra").await;
        import_districts(&store, "name,state\nPune,Maharashtra\n")
            .await
            .unwrap();
        let csv = "\u{feff}Name,District,Facility_Type\n\
                   PHC Hadapsar,Pune,PHC\n\
                   CHC Nowhere,Ghost,CHC\n\
                   Clinic,Pune,spaceship\n\
                   ,Pune,PHC\n\
                   SC Wagholi,Pune,sub centre\n";
        let report = import_facilities(&store, csv).await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.skipped.len(), 3);
        assert_eq!(report.skipped[0].line, 3);
        assert!(report.skipped[1].reason.contains("spaceship"));
        assert!(!report.all_inserted());

        let rows = store.rows(Collection::Facilities).await;
        assert_eq!(rows[0]["facility_type"], "primary_health_centre");
        assert_eq!(rows[1]["facility_type"], "sub_centre");
    }

    #[tokio::test]
    async fn test_import_file() {
        let store = store_with_state("Kerala").await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,state").unwrap();
        writeln!(file, "# comment lines are ignored").unwrap();
        writeln!(file, "Kochi,Kerala").unwrap();
        let report = import_file(&store, ImportKind::Districts, file.path())
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);
        assert!(report.all_inserted());

        let missing = import_file(&store, ImportKind::Districts, Path::new("/no/such/file.csv")).await;
        assert!(matches!(missing, Err(DbError::Import(_))));
    }
}
