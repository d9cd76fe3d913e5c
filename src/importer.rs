//! CSV bulk import of curriculum steps.
//!
//! The file format is deliberately small: a header row followed by data rows,
//! cells separated by commas with no quoting. Headers are matched after
//! normalization (`"Group Id"`, `"group_id"` and `"GROUPID"` all name the
//! `groupId` column), so column order and spelling style do not matter.
//!
//! Imported rows are appended after the current end of the catalog: the Nth
//! data row receives `starting_sequence + N`.

use serde::Serialize;
use thiserror::Error;

use crate::catalog::StepCatalog;
use crate::error::ProgressionError;
use crate::types::StepInput;

/// Why a CSV payload was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("CSV must contain a header row and at least one data row.")]
    TooFewLines,

    #[error(
        "Missing required columns: {}. Detected headers: {}",
        .missing.join(", "),
        .detected.join(", ")
    )]
    MissingColumns {
        missing: Vec<String>,
        detected: Vec<String>,
    },

    /// `row` is 1-based and counts the header row
    #[error("Missing value for {column} on row {row}.")]
    MissingValue { column: String, row: usize },
}

/// Columns understood by the importer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    GroupId,
    GroupName,
    StepId,
    StepName,
    Description,
}

impl Column {
    pub const REQUIRED: [Column; 4] = [
        Column::GroupId,
        Column::GroupName,
        Column::StepId,
        Column::StepName,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::GroupId => "groupId",
            Column::GroupName => "groupName",
            Column::StepId => "stepId",
            Column::StepName => "stepName",
            Column::Description => "description",
        }
    }
}

/// Strip everything but ASCII letters and digits, then lowercase
pub fn normalize_header(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// A non-blank line of the payload, split into trimmed cells
#[derive(Debug, Clone, PartialEq, Eq)]
struct CsvLine {
    /// 1-based position among non-blank lines (header is 1)
    number: usize,
    cells: Vec<String>,
}

fn tokenize(text: &str) -> Vec<CsvLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| CsvLine {
            number: index + 1,
            cells: line.split(',').map(|cell| cell.trim().to_string()).collect(),
        })
        .collect()
}

/// Column positions resolved from the header row
struct HeaderIndex {
    positions: Vec<(String, usize)>,
}

impl HeaderIndex {
    fn resolve(header: &CsvLine) -> Result<Self, ImportError> {
        // Later duplicates win, matching a plain map insert
        let mut positions: Vec<(String, usize)> = Vec::new();
        for (index, cell) in header.cells.iter().enumerate() {
            let key = normalize_header(cell);
            match positions.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = index,
                None => positions.push((key, index)),
            }
        }
        let index = Self { positions };

        let missing: Vec<String> = Column::REQUIRED
            .iter()
            .filter(|column| index.position(**column).is_none())
            .map(|column| column.name().to_string())
            .collect();

        if missing.is_empty() {
            Ok(index)
        } else {
            Err(ImportError::MissingColumns {
                missing,
                detected: header.cells.clone(),
            })
        }
    }

    fn position(&self, column: Column) -> Option<usize> {
        let key = normalize_header(column.name());
        self.positions
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, index)| *index)
    }

    fn value<'a>(&self, line: &'a CsvLine, column: Column) -> &'a str {
        self.position(column)
            .and_then(|index| line.cells.get(index))
            .map_or("", String::as_str)
    }
}

/// A validated data row before it has a place in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvStepRow {
    pub group_id: String,
    pub group_name: String,
    pub step_id: String,
    pub step_name: String,
    pub description: Option<String>,
}

impl CsvStepRow {
    pub fn into_input(self, sequence_number: f64) -> StepInput {
        StepInput {
            sequence_number,
            group_id: self.group_id,
            group_name: self.group_name,
            step_id: self.step_id,
            step_name: self.step_name,
            description: self.description,
        }
    }
}

/// Parse a CSV payload into validated rows, in file order
pub fn parse_rows(text: &str) -> Result<Vec<CsvStepRow>, ImportError> {
    let lines = tokenize(text);
    let Some((header, data)) = lines.split_first() else {
        return Err(ImportError::TooFewLines);
    };
    if data.is_empty() {
        return Err(ImportError::TooFewLines);
    }

    let index = HeaderIndex::resolve(header)?;

    data.iter()
        .map(|line| {
            for column in Column::REQUIRED {
                if index.value(line, column).is_empty() {
                    return Err(ImportError::MissingValue {
                        column: column.name().to_string(),
                        row: line.number,
                    });
                }
            }

            let description = index.value(line, Column::Description);
            Ok(CsvStepRow {
                group_id: index.value(line, Column::GroupId).to_string(),
                group_name: index.value(line, Column::GroupName).to_string(),
                step_id: index.value(line, Column::StepId).to_string(),
                step_name: index.value(line, Column::StepName).to_string(),
                description: (!description.is_empty()).then(|| description.to_string()),
            })
        })
        .collect()
}

/// Number rows `starting_sequence + 1`, `starting_sequence + 2`, ...
pub fn assign_sequence(rows: Vec<CsvStepRow>, starting_sequence: f64) -> Vec<StepInput> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| row.into_input(starting_sequence + (index + 1) as f64))
        .collect()
}

/// Outcome of a committed import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub first_sequence: f64,
    pub last_sequence: f64,
}

/// Parses CSV payloads into step inputs placed after a known catalog end
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CsvStepImporter {
    starting_sequence: f64,
}

impl CsvStepImporter {
    /// Importer appending after `starting_sequence` (0 for an empty catalog)
    pub fn new(starting_sequence: f64) -> Self {
        Self { starting_sequence }
    }

    /// Importer appending after the catalog's current maximum
    pub async fn for_catalog(catalog: &StepCatalog) -> Result<Self, ProgressionError> {
        Ok(Self::new(catalog.max_sequence().await?))
    }

    pub fn starting_sequence(&self) -> f64 {
        self.starting_sequence
    }

    /// Parse and sequence every data row
    pub fn parse(&self, text: &str) -> Result<Vec<StepInput>, ImportError> {
        Ok(assign_sequence(parse_rows(text)?, self.starting_sequence))
    }

    /// First `n` parsed-and-sequenced records. Writes nothing.
    pub fn preview(&self, text: &str, n: usize) -> Result<Vec<StepInput>, ImportError> {
        let mut records = self.parse(text)?;
        records.truncate(n);
        Ok(records)
    }

    /// Parse, sequence and bulk-create. A rejected payload sends nothing.
    pub async fn import(
        &self,
        catalog: &StepCatalog,
        text: &str,
    ) -> Result<ImportSummary, ProgressionError> {
        let records = self.parse(text)?;
        let first_sequence = records.first().map_or(0.0, |r| r.sequence_number);
        let last_sequence = records.last().map_or(0.0, |r| r.sequence_number);

        let inserted = catalog.bulk_create(records).await?;
        tracing::info!(
            inserted,
            first_sequence,
            last_sequence,
            "Imported Mahakrama steps from CSV"
        );

        Ok(ImportSummary {
            inserted,
            first_sequence,
            last_sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    const SAMPLE: &str = "groupId,groupName,stepId,stepName,description\n\
                          G1,Group One,S1,Step One,First step\n\
                          G1,Group One,S2,Step Two,\n";

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("Group Id"), "groupid");
        assert_eq!(normalize_header("group_id"), "groupid");
        assert_eq!(normalize_header("GROUPID"), "groupid");
        assert_eq!(normalize_header(" step-name "), "stepname");
    }

    #[test]
    fn test_parse_header_variants_without_description() {
        let csv = "GroupID,Group Name,Step Id,StepName\nG1,Group One,S1,Step One";
        let rows = parse_rows(csv).unwrap();

        assert_eq!(
            rows,
            vec![CsvStepRow {
                group_id: "G1".to_string(),
                group_name: "Group One".to_string(),
                step_id: "S1".to_string(),
                step_name: "Step One".to_string(),
                description: None,
            }]
        );
    }

    #[test]
    fn test_parse_any_column_order() {
        let csv = "step_name,DESCRIPTION,Step ID,group-name,group id\r\n\
                   Breathing,calm,S1,Foundations,G1\r\n\
                   \r\n\
                   Posture,,S2,Foundations,G1\r\n";
        let rows = parse_rows(csv).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].step_name, "Breathing");
        assert_eq!(rows[0].group_id, "G1");
        assert_eq!(rows[0].description.as_deref(), Some("calm"));
        assert_eq!(rows[1].step_id, "S2");
        assert_eq!(rows[1].description, None);
    }

    #[test]
    fn test_parse_ignores_unknown_columns() {
        let csv = "groupId,groupName,notes,stepId,stepName\nG1,One,ignored,S1,Step";
        let rows = parse_rows(csv).unwrap();
        assert_eq!(rows[0].step_id, "S1");
        assert_eq!(rows[0].step_name, "Step");
    }

    #[test]
    fn test_parse_requires_header_and_data() {
        assert_eq!(parse_rows(""), Err(ImportError::TooFewLines));
        assert_eq!(
            parse_rows("groupId,groupName,stepId,stepName\n\n   \n"),
            Err(ImportError::TooFewLines)
        );
    }

    #[test]
    fn test_parse_reports_missing_columns() {
        let err = parse_rows("Group Id,Step Name\nG1,Step").unwrap_err();

        match &err {
            ImportError::MissingColumns { missing, detected } => {
                assert_eq!(missing, &vec!["groupName".to_string(), "stepId".to_string()]);
                assert_eq!(detected, &vec!["Group Id".to_string(), "Step Name".to_string()]);
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
        assert!(err.to_string().contains("groupName, stepId"));
    }

    #[test]
    fn test_parse_reports_blank_value_row() {
        // Second data row is row 3 counting the header
        let csv = "groupId,groupName,stepId,stepName\n\
                   G1,One,S1,Step\n\
                   G1,One,,Step Two\n";
        let err = parse_rows(csv).unwrap_err();

        assert_eq!(
            err,
            ImportError::MissingValue {
                column: "stepId".to_string(),
                row: 3,
            }
        );
        assert_eq!(err.to_string(), "Missing value for stepId on row 3.");
    }

    #[test]
    fn test_parse_short_row_is_missing_value() {
        let csv = "groupId,groupName,stepId,stepName\nG1,One,S1";
        let err = parse_rows(csv).unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingValue { ref column, row: 2 } if column == "stepName"
        ));
    }

    #[test]
    fn test_sequence_assignment_appends() {
        let importer = CsvStepImporter::new(2.0);
        let records = importer.parse(SAMPLE).unwrap();

        let sequences: Vec<f64> = records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(sequences, vec![3.0, 4.0]);
        assert_eq!(records[0].description.as_deref(), Some("First step"));
        assert_eq!(records[1].description, None);
    }

    #[test]
    fn test_sequence_assignment_after_fractional_max() {
        let importer = CsvStepImporter::new(4.5);
        let records = importer.parse(SAMPLE).unwrap();
        assert_eq!(records[0].sequence_number, 5.5);
        assert_eq!(records[1].sequence_number, 6.5);
    }

    #[test]
    fn test_preview_truncates() {
        let importer = CsvStepImporter::new(0.0);
        let preview = importer.preview(SAMPLE, 1).unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(preview[0].sequence_number, 1.0);

        assert_eq!(importer.preview(SAMPLE, 10).unwrap().len(), 2);
    }

    fn catalog() -> StepCatalog {
        StepCatalog::new(Arc::new(InMemoryStore::default()))
    }

    fn step(sequence_number: f64, step_id: &str) -> StepInput {
        StepInput {
            sequence_number,
            group_id: "G0".to_string(),
            group_name: "Existing".to_string(),
            step_id: step_id.to_string(),
            step_name: format!("Step {}", step_id),
            description: None,
        }
    }

    #[tokio::test]
    async fn test_import_appends_after_existing_steps() {
        let catalog = catalog();
        catalog.create(step(1.0, "A")).await.unwrap();
        catalog.create(step(2.0, "B")).await.unwrap();

        let importer = CsvStepImporter::for_catalog(&catalog).await.unwrap();
        assert_eq!(importer.starting_sequence(), 2.0);

        let summary = importer.import(&catalog, SAMPLE).await.unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.first_sequence, 3.0);
        assert_eq!(summary.last_sequence, 4.0);

        let steps = catalog.list().await.unwrap();
        let sequences: Vec<f64> = steps.iter().map(|s| s.sequence_number).collect();
        assert_eq!(sequences, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(steps[2].step_id, "S1");
    }

    #[tokio::test]
    async fn test_import_is_all_or_nothing() {
        let catalog = catalog();
        let csv = "groupId,groupName,stepId,stepName\nG1,One,S1,Step\nG1,,S2,Step";

        let importer = CsvStepImporter::for_catalog(&catalog).await.unwrap();
        let err = importer.import(&catalog, csv).await.unwrap_err();

        assert!(matches!(
            err,
            ProgressionError::Import(ImportError::MissingValue { row: 3, .. })
        ));
        assert!(catalog.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let catalog = catalog();
        let importer = CsvStepImporter::for_catalog(&catalog).await.unwrap();

        let preview = importer.preview(SAMPLE, 5).unwrap();
        assert_eq!(preview.len(), 2);
        assert!(catalog.list().await.unwrap().is_empty());
    }
}
