//! `CSV_EXPORT`: write `payload.data` to `<output_dir>/<job-id>.csv`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::ExecutionError;
use crate::typed::{Handler, JobContext, TypedJob};

#[derive(Debug, Clone, Deserialize)]
pub struct CsvExport {
    pub data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExportResult {
    pub file_path: String,
}

impl TypedJob for CsvExport {
    const TYPE: &'static str = "CSV_EXPORT";
    type Output = CsvExportResult;
}

pub struct CsvExportHandler {
    output_dir: PathBuf,
}

impl CsvExportHandler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Handler<CsvExport> for CsvExportHandler {
    async fn handle(&self, job: CsvExport, ctx: &JobContext) -> Result<CsvExportResult, ExecutionError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let path = self.output_dir.join(format!("{}.csv", ctx.job_id));
        let csv = render_csv(&job.data);
        tokio::fs::write(&path, csv.as_bytes()).await?;

        debug!(path = %path.display(), rows = job.data.len(), "csv written");
        Ok(CsvExportResult {
            file_path: path.display().to_string(),
        })
    }
}

/// Header from the first record's keys, one line per record, no trailing newline.
/// Keys missing from later records become empty cells; extra keys are dropped.
pub fn render_csv(records: &[Map<String, Value>]) -> String {
    let Some(first) = records.first() else {
        return String::new();
    };
    let fields: Vec<&String> = first.keys().collect();

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(
        fields
            .iter()
            .map(|f| escape(f))
            .collect::<Vec<_>>()
            .join(","),
    );
    for record in records {
        let row = fields
            .iter()
            .map(|f| record.get(*f).map(cell).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",");
        lines.push(row);
    }
    lines.join("\n")
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape(s),
        other => escape(&other.to_string()),
    }
}

fn escape(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
