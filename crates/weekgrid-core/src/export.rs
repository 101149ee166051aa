use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, anyhow};
use tracing::info;

use crate::grid::Grid;
use crate::render::write_grid;

/// File stem used when no export path is given.
pub const DEFAULT_EXPORT_STEM: &str = "schedule";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Text => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Text => "text",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ExportFormat::Text),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!("unsupported export format: {other}")),
        }
    }
}

/// Plain aligned table, without terminal escapes or selection marks.
pub fn to_text(grid: &Grid) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    write_grid(&mut buffer, grid, &[], false)?;
    Ok(String::from_utf8(buffer)?)
}

/// One line per row: time, then each day's task. Colors are not carried.
pub fn to_csv(grid: &Grid) -> String {
    let mut csv_content = String::from("time");
    for header in Grid::day_headers() {
        csv_content.push(',');
        csv_content.push_str(header);
    }
    csv_content.push('\n');

    for row in &grid.rows {
        csv_content.push_str(&escape_csv(&row.time));
        for cell in &row.cells {
            csv_content.push(',');
            csv_content.push_str(&escape_csv(&cell.task));
        }
        csv_content.push('\n');
    }

    csv_content
}

pub fn to_json(grid: &Grid) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(grid)?)
}

pub fn render_as(grid: &Grid, format: ExportFormat) -> anyhow::Result<String> {
    match format {
        ExportFormat::Text => to_text(grid),
        ExportFormat::Csv => Ok(to_csv(grid)),
        ExportFormat::Json => to_json(grid),
    }
}

pub fn default_path(dir: &Path, format: ExportFormat) -> PathBuf {
    dir.join(format!("{DEFAULT_EXPORT_STEM}.{}", format.extension()))
}

#[tracing::instrument(skip(grid))]
pub fn export(grid: &Grid, format: ExportFormat, path: &Path) -> anyhow::Result<()> {
    let content = render_as(grid, format)?;
    fs::write(path, content).with_context(|| format!("failed writing {}", path.display()))?;
    info!(file = %path.display(), %format, rows = grid.rows.len(), "exported schedule");
    Ok(())
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{ExportFormat, to_csv, to_json};
    use crate::grid::render;
    use crate::schedule::{CellData, Row, RowId};

    fn grid() -> crate::grid::Grid {
        let rows = vec![Row {
            id: RowId::Default(0),
            time: "05:00".to_string(),
        }];
        let mut data = BTreeMap::new();
        data.insert(
            "1-05:00".to_string(),
            CellData {
                task: "Gym, then \"run\"".to_string(),
                color: "rgb(255, 249, 196)".to_string(),
            },
        );
        render(&rows, &data)
    }

    #[test]
    fn csv_quotes_fields_that_need_it() {
        let csv = to_csv(&grid());
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("time,Sun,Mon,Tue,Wed,Thu,Fri,Sat"));
        assert_eq!(lines.next(), Some("05:00,,\"Gym, then \"\"run\"\"\",,,,,"));
    }

    #[test]
    fn csv_quotes_carriage_returns() {
        let rows = vec![Row {
            id: RowId::Default(0),
            time: "05:00".to_string(),
        }];
        let mut data = BTreeMap::new();
        data.insert(
            "0-05:00".to_string(),
            CellData {
                task: "a\rb".to_string(),
                color: String::new(),
            },
        );
        let csv = to_csv(&render(&rows, &data));
        assert!(csv.ends_with("05:00,\"a\rb\",,,,,,\n"));
    }

    #[test]
    fn json_carries_day_and_color() {
        let json = to_json(&grid()).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");
        let monday = &value["rows"][0]["cells"][1];
        assert_eq!(monday["day"], "Mon");
        assert_eq!(monday["color"], "rgb(255, 249, 196)");
        assert_eq!(value["rows"][0]["cells"][0]["color"], serde_json::Value::Null);
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("TXT".parse::<ExportFormat>().expect("parse"), ExportFormat::Text);
        assert_eq!("csv".parse::<ExportFormat>().expect("parse").extension(), "csv");
        assert!("png".parse::<ExportFormat>().is_err());
    }
}
