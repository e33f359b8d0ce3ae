//! Comparison and energy reports: CSV file, terminal table or JSON

use crate::compare::ComparisonRow;
use crate::results::ConfigurationResult;
use crate::Result;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Default comparison output file
pub const COMPARISON_FILE: &str = "comparison.csv";

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Types that render as a row of a terminal table
pub trait Formattable {
    fn table_headers() -> Vec<String>;
    fn table_row(&self) -> Vec<String>;
}

impl Formattable for ComparisonRow {
    fn table_headers() -> Vec<String> {
        [
            "Mix",
            "Device",
            "Sharing",
            "Inferences",
            "Latency (s)",
            "Energy (J)",
            "Carbon (g)",
            "Cost ($)",
            "GPU hours",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect()
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.mix.clone(),
            self.device.clone(),
            self.sharing_style.to_string(),
            format!("{:.0}", self.num_inferences),
            format!("{:.2}", self.latency),
            format!("{:.1}", self.energy),
            format!("{:.4}", self.embodied_carbon),
            format!("{:.4}", self.cost),
            format!("{:.4}", self.gpu_hours),
        ]
    }
}

/// Operational energy of one configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyRow {
    pub device: String,
    pub mix: String,
    pub run: String,
    pub joules: f64,
    pub mean_watts: f64,
    pub peak_watts: f64,
    pub duration_s: f64,
}

impl From<&ConfigurationResult> for EnergyRow {
    fn from(result: &ConfigurationResult) -> Self {
        Self {
            device: result.device.clone(),
            mix: result.mix.clone(),
            run: result.run.clone(),
            joules: result.energy.joules,
            mean_watts: result.energy.mean_watts,
            peak_watts: result.energy.peak_watts,
            duration_s: result.energy.duration_s,
        }
    }
}

impl Formattable for EnergyRow {
    fn table_headers() -> Vec<String> {
        ["Device", "Mix", "Run", "Energy (J)", "Mean (W)", "Peak (W)", "Window (s)"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.device.clone(),
            self.mix.clone(),
            self.run.clone(),
            format!("{:.1}", self.joules),
            format!("{:.1}", self.mean_watts),
            format!("{:.1}", self.peak_watts),
            format!("{:.1}", self.duration_s),
        ]
    }
}

/// Render items in the requested format
pub fn render<T>(items: &[T], format: OutputFormat) -> Result<String>
where
    T: Serialize + Formattable,
{
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(items)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            let header_cells: Vec<Cell> = T::table_headers()
                .iter()
                .map(|h| Cell::new(h).add_attribute(Attribute::Bold).fg(Color::Cyan))
                .collect();
            table.set_header(header_cells);

            for item in items {
                table.add_row(item.table_row());
            }
            Ok(table.to_string())
        }
    }
}

/// Write comparison rows as CSV, replacing any existing file
pub fn write_comparison_csv(rows: &[ComparisonRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!("Wrote {} comparison rows to {}", rows.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::SharingStyle;

    fn row(style: SharingStyle) -> ComparisonRow {
        ComparisonRow {
            mix: "bert-gpt".to_string(),
            device: "a100".to_string(),
            sharing_style: style,
            num_inferences: 16_500.0,
            latency: 300.0,
            energy: 75_000.0,
            embodied_carbon: 0.05,
            cost: 0.15,
            gpu_hours: 0.083,
        }
    }

    #[test]
    fn test_comparison_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(COMPARISON_FILE);
        write_comparison_csv(
            &[row(SharingStyle::SingleGpu), row(SharingStyle::GpuPerModel)],
            &path,
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines[0],
            "mix,device,sharing_style,num_inferences,latency,energy,embodied_carbon,cost,gpu_hours"
        );
        assert!(lines[1].starts_with("bert-gpt,a100,Single GPU,"));
        assert!(lines[2].starts_with("bert-gpt,a100,GPU/model,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_render_formats() {
        let rows = [row(SharingStyle::SingleGpu)];

        let table = render(&rows, OutputFormat::Table).unwrap();
        assert!(table.contains("Single GPU"));
        assert!(table.contains("75000.0"));

        let json = render(&rows, OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["sharing_style"], "Single GPU");
        assert_eq!(parsed[0]["num_inferences"], 16_500.0);
    }
}
