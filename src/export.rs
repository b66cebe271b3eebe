// 📄 Report Exports - CSV renderings of the report document
//
// Both files are derivable purely from the report: consumers holding the
// same document regenerate identical bytes.

use anyhow::{Context, Result};
use std::path::Path;

use crate::metrics::{MetricsEngine, MONTHS};
use crate::report::CollectionReport;

pub struct ReportExporter {
    metrics: MetricsEngine,
}

impl ReportExporter {
    pub fn new() -> Self {
        ReportExporter {
            metrics: MetricsEngine::new(),
        }
    }

    /// Monthly rows: `(month, collection, cumulative, mom_delta)`.
    ///
    /// The delta column compares each month to its immediate predecessor
    /// (0 for January, which has none).
    pub fn monthly_csv(&self, report: &CollectionReport) -> Result<String> {
        let monthly = &report.monthly_collection;
        let cumulative = self.metrics.cumulative(monthly);

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["month", "collection", "cumulative", "mom_delta"])
            .context("Failed to write monthly CSV header")?;

        for i in 0..12 {
            let delta = if i == 0 {
                0.0
            } else {
                monthly.get(i) - monthly.get(i - 1)
            };
            writer
                .write_record([
                    MONTHS[i].to_string(),
                    monthly.get(i).to_string(),
                    cumulative[i].to_string(),
                    delta.to_string(),
                ])
                .context("Failed to write monthly CSV row")?;
        }

        let bytes = writer.into_inner().context("Failed to flush monthly CSV")?;
        String::from_utf8(bytes).context("Monthly CSV was not valid UTF-8")
    }

    /// Child rows: `(name, total)`, in canonical child-listing order.
    pub fn children_csv(&self, report: &CollectionReport) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["name", "total"])
            .context("Failed to write children CSV header")?;

        for child in &report.child_performances {
            writer
                .write_record([child.name.clone(), child.total.to_string()])
                .context("Failed to write children CSV row")?;
        }

        let bytes = writer.into_inner().context("Failed to flush children CSV")?;
        String::from_utf8(bytes).context("Children CSV was not valid UTF-8")
    }

    pub fn write_monthly_csv(&self, report: &CollectionReport, path: &Path) -> Result<()> {
        std::fs::write(path, self.monthly_csv(report)?)
            .with_context(|| format!("Failed to write {:?}", path))
    }

    pub fn write_children_csv(&self, report: &CollectionReport, path: &Path) -> Result<()> {
        std::fs::write(path, self.children_csv(report)?)
            .with_context(|| format!("Failed to write {:?}", path))
    }
}

impl Default for ReportExporter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
