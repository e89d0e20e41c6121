pub mod band_csv;
pub mod report_file;

pub use band_csv::{ChartSink, CsvChartSink};
pub use report_file::{FileReportSink, ReportSink};

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; anything else becomes `_`.
pub(crate) fn file_stem(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
