//! Operator-facing output.

use d2w_runtime::{ConversionReport, ImportMethod};

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Lines printed after a successful conversion.
pub fn report_lines(report: &ConversionReport) -> Vec<String> {
    let name = &report.distro_name;
    let mut lines = vec![format!(
        "Successfully imported {} as {} ({})",
        report.image,
        name,
        format_bytes(report.archive_size)
    )];
    if report.import_method == ImportMethod::FallbackRegistration {
        lines.push("Registered through the fallback API after fast import failed".to_string());
    }
    lines.push(String::new());
    lines.push(format!("To start it:  wsl -d {name}"));
    lines.push(format!("To remove it: wsl --unregister {name}"));
    lines
}

/// Print the success summary on stdout and soft failures on stderr.
pub fn print_report(report: &ConversionReport) {
    for warning in &report.warnings {
        eprintln!("Warning: {warning}");
    }
    for line in report_lines(report) {
        println!("{line}");
    }
}
