//! Output formatting for CLI

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use tcharvest::RunSummary;

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

/// Final block of an extraction run
pub fn print_summary(summary: &RunSummary) {
    let total = summary.attempted;
    let succeeded = format!("{}/{}", summary.succeeded, total);
    let failed = format!("{}/{}", summary.failed, total);

    println!();
    println!("{}", "━".repeat(60).dimmed());
    println!("{}", " Extraction Summary".bold());
    println!("{}", "━".repeat(60).dimmed());
    println!("   ✅ Success:  {}", succeeded.green());
    if summary.failed > 0 {
        println!("   ❌ Errors:   {}", failed.red());
    } else {
        println!("   ❌ Errors:   {}", failed);
    }
    println!("   📁 Location: {}", summary.output_location);
    println!("{}", "━".repeat(60).dimmed());
}

/// Open pages as a table
pub fn print_pages(rows: &[(usize, String, String)]) {
    if rows.is_empty() {
        println!("No pages open.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["#", "Title", "URL"]);
    for (index, title, url) in rows {
        table.add_row(vec![index.to_string(), title.clone(), url.clone()]);
    }

    println!("{table}");
}
