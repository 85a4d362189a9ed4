//! Analyze command implementation

use crate::analysis::{summarize, TableName};
use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::AnalyzeArgs;
use crate::profiler::{RUN_INFO_TABLE, TARGETS_TABLE};
use crate::storage::{ReadHandle, Table};

/// Run the analyze command
pub fn run_analyze(args: AnalyzeArgs, level: LogLevel) -> Result<(), String> {
    log(level, LogLevel::Verbose, &format!("Loading: {}", args.input_file.display()));
    let tables = ReadHandle::open(&args.input_file).load().map_err(|e| e.to_string())?;
    log(level, LogLevel::Verbose, &format!("  {} tables", tables.len()));

    if args.show_metadata {
        for table in tables.values() {
            let base = TableName::parse(table.name()).base;
            if base == RUN_INFO_TABLE || base == TARGETS_TABLE {
                log(level, LogLevel::Normal, &render_table(table));
            }
        }
    }

    if !args.no_summary {
        let summaries = summarize(&tables, args.verbosity);
        if summaries.is_empty() {
            log(level, LogLevel::Normal, "No metric tables found");
        }
        for summary in summaries {
            log(level, LogLevel::Normal, summary.to_string().trim_end());
        }
    }

    Ok(())
}

/// Plain column-aligned rendering of a small table
fn render_table(table: &Table) -> String {
    let header: Vec<String> = table.columns().iter().map(|c| c.name.clone()).collect();
    let cells: Vec<Vec<String>> =
        table.rows().iter().map(|row| row.iter().map(ToString::to_string).collect()).collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            cells.iter().map(|r| r[i].len()).chain(std::iter::once(header[i].len())).max()
        })
        .map(|w| w.unwrap_or(0))
        .collect();
    let line = |row: &[String]| {
        row.iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = format!("{}\n{}", table.name(), line(&header));
    for row in &cells {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}
