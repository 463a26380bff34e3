//! Plain-text report renderer.
//!
//! One block of ASCII tables per requested output currency: the
//! aggregated rollup (root, type and symbol rows), the open positions
//! and the PNL history series.

use std::io::Write;

use rust_decimal::Decimal;

use crate::domain::error::ReportError;
use crate::domain::money::{Currency, Quotes};
use crate::domain::report::{Report, ReportParameters};
use crate::domain::windowing::Period;
use crate::ports::report_sink::ReportSink;

pub struct TextReportAdapter;

impl ReportSink for TextReportAdapter {
    fn write(
        &self,
        report: &Report,
        parameters: &ReportParameters,
        out: &mut dyn Write,
    ) -> Result<(), ReportError> {
        let failed = |e: std::io::Error| ReportError::ReportWrite {
            reason: e.to_string(),
        };

        let periods = sorted_periods(parameters);
        for &currency in &parameters.currencies {
            writeln!(out, "{}", render_aggregated(report, &periods, currency))
                .map_err(failed)?;
            writeln!(out, "{}", render_open_positions(report, &periods, currency))
                .map_err(failed)?;
            for (unit, series) in &report.pnl_history {
                let title = format!("{} Pnl History ({})", unit.label(), currency);
                let rows: Vec<Vec<String>> = series
                    .iter()
                    .map(|h| {
                        vec![
                            format!("{} - {}", h.start.format("%d-%m-%Y"), h.end.format("%d-%m-%Y")),
                            money(&h.pnl, currency),
                        ]
                    })
                    .collect();
                writeln!(
                    out,
                    "{}",
                    render_table(&title, &["Window".into(), "PNL".into()], &rows)
                )
                .map_err(failed)?;
            }
        }
        Ok(())
    }
}

/// Longest window first, all-time ahead of everything.
fn sorted_periods(parameters: &ReportParameters) -> Vec<Period> {
    let mut periods: Vec<Period> = parameters.periods.iter().copied().collect();
    periods.sort_by_key(|p| std::cmp::Reverse(p.day_count().unwrap_or(i64::MAX)));
    periods
}

fn render_aggregated(report: &Report, periods: &[Period], currency: Currency) -> String {
    let mut header = vec!["".to_string(), format!("Value ({currency})")];
    for period in periods {
        header.push(format!("PNL {period}"));
    }

    let mut rows = Vec::new();
    let node_row = |label: String, node: &crate::domain::aggregation::AggregationNode| {
        let mut row = vec![label, money(&node.total_value, currency)];
        for period in periods {
            row.push(
                node.pnl
                    .get(period)
                    .map(|p| money(p, currency))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        row
    };

    rows.push(node_row("TOTAL".to_string(), &report.aggregated.totals));
    for (instrument_type, type_node) in &report.aggregated.types {
        rows.push(node_row(instrument_type.label().to_string(), &type_node.totals));
        for (symbol, symbol_node) in &type_node.symbols {
            rows.push(node_row(format!("  {symbol}"), symbol_node));
        }
    }

    render_table(
        &format!("Aggregated Results ({currency})"),
        &header,
        &rows,
    )
}

fn render_open_positions(report: &Report, periods: &[Period], currency: Currency) -> String {
    let mut header = vec![
        "Instrument".to_string(),
        "Amount".to_string(),
        format!("Price ({currency})"),
        "Unit Cost".to_string(),
        "Value".to_string(),
        "Commission".to_string(),
    ];
    for period in periods {
        header.push(format!("PNL {period}"));
    }
    for period in periods {
        header.push(format!("ROI {period} (%)"));
    }

    let mut rows = Vec::new();
    for position in &report.open_positions {
        let mut row = vec![
            position.instrument.to_string(),
            position.total_amount.normalize().to_string(),
            position
                .price
                .as_ref()
                .map(|p| money(p, currency))
                .unwrap_or_else(|| "-".to_string()),
            money(&position.unit_cost, currency),
            money(&position.total_value, currency),
            money(&position.total_commission, currency),
        ];
        for period in periods {
            row.push(
                position
                    .pnl
                    .get(period)
                    .map(|p| money(p, currency))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        for period in periods {
            row.push(
                position
                    .roi
                    .get(period)
                    .map(|r| rate(r.get(currency)))
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        rows.push(row);
    }

    render_table(&format!("Open Positions ({currency})"), &header, &rows)
}

fn money(value: &Quotes, currency: Currency) -> String {
    format!("{:.2}", value.get(currency))
}

fn rate(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn render_table(title: &str, header: &[String], rows: &[Vec<String>]) -> String {
    let columns = header.len();
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let rule: String = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };

    let format_row = |cells: &[String]| {
        let mut line = String::from("|");
        for (i, width) in widths.iter().copied().enumerate() {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            line.push_str(&format!(" {cell:width$} |"));
        }
        line
    };

    let mut output = String::new();
    output.push_str(title);
    output.push('\n');
    output.push_str(&rule);
    output.push('\n');
    output.push_str(&format_row(header));
    output.push('\n');
    output.push_str(&rule);
    output.push('\n');
    for row in rows {
        output.push_str(&format_row(row));
        output.push('\n');
    }
    output.push_str(&rule);
    output.push('\n');
    output
}
