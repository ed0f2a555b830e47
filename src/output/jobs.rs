use crate::model::JobStatus;
use crate::output::{bold, info, muted, status};
use std::io::Write;

#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: u64,
    pub status: JobStatus,
    pub start: String,
    pub duration: String,
    pub command: String,
}

pub fn print_jobs(mut w: impl Write, rows: &[JobRow], filtered: bool) -> std::io::Result<()> {
    if rows.is_empty() {
        let message = if filtered {
            "No jobs match the filter."
        } else {
            "No jobs yet."
        };
        writeln!(w, "{} {}", info("i"), muted(message))?;
        return Ok(());
    }

    let labels: Vec<String> = rows.iter().map(|row| row.status.label()).collect();

    let id_w = rows
        .iter()
        .map(|row| row.id.to_string().len())
        .fold(2, usize::max);
    let status_w = labels.iter().map(String::len).fold(6, usize::max);
    let start_w = rows.iter().map(|row| row.start.len()).fold(5, usize::max);
    let dur_w = rows.iter().map(|row| row.duration.len()).fold(8, usize::max);

    writeln!(
        w,
        "{}",
        bold(&format!(
            "{:<id_w$}  {:<status_w$}  {:<start_w$}  {:<dur_w$}  COMMAND",
            "ID", "STATUS", "START", "DURATION"
        ))
    )?;

    for (row, label) in rows.iter().zip(&labels) {
        let id = format!("{:<id_w$}", row.id);
        let rest = format!(
            "{:<start_w$}  {:<dur_w$}  {}",
            row.start, row.duration, row.command
        );

        let label = status(row.status, &format!("{label:<status_w$}"));

        if row.status.is_terminal() {
            writeln!(w, "{}  {label}  {}", muted(&id), muted(&rest))?;
        } else {
            writeln!(w, "{id}  {label}  {rest}")?;
        }
    }

    Ok(())
}
