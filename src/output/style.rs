use crate::model::JobStatus;
use std::sync::atomic::{AtomicBool, Ordering};

static COLORS_ENABLED: AtomicBool = AtomicBool::new(true);

#[derive(Debug, Clone, Copy)]
enum Sgr {
    Bold = 1,
    Dim = 2,
    Red = 31,
    Green = 32,
    Yellow = 33,
    BrightCyan = 96,
}

pub fn configure(no_color: bool) {
    COLORS_ENABLED.store(wants_color(no_color), Ordering::Relaxed);
}

fn wants_color(no_color: bool) -> bool {
    if std::env::var("CLICOLOR_FORCE").ok().as_deref() == Some("1") {
        return true;
    }

    if no_color || std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    !std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb"))
}

fn paint(sgr: Sgr, text: &str) -> String {
    if text.is_empty() || !COLORS_ENABLED.load(Ordering::Relaxed) {
        return text.to_string();
    }

    format!("\x1b[{}m{text}\x1b[0m", sgr as u8)
}

pub fn bold(text: &str) -> String {
    paint(Sgr::Bold, text)
}

pub fn muted(text: &str) -> String {
    paint(Sgr::Dim, text)
}

pub fn success(text: &str) -> String {
    paint(Sgr::Green, text)
}

pub fn failure(text: &str) -> String {
    paint(Sgr::Red, text)
}

pub fn warning(text: &str) -> String {
    paint(Sgr::Yellow, text)
}

pub fn info(text: &str) -> String {
    paint(Sgr::BrightCyan, text)
}

pub fn command(text: &str) -> String {
    paint(Sgr::BrightCyan, text)
}

pub fn number(text: &str) -> String {
    paint(Sgr::BrightCyan, text)
}

pub fn status(status: JobStatus, text: &str) -> String {
    match status {
        JobStatus::Running => success(text),
        JobStatus::Incomplete => warning(text),
        JobStatus::Done => muted(text),
        JobStatus::Failed(_) | JobStatus::Killed | JobStatus::Orphaned => failure(text),
    }
}
