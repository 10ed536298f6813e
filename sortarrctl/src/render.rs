use sortarr_core::{BatchSummary, JobStatus, ProgressUpdate};
use tracing::Level;

pub fn progress_line(update: &ProgressUpdate) -> Option<String> {
    let position = update.position;
    let name = &update.file_name;
    match update.status {
        JobStatus::Pending => Some(format!("[....] ({position}) {name}")),
        // the prompt says enough
        JobStatus::AwaitingUser => None,
        JobStatus::Resolved => Some(match &update.destination {
            Some(dest) => format!("[ ok ] ({position}) {name} -> {}", dest.display()),
            None => format!("[ ok ] ({position}) {name}"),
        }),
        JobStatus::Skipped => Some(format!(
            "[skip] ({position}) {name}: {}",
            update.reason.as_deref().unwrap_or("skipped")
        )),
        JobStatus::Failed => Some(format!(
            "[FAIL] ({position}) {name}: {}",
            update.reason.as_deref().unwrap_or("failed")
        )),
    }
}

/// Worker log lines worth showing next to the progress output.
pub fn log_line(level: Level, text: &str) -> Option<String> {
    if level == Level::ERROR {
        Some(format!("error: {text}"))
    } else if level == Level::WARN {
        Some(format!("warning: {text}"))
    } else {
        None
    }
}

pub fn summary_line(summary: &BatchSummary) -> String {
    format!("Done: {summary}")
}
