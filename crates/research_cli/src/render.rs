use research_client::research_core::{ResearchHistory, ResearchReport, UserProfile};
use research_client::{PollEvent, PollSink};

pub fn user(user: &UserProfile) -> String {
    let mut line = format!("{} <{}>", user.username, user.email);
    if user.provisional {
        line.push_str(" (unconfirmed)");
    }
    line
}

pub fn report(report: &ResearchReport) -> String {
    let mut out = format!("# {}\n\n{}\n", report.topic, report.summary);
    for section in &report.sections {
        out.push_str(&format!("\n## {}\n\n{}\n", section.title, section.content));
    }
    if !report.sources.is_empty() {
        out.push_str("\n## Sources\n\n");
        for (index, source) in report.sources.iter().enumerate() {
            out.push_str(&format!("{}. {} - {}\n", index + 1, source.title, source.url));
            if let Some(snippet) = &source.snippet {
                out.push_str(&format!("   {snippet}\n"));
            }
        }
    }
    out
}

pub fn history(history: &ResearchHistory) -> String {
    if history.is_empty() {
        return "No research yet.".to_string();
    }
    history
        .researches
        .iter()
        .map(|entry| format!("{}  {}  {}", entry.id, entry.created_at, entry.topic))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prints poll progress to stderr.
pub struct ProgressPrinter;

impl PollSink for ProgressPrinter {
    fn emit(&self, event: PollEvent) {
        match event {
            PollEvent::StatusChecked { check, status } => {
                eprintln!("[check {check}] {status:?}");
            }
            PollEvent::TransientError { message } => {
                eprintln!("Status check failed, retrying: {message}");
            }
            PollEvent::Finished { phase } => eprintln!("Finished: {phase:?}"),
        }
    }
}
