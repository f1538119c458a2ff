// Colored terminal output for analysis runs.
//
// Used by `topical analyze`. The web server never prints; it streams the
// same events as JSON instead.

use colored::Colorize;

use super::truncate_chars;
use crate::pipeline::{AnalysisResult, StreamEvent};

/// Print one stream event as it arrives.
pub fn display_event(event: &StreamEvent) {
    match event {
        StreamEvent::Progress { message, progress } => {
            println!("  {} {}", format!("[{progress:>3}%]").dimmed(), message);
        }
        StreamEvent::Complete { data } => display_result(data),
        StreamEvent::Error { error, traceback } => {
            println!("\n{} {}", "Error:".red().bold(), error);
            if !traceback.is_empty() {
                println!("{}", traceback.dimmed());
            }
        }
    }
}

/// Display the ranked topic table and summary.
pub fn display_result(result: &AnalysisResult) {
    println!(
        "\n{}",
        format!(
            "=== {} ({} topics from {} comments) ===",
            result.post_title, result.num_topics, result.num_comments
        )
        .bold()
    );

    if result.topics.is_empty() {
        println!("  No topics found. Comments may be too dispersed to cluster.");
    } else {
        println!();
        println!(
            "  {:>4}  {:<40} {:>6}  {:>7}  {}",
            "ID".dimmed(),
            "Label".dimmed(),
            "Count".dimmed(),
            "Share".dimmed(),
            "Keywords".dimmed(),
        );
        println!("  {}", "-".repeat(90).dimmed());

        for topic in &result.topics {
            println!(
                "  {:>4}  {:<40} {:>6}  {:>6.2}%  {}",
                topic.id,
                truncate_chars(&topic.label, 37),
                topic.count,
                topic.percentage,
                topic.words.join(", ").cyan(),
            );
        }
    }

    println!();
    let model_used = if result.openai_enhanced {
        result.model_used.green()
    } else {
        result.model_used.yellow()
    };
    println!("  Labels: {model_used}");

    if let Some(summary) = &result.summary {
        println!("\n{}", "Summary".bold());
        println!("  {summary}");
    }
}
