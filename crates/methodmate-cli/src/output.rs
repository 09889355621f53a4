use std::io::Write;

use methodmate_core::{EnrichedPaper, ExtractionOutcome, ProgressEvent, VenueMatch};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

fn shorten(title: &str, max: usize) -> String {
    if title.chars().count() > max {
        format!("{}...", title.chars().take(max).collect::<String>())
    } else {
        title.to_string()
    }
}

/// Print a real-time progress event.
pub fn print_progress(
    w: &mut dyn Write,
    event: &ProgressEvent,
    color: ColorMode,
) -> std::io::Result<()> {
    match event {
        ProgressEvent::Started {
            index,
            total,
            title,
        } => {
            writeln!(w, "[{}/{}] Extracting: \"{}\"", index + 1, total, shorten(title, 50))?;
        }
        ProgressEvent::Finished {
            index,
            total,
            method_found,
            ..
        } => {
            let idx = index + 1;
            match (method_found, color.enabled()) {
                (true, true) => writeln!(w, "[{}/{}] -> {}", idx, total, "FOUND".green())?,
                (true, false) => writeln!(w, "[{}/{}] -> FOUND", idx, total)?,
                (false, true) => writeln!(w, "[{}/{}] -> {}", idx, total, "NOT FOUND".red())?,
                (false, false) => writeln!(w, "[{}/{}] -> NOT FOUND", idx, total)?,
            }
        }
        ProgressEvent::Cancelled { index, total, .. } => {
            if color.enabled() {
                writeln!(w, "[{}/{}] -> {}", index + 1, total, "CANCELLED".yellow())?;
            } else {
                writeln!(w, "[{}/{}] -> CANCELLED", index + 1, total)?;
            }
        }
    }
    Ok(())
}

/// Print one venue classification line.
pub fn print_venue(
    w: &mut dyn Write,
    venue: &str,
    result: &VenueMatch,
    color: ColorMode,
) -> std::io::Result<()> {
    match (&result.canonical_name, color.enabled()) {
        (Some(name), true) => writeln!(w, "{} {} ({})", "TOP VENUE".green().bold(), venue, name),
        (Some(name), false) => writeln!(w, "TOP VENUE {} ({})", venue, name),
        (None, true) => writeln!(w, "{} {}", "not a top venue:".dimmed(), venue),
        (None, false) => writeln!(w, "not a top venue: {}", venue),
    }
}

/// Print the extracted methodology for every paper.
pub fn print_report(
    w: &mut dyn Write,
    results: &[EnrichedPaper],
    color: ColorMode,
) -> std::io::Result<()> {
    for (i, result) in results.iter().enumerate() {
        let title = &result.paper.title;
        if color.enabled() {
            writeln!(w, "{}. {}", i + 1, title.bold())?;
        } else {
            writeln!(w, "{}. {}", i + 1, title)?;
        }

        if let Some(venue) = &result.paper.venue {
            let tag = if result.venue.matched { " [top venue]" } else { "" };
            writeln!(w, "   Venue: {}{}", venue, tag)?;
        }

        if result.cancelled {
            writeln!(w, "   (cancelled)")?;
        } else if let Some(err) = &result.fetch_error {
            writeln!(w, "   Full text unavailable: {}", err)?;
        }

        match &result.method {
            ExtractionOutcome::Found { text, provenance } => {
                if color.enabled() {
                    writeln!(w, "   Method [{}]:", provenance.cyan())?;
                } else {
                    writeln!(w, "   Method [{}]:", provenance)?;
                }
                for line in text.lines() {
                    writeln!(w, "     {}", line)?;
                }
            }
            ExtractionOutcome::NotFound => {
                if color.enabled() {
                    writeln!(w, "   {}", "No methodology found".dimmed())?;
                } else {
                    writeln!(w, "   No methodology found")?;
                }
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Print the final counts.
pub fn print_summary(
    w: &mut dyn Write,
    results: &[EnrichedPaper],
    color: ColorMode,
) -> std::io::Result<()> {
    let found = results.iter().filter(|r| r.method.is_found()).count();
    let top = results.iter().filter(|r| r.venue.matched).count();
    let cancelled = results.iter().filter(|r| r.cancelled).count();

    if color.enabled() {
        writeln!(w, "{}", "SUMMARY".bold())?;
    } else {
        writeln!(w, "SUMMARY")?;
    }
    writeln!(w, "  Papers:          {}", results.len())?;
    writeln!(w, "  Method found:    {}", found)?;
    writeln!(w, "  Top venues:      {}", top)?;
    if cancelled > 0 {
        writeln!(w, "  Cancelled:       {}", cancelled)?;
    }
    Ok(())
}
