use std::io::{self, IsTerminal, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use prhub::{
    CheckStatus, Dashboard, DisplayMode, DisplayOptions, PullRequestItem, ReviewQueue, Tab,
};
use serde::Serialize;

const COLUMN_SEPARATOR: &str = "  ";
const TITLE_TRUNCATION_SUFFIX: &str = "...";
const MIN_TITLE_WIDTH_FOR_TRUNCATION: usize = 3;

const AUTHORED_HEADERS: &[&str] = &["URL", "CI", "APP", "CHG", "COMMENTS", "CREATED", "TITLE"];
const REVIEW_HEADERS: &[&str] = &["URL", "AUTHOR", "MY REVIEW", "CREATED", "TITLE"];
const MERGED_HEADERS: &[&str] = &["URL", "BASE", "MERGED", "TITLE"];

const EMPTY_AUTHORED: &str = "No open PRs assigned to you.";
const EMPTY_PENDING: &str = "No pending reviews.";
const EMPTY_MERGED: &str = "No recently merged PRs.";

/// One titled list of pull requests rendered as a table. The title is
/// always the last column so it can be truncated to fit.
struct Section<'a> {
    heading: Option<String>,
    headers: &'static [&'static str],
    items: Vec<&'a PullRequestItem>,
    row: fn(&PullRequestItem) -> Vec<String>,
    /// `None` hides the section entirely when it has no rows.
    empty_message: Option<&'static str>,
}

fn format_relative_time(time: DateTime<Utc>) -> String {
    use chrono_humanize::HumanTime;
    HumanTime::from(time).to_string()
}

fn format_check_status(status: Option<CheckStatus>) -> &'static str {
    match status {
        Some(CheckStatus::Success) => "✓",
        Some(CheckStatus::Failure) => "✗",
        Some(CheckStatus::Pending) => "●",
        None => "-",
    }
}

fn format_count<T: ToString>(count: Option<T>) -> String {
    count.map_or_else(|| "-".to_string(), |count| count.to_string())
}

fn authored_row(item: &PullRequestItem) -> Vec<String> {
    vec![
        item.html_url.clone(),
        format_check_status(item.check_status).to_string(),
        format_count(item.approvals),
        format_count(item.changes_requested),
        item.total_comments.unwrap_or(item.comments).to_string(),
        format_relative_time(item.created_at),
        item.title.clone(),
    ]
}

fn review_row(item: &PullRequestItem) -> Vec<String> {
    vec![
        item.html_url.clone(),
        item.author_login().unwrap_or("-").to_string(),
        item.my_review_status
            .map_or("-", |status| status.label())
            .to_string(),
        format_relative_time(item.created_at),
        item.title.clone(),
    ]
}

fn merged_row(item: &PullRequestItem) -> Vec<String> {
    vec![
        item.html_url.clone(),
        item.base_ref.clone().unwrap_or_else(|| "-".to_string()),
        item.merged_at
            .map_or_else(|| "-".to_string(), format_relative_time),
        item.title.clone(),
    ]
}

fn authored_section(items: &[PullRequestItem], heading: Option<String>) -> Section<'_> {
    Section {
        heading,
        headers: AUTHORED_HEADERS,
        items: items.iter().collect(),
        row: authored_row,
        empty_message: Some(EMPTY_AUTHORED),
    }
}

fn review_sections(queue: ReviewQueue<'_>) -> [Section<'_>; 2] {
    [
        Section {
            heading: Some(format!("Pending review ({})", queue.pending.len())),
            headers: REVIEW_HEADERS,
            items: queue.pending,
            row: review_row,
            empty_message: Some(EMPTY_PENDING),
        },
        Section {
            heading: Some(format!("Reviewed ({})", queue.reviewed.len())),
            headers: REVIEW_HEADERS,
            items: queue.reviewed,
            row: review_row,
            empty_message: None,
        },
    ]
}

fn merged_section(items: &[PullRequestItem], heading: Option<String>) -> Section<'_> {
    Section {
        heading,
        headers: MERGED_HEADERS,
        items: items.iter().collect(),
        row: merged_row,
        empty_message: Some(EMPTY_MERGED),
    }
}

/// Width of the terminal the user is looking at, even when stdout is
/// redirected (e.g. under `watch`).
#[cfg(unix)]
fn query_tty_width() -> Option<usize> {
    let tty = std::fs::File::open("/dev/tty").ok()?;
    terminal_size::terminal_size_of(&tty).map(|(w, _)| w.0 as usize)
}

#[cfg(not(unix))]
fn query_tty_width() -> Option<usize> {
    None
}

fn get_terminal_width(width_override: Option<usize>, force_truncate: bool) -> usize {
    if let Some(width) = width_override {
        width
    } else if !force_truncate {
        usize::MAX
    } else if io::stdout().is_terminal() {
        terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(usize::MAX)
    } else {
        query_tty_width()
            .or_else(|| std::env::var("COLUMNS").ok().and_then(|c| c.parse().ok()))
            .unwrap_or(usize::MAX)
    }
}

fn display_width(text: &str) -> usize {
    text.chars().count()
}

fn calculate_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| display_width(h)).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(display_width(cell));
            }
        }
    }

    widths
}

fn truncate_title(title: &str, width: usize) -> String {
    let keep = width.saturating_sub(TITLE_TRUNCATION_SUFFIX.len());
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str(TITLE_TRUNCATION_SUFFIX);
    truncated
}

fn apply_title_truncation(rows: &mut [Vec<String>], widths: &mut [usize], terminal_width: usize) {
    if terminal_width == usize::MAX || widths.is_empty() {
        return;
    }

    let title_index = widths.len() - 1;
    let separator_width = COLUMN_SEPARATOR.len() * title_index;
    let non_title_width: usize = widths[..title_index].iter().sum::<usize>() + separator_width;

    if non_title_width >= terminal_width {
        return;
    }

    let available_title_width = terminal_width - non_title_width;
    if widths[title_index] > available_title_width
        && available_title_width > MIN_TITLE_WIDTH_FOR_TRUNCATION
    {
        widths[title_index] = available_title_width;

        for row in rows {
            if let Some(title) = row.get_mut(title_index)
                && display_width(title) > available_title_width
            {
                *title = truncate_title(title, available_title_width);
            }
        }
    }
}

fn write_padded<W: Write>(writer: &mut W, cell: &str, width: usize) -> Result<()> {
    let padding = width.saturating_sub(display_width(cell));
    write!(writer, "{cell}{}", " ".repeat(padding))?;
    Ok(())
}

fn render_row<W: Write, S: AsRef<str>>(cells: &[S], widths: &[usize], writer: &mut W) -> Result<()> {
    let last = cells.len().saturating_sub(1);
    for (i, cell) in cells.iter().enumerate() {
        if i == last {
            // No trailing padding on the final column.
            write!(writer, "{}", cell.as_ref())?;
        } else {
            write_padded(writer, cell.as_ref(), widths[i])?;
            write!(writer, "{COLUMN_SEPARATOR}")?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn render_table_separator<W: Write>(widths: &[usize], writer: &mut W) -> Result<()> {
    let dashes: Vec<String> = widths.iter().map(|&width| "-".repeat(width)).collect();
    writeln!(writer, "{}", dashes.join(COLUMN_SEPARATOR))?;
    Ok(())
}

fn render_table<W: Write>(
    headers: &[&str],
    mut rows: Vec<Vec<String>>,
    terminal_width: usize,
    writer: &mut W,
) -> Result<()> {
    let mut widths = calculate_column_widths(headers, &rows);
    apply_title_truncation(&mut rows, &mut widths, terminal_width);

    render_row(headers, &widths, writer)?;
    render_table_separator(&widths, writer)?;
    for row in &rows {
        render_row(row, &widths, writer)?;
    }
    Ok(())
}

fn visible_items<'s, 'a>(
    items: &'s [&'a PullRequestItem],
    limit: Option<usize>,
) -> (&'s [&'a PullRequestItem], usize) {
    let shown = limit.map_or(items.len(), |limit| limit.min(items.len()));
    (&items[..shown], items.len() - shown)
}

/// Renders one section; returns whether anything was written.
fn render_section<W: Write>(
    section: &Section<'_>,
    options: &DisplayOptions,
    terminal_width: usize,
    writer: &mut W,
) -> Result<bool> {
    if section.items.is_empty() && section.empty_message.is_none() {
        return Ok(false);
    }

    let (shown, remaining) = visible_items(&section.items, options.limit);

    if options.mode == DisplayMode::Quiet {
        for item in shown {
            writeln!(writer, "{}", item.html_url)?;
        }
        return Ok(!shown.is_empty());
    }

    if let Some(heading) = &section.heading {
        writeln!(writer, "{heading}")?;
    }

    if section.items.is_empty() {
        if let Some(message) = section.empty_message {
            writeln!(writer, "{message}")?;
        }
        return Ok(true);
    }

    let rows = shown.iter().map(|item| (section.row)(*item)).collect();
    render_table(section.headers, rows, terminal_width, writer)?;

    if remaining > 0 {
        writeln!(writer, "... {remaining} more (use --limit 0 to show all)")?;
    }
    Ok(true)
}

fn render_sections<W: Write>(
    sections: &[Section<'_>],
    options: &DisplayOptions,
    terminal_width: usize,
    writer: &mut W,
) -> Result<()> {
    let mut previous_written = false;
    for section in sections {
        let mut buffer = Vec::new();
        if !render_section(section, options, terminal_width, &mut buffer)? {
            continue;
        }
        if previous_written && options.mode != DisplayMode::Quiet {
            writeln!(writer)?;
        }
        writer.write_all(&buffer)?;
        previous_written = true;
    }
    Ok(())
}

fn write_json<W: Write, T: Serialize + ?Sized>(value: &T, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writeln!(writer)?;
    Ok(())
}

fn display_dashboard_with_width<W: Write>(
    tab: Tab,
    dashboard: &Dashboard,
    options: &DisplayOptions,
    width_override: Option<usize>,
    writer: &mut W,
) -> Result<()> {
    if options.mode == DisplayMode::Json {
        return match tab {
            Tab::Mine => write_json(&dashboard.authored, writer),
            Tab::Reviews => write_json(&dashboard.reviews, writer),
            Tab::Merged => write_json(&dashboard.merged, writer),
            Tab::All => write_json(dashboard, writer),
        };
    }

    let terminal_width = get_terminal_width(width_override, options.truncate_titles);

    let sections: Vec<Section<'_>> = match tab {
        Tab::Mine => vec![authored_section(&dashboard.authored, None)],
        Tab::Reviews => review_sections(dashboard.review_queue()).into(),
        Tab::Merged => vec![merged_section(&dashboard.merged, None)],
        Tab::All => {
            let mut sections = vec![authored_section(
                &dashboard.authored,
                Some(format!("My PRs ({})", dashboard.authored.len())),
            )];
            sections.extend(review_sections(dashboard.review_queue()));
            sections.push(merged_section(
                &dashboard.merged,
                Some(format!("Merged ({})", dashboard.merged.len())),
            ));
            sections
        }
    };

    render_sections(&sections, options, terminal_width, writer)
}

/// Prints the requested dashboard tab. Only the collections the tab needs
/// are expected to be populated.
pub fn display_dashboard<W: Write>(
    tab: Tab,
    dashboard: &Dashboard,
    options: &DisplayOptions,
    writer: &mut W,
) -> Result<()> {
    display_dashboard_with_width(tab, dashboard, options, None, writer)
}
