use colored::*;
use jiff::Timestamp;
use jiff::tz::TimeZone;

use crate::models::task::{Priority, Task};

/// Get the terminal width, defaulting to 80 if unavailable
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(80)
}

/// First segment of the UUID, enough to address a task from the CLI
pub fn short_id(task: &Task) -> String {
    task.id.to_string().chars().take(8).collect()
}

/// Get the appropriate status glyph for a task
pub fn get_status_glyph(task: &Task, now: Timestamp) -> ColoredString {
    if task.completed {
        "✓".dimmed()
    } else if task.time_tracking.is_active {
        "▶".green()
    } else if task.is_overdue(now) {
        "●".red()
    } else {
        "○".normal()
    }
}

pub fn priority_label(priority: Priority) -> ColoredString {
    match priority {
        Priority::High => "high".red(),
        Priority::Medium => "medium".yellow(),
        Priority::Low => "low".blue(),
    }
}

/// Build the right-aligned context string for a task: category and due
/// date, when they carry information.
fn get_task_context(task: &Task, now: Timestamp) -> Option<String> {
    let mut parts = Vec::new();

    if task.category != crate::models::task::DEFAULT_CATEGORY {
        parts.push(task.category.clone());
    }
    if let Some(due) = task.due_date {
        if task.is_overdue(now) {
            parts.push(format!("overdue {}", format_date_label(due)));
        } else if task.is_due_today(now) {
            parts.push("due today".to_string());
        } else {
            parts.push(format!("due {}", format_date_label(due)));
        }
    }
    if task.time_tracking.total_time > 0 {
        parts.push(format_duration(task.time_tracking.total_time));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" · "))
    }
}

/// Render a single task line with id, glyph, priority, title, and a
/// right-aligned context section.
pub fn render_task_line(task: &Task, now: Timestamp) {
    let terminal_width = get_terminal_width();

    let id_str = short_id(task);
    let glyph = get_status_glyph(task, now);
    let title = &task.title;

    // Pad before coloring so the ANSI codes do not skew the alignment
    let priority_padded = format!("{:<6}", task.priority.as_str());
    let priority = match task.priority {
        Priority::High => priority_padded.red(),
        Priority::Medium => priority_padded.yellow(),
        Priority::Low => priority_padded.blue(),
    };

    let left_visible = format!("  {}  {}  {}  {}", id_str, " ", priority_padded, title);
    let styled_title = if task.completed {
        title.dimmed()
    } else {
        title.bold()
    };

    let left = format!("  {}  {}  {}  {}", id_str.dimmed(), glyph, priority, styled_title);

    match get_task_context(task, now) {
        Some(context) if left_visible.len() + context.len() + 4 < terminal_width => {
            let padding = terminal_width - left_visible.len() - context.len() - 2;
            println!("{}{}{}", left, " ".repeat(padding), context.dimmed());
        }
        Some(context) => {
            println!("{}", left);
            println!("    {}", context.dimmed());
        }
        None => println!("{}", left),
    }
}

/// Multi-line detail view used by `show`
pub fn render_task_detail(task: &Task, now: Timestamp) {
    println!();
    println!("  {}  {}", get_status_glyph(task, now), task.title.bold());
    println!();
    println!("  {}  {}", "Id:".dimmed(), task.id);
    println!("  {}  {}", "Priority:".dimmed(), priority_label(task.priority));
    println!("  {}  {}", "Category:".dimmed(), task.category);
    if !task.description.is_empty() {
        println!("  {}  {}", "Notes:".dimmed(), task.description);
    }
    match task.due_date {
        Some(due) if task.is_overdue(now) => {
            println!("  {}  {}", "Due:".dimmed(), format_date_label(due).red())
        }
        Some(due) => println!("  {}  {}", "Due:".dimmed(), format_date_label(due)),
        None => {}
    }
    println!("  {}  {}", "Created:".dimmed(), format_date_label(task.created_at));
    println!("  {}  {}", "Updated:".dimmed(), format_date_label(task.updated_at));

    let tracking = &task.time_tracking;
    if tracking.is_active || !tracking.sessions.is_empty() {
        println!();
        if let Some(elapsed) = tracking.current_duration(now) {
            println!(
                "  {}  {} {}",
                "Timer:".dimmed(),
                "running".green(),
                format!("({})", format_duration(elapsed)).dimmed()
            );
        }
        println!(
            "  {}  {} across {} {}",
            "Tracked:".dimmed(),
            format_duration(tracking.total_time),
            tracking.sessions.len(),
            if tracking.sessions.len() == 1 {
                "session"
            } else {
                "sessions"
            }
        );
    }
    println!();
}

/// Format a timestamp relative to today (e.g. "Today", "Yesterday",
/// "Feb 15")
pub fn format_date_label(timestamp: Timestamp) -> String {
    let zoned = jiff::Zoned::new(timestamp, TimeZone::system());
    let date = zoned.date();
    let today = jiff::Zoned::now().date();

    if date == today {
        "Today".to_string()
    } else if Some(date) == today.yesterday().ok() {
        "Yesterday".to_string()
    } else if Some(date) == today.tomorrow().ok() {
        "Tomorrow".to_string()
    } else {
        date.strftime("%b %d, %Y").to_string()
    }
}

/// Format milliseconds as "2h 15m 3s", dropping leading zero components
pub fn format_duration(millis: i64) -> String {
    let total_seconds = millis / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Render a view header with title and count
pub fn render_view_header(title: &str, count: usize) {
    let task_word = if count == 1 { "task" } else { "tasks" };
    println!("\n  {} ({} {})\n", title.cyan().bold(), count, task_word);
}
