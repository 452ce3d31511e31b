use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use uuid::Uuid;

use crate::{
    models::task::{Task, TaskDraft, TaskPatch},
    services::{
        query::{StatusFilter, TaskFilter, list_tasks},
        tasks::{
            CreateTaskError, UpdateTaskError, create_task, delete_task, find_all, find_by_category,
            find_by_id, get_categories, get_statistics, update_task,
        },
        timer::{
            TimerError, active_timer, start_timer, stop_all_timers, stop_timer,
            time_tracking_stats,
        },
    },
    storage::{Storage, json::JsonFileStorage},
};

mod models;
mod services;
mod storage;
mod ui;

#[derive(Parser)]
#[command(
    name = "trak",
    about = "A task manager with built-in time tracking for your terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks, filtered and sorted by priority then recency
    List {
        /// Filter by status: all, active, completed
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by priority: high, medium, low
        #[arg(short, long)]
        priority: Option<String>,

        /// Filter by exact category
        #[arg(short, long)]
        category: Option<String>,

        /// Keep tasks whose title, notes, or category contain this text
        #[arg(short = 'q', long)]
        search: Option<String>,
    },

    /// Add a new task
    Add {
        /// Task title
        title: String,

        /// Add notes
        #[arg(short, long)]
        description: Option<String>,

        /// Set the priority: high, medium, low
        #[arg(short, long)]
        priority: Option<String>,

        /// Assign a category
        #[arg(short, long)]
        category: Option<String>,

        /// Set a due date (e.g. "2026-03-01" or "2026-03-01T09:00:00Z")
        #[arg(long)]
        due: Option<String>,
    },

    /// Show the full detail of one task
    Show {
        /// Task id, id prefix, or part of the title
        task: String,
    },

    /// Edit fields of a task; unset flags leave fields untouched
    Edit {
        /// Task id, id prefix, or part of the title
        task: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New notes
        #[arg(short, long)]
        description: Option<String>,

        /// New priority: high, medium, low
        #[arg(short, long)]
        priority: Option<String>,

        /// New category
        #[arg(short, long)]
        category: Option<String>,

        /// New due date
        #[arg(long)]
        due: Option<String>,

        /// Remove the due date
        #[arg(long, conflicts_with = "due")]
        clear_due: bool,
    },

    /// Complete a task
    Done {
        /// Task id, id prefix, or part of the title
        task: String,
    },

    /// Mark a completed task as active again
    Reopen {
        /// Task id, id prefix, or part of the title
        task: String,
    },

    /// Delete a task
    Delete {
        /// Task id, id prefix, or part of the title
        task: String,
    },

    /// List the categories in use
    Categories,

    /// Show completion statistics
    Stats,

    /// Track time spent on tasks
    #[command(subcommand)]
    Timer(TimerCommands),
}

#[derive(Debug, Subcommand)]
enum TimerCommands {
    /// Start the timer on a task, stopping any other running timer
    Start { task: String },
    /// Stop the timer on a task, finalizing the session
    Stop { task: String },
    /// Show the currently running timer
    Status,
    /// Stop every running timer
    StopAll,
    /// Show aggregate time-tracking statistics
    Stats,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let storage_path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trak")
        .join("tasks.json");
    let storage = JsonFileStorage::new(storage_path);

    match cli.command {
        Some(Commands::List {
            status,
            priority,
            category,
            search,
        }) => {
            run_list(&storage, status, priority, category, search);
        }
        Some(Commands::Add {
            title,
            description,
            priority,
            category,
            due,
        }) => {
            let draft = TaskDraft {
                title,
                description,
                priority,
                category,
                due_date: due,
            };

            match create_task(&storage, draft) {
                Ok(task) => {
                    println!("✓ Task added: {}", task.title);
                    println!("  {}", ui::short_id(&task).dimmed());
                }
                Err(CreateTaskError::Validation(violations)) => {
                    eprintln!("Error: The task is not valid:");
                    for violation in violations {
                        eprintln!("  - {}", violation);
                    }
                    std::process::exit(1);
                }
                Err(CreateTaskError::Storage(e)) => {
                    eprintln!("Error: Failed to save task: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Show { task }) => {
            let task = resolve_task(&storage, &task);
            ui::render_task_detail(&task, jiff::Timestamp::now());
        }
        Some(Commands::Edit {
            task,
            title,
            description,
            priority,
            category,
            due,
            clear_due,
        }) => {
            let target = resolve_task(&storage, &task);
            let patch = TaskPatch {
                title,
                description,
                completed: None,
                priority,
                category,
                due_date: if clear_due { Some(None) } else { due.map(Some) },
            };

            match update_task(&storage, target.id, patch) {
                Ok(task) => println!("✓ Task updated: {}", task.title),
                Err(e) => exit_update_error(e),
            }
        }
        Some(Commands::Done { task }) => {
            let target = resolve_task(&storage, &task);
            let patch = TaskPatch {
                completed: Some(true),
                ..TaskPatch::default()
            };

            match update_task(&storage, target.id, patch) {
                Ok(task) => println!("✓ Task completed: {}", task.title),
                Err(e) => exit_update_error(e),
            }
        }
        Some(Commands::Reopen { task }) => {
            let target = resolve_task(&storage, &task);
            let patch = TaskPatch {
                completed: Some(false),
                ..TaskPatch::default()
            };

            match update_task(&storage, target.id, patch) {
                Ok(task) => println!("✓ Task reopened: {}", task.title),
                Err(e) => exit_update_error(e),
            }
        }
        Some(Commands::Delete { task }) => {
            let target = resolve_task(&storage, &task);

            match delete_task(&storage, target.id) {
                Ok(true) => println!("✓ Task deleted: {}", target.title),
                Ok(false) => {
                    eprintln!("Error: Task '{}' not found", target.id);
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Error: Failed to delete task: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(Commands::Categories) => {
            let categories = match get_categories(&storage) {
                Ok(categories) => categories,
                Err(e) => {
                    eprintln!("Error: Failed to load categories: {}", e);
                    std::process::exit(1);
                }
            };

            if categories.is_empty() {
                println!("No categories found");
            } else {
                let mut categories: Vec<_> = categories.into_iter().collect();
                categories.sort_by_key(|c| c.to_lowercase());

                println!(
                    "{} ({})\n",
                    "CATEGORIES".cyan(),
                    categories.len()
                );
                for category in categories {
                    let count = find_by_category(&storage, &category)
                        .map(|tasks| tasks.len())
                        .unwrap_or(0);
                    println!(
                        "  {} {} {}",
                        "•".green(),
                        category.bold(),
                        format!("({} {})", count, if count == 1 { "task" } else { "tasks" })
                            .dimmed()
                    );
                }
            }
        }
        Some(Commands::Stats) => match get_statistics(&storage) {
            Ok(stats) => {
                println!("\n  {}\n", "STATISTICS".cyan().bold());
                println!("  {}  {}", "Total:".dimmed(), stats.total);
                println!("  {}  {}", "Completed:".dimmed(), stats.completed);
                println!("  {}  {}", "Active:".dimmed(), stats.active);
                println!(
                    "  {}  {:.1}%",
                    "Completion:".dimmed(),
                    stats.completion_rate
                );
                println!();
            }
            Err(e) => {
                eprintln!("Error: Failed to compute statistics: {}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Timer(timer_command)) => run_timer(&storage, timer_command),
        None => {
            // Default: list everything, same as `trak list`
            run_list(&storage, None, None, None, None);
        }
    }
}

fn run_list(
    storage: &impl Storage,
    status: Option<String>,
    priority: Option<String>,
    category: Option<String>,
    search: Option<String>,
) {
    let status = match status {
        None => StatusFilter::All,
        Some(raw) => match raw.parse::<StatusFilter>() {
            Ok(status) => status,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };
    let priority = match priority {
        None => None,
        Some(raw) => match raw.parse::<crate::models::task::Priority>() {
            Ok(priority) => Some(priority),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };

    let filter = TaskFilter {
        status,
        priority,
        category,
        search,
    };

    match list_tasks(storage, &filter) {
        Ok(tasks) => {
            if tasks.is_empty() {
                println!("No tasks found");
            } else {
                let now = jiff::Timestamp::now();
                ui::render_view_header("Tasks", tasks.len());
                for task in &tasks {
                    ui::render_task_line(task, now);
                }
                println!();
            }
        }
        Err(e) => {
            eprintln!("Error: Failed to list tasks: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_timer(storage: &impl Storage, command: TimerCommands) {
    match command {
        TimerCommands::Start { task } => {
            let target = resolve_task(storage, &task);
            match start_timer(storage, target.id) {
                Ok(task) => println!("▶ Timer started: {}", task.title),
                Err(TimerError::AlreadyActive(_)) => {
                    eprintln!("Error: Timer is already running on '{}'", target.title);
                    std::process::exit(1);
                }
                Err(e) => exit_timer_error(e),
            }
        }
        TimerCommands::Stop { task } => {
            let target = resolve_task(storage, &task);
            match stop_timer(storage, target.id) {
                Ok(task) => {
                    println!("■ Timer stopped: {}", task.title);
                    if let Some(session) = task.time_tracking.sessions.last() {
                        println!(
                            "  {} this session, {} total",
                            ui::format_duration(session.duration),
                            ui::format_duration(task.time_tracking.total_time)
                        );
                    }
                }
                Err(TimerError::NoActiveSession(_)) => {
                    eprintln!("Error: No timer is running on '{}'", target.title);
                    std::process::exit(1);
                }
                Err(e) => exit_timer_error(e),
            }
        }
        TimerCommands::Status => match active_timer(storage) {
            Ok(Some(active)) => {
                println!("▶ {}", active.title.bold());
                println!(
                    "  started {}, running for {}",
                    ui::format_date_label(active.started_at),
                    ui::format_duration(active.elapsed_ms)
                );
            }
            Ok(None) => println!("No active timer"),
            Err(e) => {
                eprintln!("Error: Failed to read timer state: {}", e);
                std::process::exit(1);
            }
        },
        TimerCommands::StopAll => match stop_all_timers(storage) {
            Ok(stopped) if stopped.is_empty() => println!("No timers were running"),
            Ok(stopped) => {
                for task in stopped {
                    println!(
                        "■ Timer stopped: {} {}",
                        task.title,
                        ui::short_id(&task).dimmed()
                    );
                }
            }
            Err(e) => {
                eprintln!("Error: Failed to stop timers: {}", e);
                std::process::exit(1);
            }
        },
        TimerCommands::Stats => match time_tracking_stats(storage) {
            Ok(stats) => {
                println!("\n  {}\n", "TIME TRACKING".cyan().bold());
                println!(
                    "  {}  {}",
                    "Total tracked:".dimmed(),
                    ui::format_duration(stats.total_time_tracked)
                );
                println!(
                    "  {}  {}",
                    "Tasks with time:".dimmed(),
                    stats.tasks_with_time_count
                );
                println!("  {}  {}", "Sessions:".dimmed(), stats.total_sessions);
                println!(
                    "  {}  {}",
                    "Average session:".dimmed(),
                    ui::format_duration(stats.average_session_duration as i64)
                );
                println!();
            }
            Err(e) => {
                eprintln!("Error: Failed to compute time-tracking statistics: {}", e);
                std::process::exit(1);
            }
        },
    }
}

fn load_all_or_exit(storage: &impl Storage) -> Vec<Task> {
    match find_all(storage) {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("Error: Failed to load tasks: {}", e);
            std::process::exit(1);
        }
    }
}

/// Resolves user input to a single task: a full id, an unambiguous id
/// prefix, or a case-insensitive fragment of the title. The services
/// stay exact-id; this convenience lives at the CLI boundary only.
fn resolve_task(storage: &impl Storage, input: &str) -> Task {
    if let Ok(id) = Uuid::parse_str(input) {
        match find_by_id(storage, id) {
            Ok(Some(task)) => return task,
            Ok(None) => {
                eprintln!("Error: Task '{}' not found", input);
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("Error: Failed to load tasks: {}", e);
                std::process::exit(1);
            }
        }
    }

    let tasks = load_all_or_exit(storage);
    let needle = input.to_lowercase();

    let prefix_matches: Vec<_> = tasks
        .iter()
        .filter(|t| t.id.to_string().starts_with(&needle))
        .collect();
    if prefix_matches.len() == 1 {
        return prefix_matches[0].clone();
    }

    let title_matches: Vec<_> = tasks
        .iter()
        .filter(|t| t.title.to_lowercase().contains(&needle))
        .collect();
    match title_matches.len() {
        0 => {
            eprintln!("Error: Task '{}' not found", input);
            std::process::exit(1);
        }
        1 => title_matches[0].clone(),
        _ => {
            eprintln!("Error: Task reference is ambiguous. Multiple tasks found:");
            for task in title_matches {
                eprintln!("  - {}  {}", ui::short_id(task), task.title);
            }
            eprintln!("\nPlease use the task id.");
            std::process::exit(1);
        }
    }
}

fn exit_update_error(error: UpdateTaskError) -> ! {
    match error {
        UpdateTaskError::TaskNotFound(id) => {
            eprintln!("Error: Task '{}' not found", id);
        }
        UpdateTaskError::Validation(violations) => {
            eprintln!("Error: The task is not valid:");
            for violation in violations {
                eprintln!("  - {}", violation);
            }
        }
        UpdateTaskError::Storage(e) => {
            eprintln!("Error: Failed to save task: {}", e);
        }
    }
    std::process::exit(1);
}

fn exit_timer_error(error: TimerError) -> ! {
    match error {
        TimerError::TaskNotFound(id) => eprintln!("Error: Task '{}' not found", id),
        TimerError::AlreadyActive(id) => {
            eprintln!("Error: Timer is already running on task '{}'", id)
        }
        TimerError::NoActiveSession(id) => {
            eprintln!("Error: No timer is running on task '{}'", id)
        }
        TimerError::Storage(e) => eprintln!("Error: Failed to save task: {}", e),
    }
    std::process::exit(1);
}
