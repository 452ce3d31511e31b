use std::str::FromStr;

use jiff::Timestamp;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::time_tracking::TimeTracking;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MAX_DESCRIPTION_LENGTH: usize = 1000;
pub const MAX_CATEGORY_LENGTH: usize = 50;
pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Numeric rank used for ordering: high > medium > low.
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Priority must be one of: high, medium, low")]
pub struct ParsePriorityError;

impl FromStr for Priority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            _ => Err(ParsePriorityError),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// UUID to identify the task, assigned at creation
    pub id: Uuid,
    /// Title of the task, trimmed, 1..=200 characters
    pub title: String,
    /// Free-form notes, trimmed, up to 1000 characters
    #[serde(default)]
    pub description: String,
    /// Whether the task is done
    #[serde(default)]
    pub completed: bool,
    /// Priority of the task
    #[serde(default)]
    pub priority: Priority,
    /// Free-form grouping label, up to 50 characters
    #[serde(default = "default_category")]
    pub category: String,
    /// Optional deadline
    #[serde(default)]
    pub due_date: Option<Timestamp>,
    /// When the task was created, never changes afterwards
    pub created_at: Timestamp,
    /// Refreshed on every mutation
    pub updated_at: Timestamp,
    /// Embedded time-tracking record
    #[serde(default)]
    pub time_tracking: TimeTracking,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Raw input for creating a task. Unset fields fall back to defaults;
/// priority and due date arrive as text and are parsed during validation
/// so that a single call reports every violation at once.
#[derive(Debug, Default, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
}

/// Partial update. `None` leaves a field untouched; for the due date,
/// `Some(None)` explicitly clears it.
#[derive(Debug, Default, Clone)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<Option<String>>,
}

impl Task {
    /// Builds a task from raw input, applying defaults for every optional
    /// field. Returns the complete list of rule violations when invalid;
    /// nothing is generated or persisted in that case.
    pub fn from_draft(draft: TaskDraft, now: Timestamp) -> Result<Task, Vec<String>> {
        let mut violations = Vec::new();

        let title = draft.title.trim().to_string();
        let description = draft
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or_default();
        let category = draft.category.unwrap_or_else(default_category);

        let priority = match draft.priority {
            None => Priority::default(),
            Some(raw) => match raw.parse::<Priority>() {
                Ok(priority) => priority,
                Err(e) => {
                    violations.push(e.to_string());
                    Priority::default()
                }
            },
        };

        let due_date = match draft.due_date {
            None => None,
            Some(raw) => match parse_due_date(&raw) {
                Ok(ts) => Some(ts),
                Err(_) => {
                    violations.push(invalid_due_date_message());
                    None
                }
            },
        };

        violations.extend(validate_text_fields(&title, &description, &category));
        if !violations.is_empty() {
            return Err(violations);
        }

        Ok(Task {
            id: Uuid::new_v4(),
            title,
            description,
            completed: false,
            priority,
            category,
            due_date,
            created_at: now,
            updated_at: now,
            time_tracking: TimeTracking::default(),
        })
    }

    /// Applies the supplied fields only, bumps `updated_at`, then
    /// re-validates the entire resulting task. Callers work on a clone so
    /// a validation failure leaves the stored task untouched.
    pub fn apply_patch(&mut self, patch: TaskPatch, now: Timestamp) -> Result<(), Vec<String>> {
        let mut violations = Vec::new();

        if let Some(title) = patch.title {
            self.title = title.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(raw) = patch.priority {
            match raw.parse::<Priority>() {
                Ok(priority) => self.priority = priority,
                Err(e) => violations.push(e.to_string()),
            }
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
        match patch.due_date {
            None => {}
            Some(None) => self.due_date = None,
            Some(Some(raw)) => match parse_due_date(&raw) {
                Ok(ts) => self.due_date = Some(ts),
                Err(_) => violations.push(invalid_due_date_message()),
            },
        }

        self.touch(now);

        violations.extend(self.validate());
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }

    /// Checks the whole task against the length rules, returning every
    /// violation rather than stopping at the first.
    pub fn validate(&self) -> Vec<String> {
        validate_text_fields(&self.title, &self.description, &self.category)
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = now;
    }

    /// Not completed, has a due date, and that date is in the past.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Not completed and due on today's civil date in the system time zone.
    pub fn is_due_today(&self, now: Timestamp) -> bool {
        if self.completed {
            return false;
        }
        let Some(due) = self.due_date else {
            return false;
        };
        let tz = TimeZone::system();
        due.to_zoned(tz.clone()).date() == now.to_zoned(tz).date()
    }
}

fn validate_text_fields(title: &str, description: &str, category: &str) -> Vec<String> {
    let mut violations = Vec::new();

    if title.is_empty() {
        violations.push("Title is required".to_string());
    } else if title.chars().count() > MAX_TITLE_LENGTH {
        violations.push(format!(
            "Title must be {} characters or less",
            MAX_TITLE_LENGTH
        ));
    }

    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        violations.push(format!(
            "Description must be {} characters or less",
            MAX_DESCRIPTION_LENGTH
        ));
    }

    if category.chars().count() > MAX_CATEGORY_LENGTH {
        violations.push(format!(
            "Category must be {} characters or less",
            MAX_CATEGORY_LENGTH
        ));
    }

    violations
}

fn invalid_due_date_message() -> String {
    "Due date must be a valid date or ISO-8601 timestamp".to_string()
}

/// Accepts a full ISO-8601 timestamp (e.g. "2025-03-01T09:00:00Z") or a
/// plain date (e.g. "2025-03-01"), resolved to the start of that day in
/// the system time zone.
pub fn parse_due_date(input: &str) -> Result<Timestamp, jiff::Error> {
    if let Ok(ts) = input.parse::<Timestamp>() {
        return Ok(ts);
    }
    let date: Date = input.parse()?;
    Ok(date.to_zoned(TimeZone::system())?.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn test_from_draft_applies_defaults() {
        let task = Task::from_draft(draft("Buy groceries"), Timestamp::now()).unwrap();

        assert_eq!(task.title, "Buy groceries");
        assert_eq!(task.description, "");
        assert!(!task.completed);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, "general");
        assert!(task.due_date.is_none());
        assert_eq!(task.created_at, task.updated_at);
        assert!(!task.time_tracking.is_active);
    }

    #[test]
    fn test_from_draft_trims_title_and_description() {
        let task = Task::from_draft(
            TaskDraft {
                title: "  Buy groceries  ".to_string(),
                description: Some("  milk and eggs  ".to_string()),
                ..TaskDraft::default()
            },
            Timestamp::now(),
        )
        .unwrap();

        assert_eq!(task.title, "Buy groceries");
        assert_eq!(task.description, "milk and eggs");
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let violations = Task::from_draft(draft("   "), Timestamp::now()).unwrap_err();
        assert!(violations.contains(&"Title is required".to_string()));
    }

    #[test]
    fn test_overlong_title_is_rejected() {
        let violations = Task::from_draft(draft(&"a".repeat(201)), Timestamp::now()).unwrap_err();
        assert_eq!(violations, vec!["Title must be 200 characters or less"]);
    }

    #[test]
    fn test_all_violations_are_collected_at_once() {
        let violations = Task::from_draft(
            TaskDraft {
                title: String::new(),
                description: Some("x".repeat(1001)),
                priority: Some("urgent".to_string()),
                category: Some("c".repeat(51)),
                due_date: Some("not-a-date".to_string()),
            },
            Timestamp::now(),
        )
        .unwrap_err();

        assert_eq!(violations.len(), 5);
        assert!(violations.contains(&"Title is required".to_string()));
        assert!(violations.contains(&"Priority must be one of: high, medium, low".to_string()));
        assert!(violations.contains(&"Due date must be a valid date or ISO-8601 timestamp".to_string()));
    }

    #[test]
    fn test_patch_clears_due_date_only_when_explicit() {
        let mut task = Task::from_draft(
            TaskDraft {
                title: "Taxes".to_string(),
                due_date: Some("2026-04-15".to_string()),
                ..TaskDraft::default()
            },
            Timestamp::now(),
        )
        .unwrap();
        assert!(task.due_date.is_some());

        // A patch that omits the due date leaves it alone
        task.apply_patch(
            TaskPatch {
                title: Some("File taxes".to_string()),
                ..TaskPatch::default()
            },
            Timestamp::now(),
        )
        .unwrap();
        assert!(task.due_date.is_some());

        // An explicit null clears it
        task.apply_patch(
            TaskPatch {
                due_date: Some(None),
                ..TaskPatch::default()
            },
            Timestamp::now(),
        )
        .unwrap();
        assert!(task.due_date.is_none());
    }

    #[test]
    fn test_empty_patch_bumps_only_updated_at() {
        let created = Timestamp::from_millisecond(1_000_000).unwrap();
        let later = Timestamp::from_millisecond(2_000_000).unwrap();
        let mut task = Task::from_draft(draft("Stable"), created).unwrap();
        let before = task.clone();

        task.apply_patch(TaskPatch::default(), later).unwrap();

        assert_eq!(task.title, before.title);
        assert_eq!(task.completed, before.completed);
        assert_eq!(task.priority, before.priority);
        assert_eq!(task.created_at, before.created_at);
        assert!(task.updated_at > before.updated_at);
    }

    #[test]
    fn test_patch_revalidates_whole_task() {
        let mut task = Task::from_draft(draft("Valid"), Timestamp::now()).unwrap();
        let result = task.apply_patch(
            TaskPatch {
                title: Some("   ".to_string()),
                ..TaskPatch::default()
            },
            Timestamp::now(),
        );
        assert_eq!(result.unwrap_err(), vec!["Title is required"]);
    }

    #[test]
    fn test_priority_weight_ordering() {
        assert!(Priority::High.weight() > Priority::Medium.weight());
        assert!(Priority::Medium.weight() > Priority::Low.weight());
    }

    #[test]
    fn test_priority_parse_is_case_insensitive() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!(" low ".parse::<Priority>().unwrap(), Priority::Low);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_overdue_and_due_today_predicates() {
        let now = Timestamp::now();
        let mut task = Task::from_draft(draft("Deadline"), now).unwrap();

        task.due_date = Some(Timestamp::from_millisecond(now.as_millisecond() - 86_400_000).unwrap());
        assert!(task.is_overdue(now));
        assert!(!task.is_due_today(now));

        task.due_date = Some(now);
        assert!(task.is_due_today(now));

        task.completed = true;
        assert!(!task.is_overdue(now));
        assert!(!task.is_due_today(now));
    }

    #[test]
    fn test_serialized_field_names_match_persisted_layout() {
        let task = Task::from_draft(draft("Wire format"), Timestamp::now()).unwrap();
        let value = serde_json::to_value(&task).unwrap();
        let obj = value.as_object().unwrap();

        for key in [
            "id",
            "title",
            "description",
            "completed",
            "priority",
            "category",
            "dueDate",
            "createdAt",
            "updatedAt",
            "timeTracking",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(value["priority"], "medium");
        let tracking = value["timeTracking"].as_object().unwrap();
        assert!(tracking.contains_key("isActive"));
        assert!(tracking.contains_key("activeSessionStart"));
        assert!(tracking.contains_key("sessions"));
        assert!(tracking.contains_key("totalTime"));
    }
}
