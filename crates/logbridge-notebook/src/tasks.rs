//! Lookup of open tasks by scheduled or deadline date.

use chrono::NaiveDate;
use logbridge_core::journal_day;
use serde_json::Value;
use tracing::debug;

use crate::block::Block;
use crate::error::Result;
use crate::traits::Notebook;

/// Task markers that count as "not done".
pub const OPEN_TASK_MARKERS: &[&str] = &["TODO", "DOING", "NOW", "LATER", "WAITING"];

/// Which task date to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskDate {
    Scheduled,
    Deadline,
}

impl TaskDate {
    /// Block attribute holding the date.
    pub fn attribute(self) -> &'static str {
        match self {
            TaskDate::Scheduled => "scheduled",
            TaskDate::Deadline => "deadline",
        }
    }

    /// Datascript query for tasks with this date on `date` and one of `markers`.
    pub fn query(self, date: NaiveDate, markers: &[&str]) -> String {
        let markers = markers
            .iter()
            .map(|m| format!("\"{m}\""))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "[:find (pull ?b [*])\n :where\n [?b :block/{attr} ?d]\n [(= ?d {day})]\n [?b :block/marker ?marker]\n [(contains? #{{{markers}}} ?marker)]]",
            attr = self.attribute(),
            day = journal_day(date),
        )
    }
}

/// Open tasks whose scheduled or deadline date is `date`.
pub async fn find_tasks(
    notebook: &dyn Notebook,
    kind: TaskDate,
    date: NaiveDate,
) -> Result<Vec<Block>> {
    let query = kind.query(date, OPEN_TASK_MARKERS);
    let Some(rows) = notebook.query(&query, &[]).await? else {
        debug!(kind = kind.attribute(), %date, "no tasks found");
        return Ok(Vec::new());
    };
    flatten_pulled(rows)
}

/// Flatten `(pull ?x [*])` rows (`[[entity], [entity], ...]`) into entities.
pub(crate) fn flatten_pulled<T: serde::de::DeserializeOwned>(rows: Value) -> Result<Vec<T>> {
    let rows = match rows {
        Value::Array(rows) => rows,
        Value::Null => return Ok(Vec::new()),
        other => vec![other],
    };
    let mut items = Vec::new();
    for row in rows {
        match row {
            Value::Array(cells) => {
                for cell in cells {
                    items.push(serde_json::from_value(cell)?);
                }
            }
            cell => items.push(serde_json::from_value(cell)?),
        }
    }
    Ok(items)
}
