//! Daily jobs: reminders about tasks scheduled or due tomorrow.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Days, Local, NaiveTime, TimeDelta, TimeZone};
use logbridge_notebook::{find_tasks, Notebook, TaskDate};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::ChatApi;
use crate::chat_ids::ChatIds;
use crate::send::send_block;

/// Job reminding about tasks scheduled tomorrow.
pub const SCHEDULED_JOB: &str = "ScheduledTimedJob";

/// Job reminding about tasks due tomorrow.
pub const DEADLINE_JOB: &str = "DeadlineNotificationJob";

/// A target closer than this is pushed to the following period.
pub const MINIMUM_GAP: TimeDelta = TimeDelta::seconds(10);

/// Period of the notification jobs.
pub const ONE_DAY: TimeDelta = TimeDelta::days(1);

/// Next time a job set for `time_of_day` every `period` should run.
///
/// Starts from today at `time_of_day`; a target already past is rolled
/// forward by whole periods, and a target less than [`MINIMUM_GAP`] away is
/// pushed one more period.
pub fn next_run<Tz: TimeZone>(time_of_day: NaiveTime, period: TimeDelta, now: &DateTime<Tz>) -> DateTime<Tz> {
    let today = now.date_naive().and_time(time_of_day);
    let mut target = now
        .timezone()
        .from_local_datetime(&today)
        .earliest()
        .unwrap_or_else(|| now.clone());

    if period <= TimeDelta::zero() {
        return target;
    }

    if target < *now {
        let behind = now.clone() - target.clone();
        let periods = 1 + behind.num_milliseconds() / period.num_milliseconds();
        target = target + period * periods as i32;
    }
    if target.clone() - now.clone() < MINIMUM_GAP {
        target = target + period;
    }
    target
}

/// Named background jobs. Scheduling a name again replaces the old job.
#[derive(Default)]
pub struct JobScheduler {
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `job` at `time_of_day` (local time) and then every `period`.
    pub fn run_at_interval<F, Fut>(&self, name: &str, time_of_day: NaiveTime, period: TimeDelta, job: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job_name = name.to_string();
        let handle = tokio::spawn(async move {
            loop {
                let now = Local::now();
                let target = next_run(time_of_day, period, &now);
                info!(job = %job_name, at = %target, "Job scheduled");

                let wait = (target - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                debug!(job = %job_name, "Job running");
                job().await;
            }
        });

        let mut jobs = self.lock();
        if let Some(previous) = jobs.insert(name.to_string(), handle) {
            previous.abort();
        }
    }

    /// Stop the job called `name`. Returns whether it existed.
    pub fn cancel(&self, name: &str) -> bool {
        match self.lock().remove(name) {
            Some(handle) => {
                handle.abort();
                info!(job = %name, "Job cancelled");
                true
            }
            None => false,
        }
    }

    /// Whether a job called `name` is scheduled.
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.lock().get(name).is_some_and(|h| !h.is_finished())
    }

    /// Stop every job.
    pub fn cancel_all(&self) {
        for (name, handle) in self.lock().drain() {
            handle.abort();
            debug!(job = %name, "Job cancelled");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, JoinHandle<()>>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Send every open task whose `kind` date is the day after `today`.
///
/// Returns how many tasks were sent.
pub async fn notify_tasks(
    api: &dyn ChatApi,
    notebook: &dyn Notebook,
    chats: &ChatIds,
    kind: TaskDate,
    today: chrono::NaiveDate,
) -> usize {
    let Some(tomorrow) = today.checked_add_days(Days::new(1)) else {
        return 0;
    };

    let tasks = match find_tasks(notebook, kind, tomorrow).await {
        Ok(tasks) => tasks,
        Err(e) => {
            error!(kind = kind.attribute(), error = %e, "Failed to look up tasks");
            return 0;
        }
    };
    if tasks.is_empty() {
        debug!(kind = kind.attribute(), %tomorrow, "No tasks to notify");
        return 0;
    }

    let chat_ids = chats.chat_ids().await;
    let mut sent = 0;
    for task in &tasks {
        match send_block(api, notebook, &chat_ids, &task.uuid).await {
            Ok(_) => sent += 1,
            Err(e) => warn!(uuid = %task.uuid, error = %e, "Failed to send task"),
        }
    }
    info!(kind = kind.attribute(), sent, total = tasks.len(), "Task notifications sent");
    sent
}

/// Schedule the daily notification job for `kind` at `time_of_day`.
pub fn schedule_notifications(
    scheduler: &JobScheduler,
    kind: TaskDate,
    time_of_day: NaiveTime,
    api: Arc<dyn ChatApi>,
    notebook: Arc<dyn Notebook>,
    chats: Arc<ChatIds>,
) {
    let name = match kind {
        TaskDate::Scheduled => SCHEDULED_JOB,
        TaskDate::Deadline => DEADLINE_JOB,
    };
    scheduler.run_at_interval(name, time_of_day, ONE_DAY, move || {
        let api = Arc::clone(&api);
        let notebook = Arc::clone(&notebook);
        let chats = Arc::clone(&chats);
        async move {
            let today = Local::now().date_naive();
            notify_tasks(api.as_ref(), notebook.as_ref(), &chats, kind, today).await;
        }
    });
}
