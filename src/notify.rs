//! Prayer reminders: planning alerts from a computed day and firing them
//! on tokio timers.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::NotificationSettings;
use crate::navigator::Prayer;
use crate::schedule::PrayerTimeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ReminderKind {
    /// Fires at the prayer time itself.
    AtTime,
    /// Fires `minutes` before the prayer.
    Before { minutes: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub prayer: Prayer,
    pub kind: ReminderKind,
    pub at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

fn emoji(prayer: Prayer) -> &'static str {
    match prayer {
        Prayer::Fajr | Prayer::Maghrib => "\u{1F305}",
        Prayer::Dhuhr => "\u{2600}\u{FE0F}",
        Prayer::Asr => "\u{1F324}\u{FE0F}",
        Prayer::Isha => "\u{1F319}",
    }
}

/// Alerts for every enabled prayer: one at the prayer time and one
/// `reminder_minutes` earlier. Only instants strictly after `now` are
/// kept, sorted by firing time.
pub fn plan_reminders(
    times: &PrayerTimeSet,
    location_name: &str,
    settings: &NotificationSettings,
    now: DateTime<Utc>,
) -> Vec<Reminder> {
    if !settings.enabled {
        return Vec::new();
    }

    let mut reminders = Vec::new();
    for prayer in Prayer::ALL.into_iter().filter(|p| settings.prayers.is_enabled(*p)) {
        let at = prayer.time_in(times);
        let name = prayer.name();
        reminders.push(Reminder {
            prayer,
            kind: ReminderKind::AtTime,
            at,
            title: format!("{} {} Prayer Time", emoji(prayer), name),
            body: format!("It's time for {} prayer in {}", name, location_name),
        });

        let lead = settings.reminder_minutes;
        if lead > 0 {
            reminders.push(Reminder {
                prayer,
                kind: ReminderKind::Before { minutes: lead },
                at: at - Duration::minutes(i64::from(lead)),
                title: format!("{} {} Prayer Reminder", emoji(prayer), name),
                body: format!("{} prayer is in {} minutes", name, lead),
            });
        }
    }

    reminders.retain(|r| r.at > now);
    reminders.sort_by_key(|r| r.at);
    debug!(count = reminders.len(), "reminders planned");
    reminders
}

/// Something that can deliver reminders later.
pub trait NotificationScheduler {
    /// Replace everything pending with `reminders`. Returns how many were
    /// accepted.
    fn schedule(&self, reminders: Vec<Reminder>) -> usize;
    fn cancel_all(&self);
    /// Reminders not yet fired, soonest first.
    fn pending(&self) -> Vec<Reminder>;
}

/// Invoked once per fired reminder.
pub type ReminderHandler = Arc<dyn Fn(&Reminder) + Send + Sync>;

struct Scheduled {
    reminder: Reminder,
    handle: JoinHandle<()>,
}

/// One tokio timer task per reminder. Must be used inside a runtime.
pub struct TokioScheduler {
    handler: ReminderHandler,
    tasks: Mutex<Vec<Scheduled>>,
}

impl TokioScheduler {
    pub fn new(handler: ReminderHandler) -> Self {
        Self { handler, tasks: Mutex::new(Vec::new()) }
    }

    /// Wait until every scheduled reminder has fired or been cancelled.
    pub async fn wait(&self) {
        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).map(|t| t.handle).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl NotificationScheduler for TokioScheduler {
    fn schedule(&self, reminders: Vec<Reminder>) -> usize {
        self.cancel_all();

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for reminder in reminders {
            let delay = (reminder.at - Utc::now()).to_std().unwrap_or_default();
            let handler = self.handler.clone();
            let fired = reminder.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                info!(prayer = %fired.prayer, at = %fired.at, "reminder fired");
                handler(&fired);
            });
            tasks.push(Scheduled { reminder, handle });
        }
        tasks.len()
    }

    fn cancel_all(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        for task in tasks.drain(..) {
            task.handle.abort();
        }
    }

    fn pending(&self) -> Vec<Reminder> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let mut pending: Vec<_> = tasks
            .iter()
            .filter(|t| !t.handle.is_finished())
            .map(|t| t.reminder.clone())
            .collect();
        pending.sort_by_key(|r| r.at);
        pending
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
