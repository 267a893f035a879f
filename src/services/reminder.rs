use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use serenity::all::{ChannelId, Http, UserId};
use tokio::time::{interval, Duration};
use tracing::{debug, error, warn};

use crate::config::{IdSequences, Reminder, REMINDER_TIME_FORMAT};
use crate::error::Result;
use crate::state::SharedState;

const POLL_SECONDS: u64 = 30;

/// Periodic reminder scan at wall-clock minute resolution.
pub struct ReminderService {
    state: SharedState,
    http: Arc<Http>,
}

impl ReminderService {
    pub fn new(state: SharedState, http: Arc<Http>) -> Self {
        Self { state, http }
    }

    pub fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(self) {
        let mut poll = interval(Duration::from_secs(POLL_SECONDS));
        loop {
            poll.tick().await;
            if let Err(e) = self.poll_once().await {
                error!("reminder processing failed: {}", e);
            }
        }
    }

    async fn poll_once(&self) -> Result<()> {
        let now = Local::now().format(REMINDER_TIME_FORMAT).to_string();
        debug!("reminder scan at {}", now);

        let fired = {
            let mut cfg = self.state.config.write().await;
            let cfg = &mut *cfg;
            scan_due(&mut cfg.reminders, &mut cfg.ids, &now)
        };

        for reminder in fired {
            let text = format!(
                "{}\nYou asked to remind at {} -> {}",
                reminder.ping_users.join(" "),
                now,
                reminder.message
            );
            if let Err(e) = ChannelId::new(reminder.channel_id)
                .say(self.http.as_ref(), text)
                .await
            {
                error!(
                    "failed to deliver reminder to channel {}: {}",
                    reminder.channel_id, e
                );
            }
            for user_id in &reminder.whisper_users {
                let whisper = format!("You asked to remind at {} -> {}", now, reminder.message);
                let delivery = async {
                    let dm = UserId::new(*user_id)
                        .create_dm_channel(self.http.as_ref())
                        .await?;
                    dm.id.say(self.http.as_ref(), whisper).await
                };
                if let Err(e) = delivery.await {
                    warn!("failed to whisper reminder to user {}: {}", user_id, e);
                }
            }
        }

        Ok(())
    }
}

/// One scan pass over the reminder map. Reminders due exactly `now` are
/// removed and returned for delivery (repeating ones are re-inserted under a
/// fresh id at `now + repeat_after`); reminders strictly in the past are
/// dropped without delivery.
pub fn scan_due(
    reminders: &mut BTreeMap<u64, Reminder>,
    ids: &mut IdSequences,
    now: &str,
) -> Vec<Reminder> {
    let mut fired = Vec::new();
    let mut to_remove = Vec::new();

    for (id, reminder) in reminders.iter() {
        if reminder.time == now {
            fired.push(reminder.clone());
            to_remove.push(*id);
        } else if reminder.time.as_str() < now {
            debug!("dropping stale reminder {}", id);
            to_remove.push(*id);
        }
    }
    for id in &to_remove {
        reminders.remove(id);
    }

    for reminder in &fired {
        if reminder.repeat_after <= 0 {
            continue;
        }
        let Some(next_time) = advance_time(now, reminder.repeat_after) else {
            warn!("could not reschedule repeating reminder at {}", now);
            continue;
        };
        let mut renewed = Reminder::new(next_time, reminder.message.clone(), reminder.channel_id);
        renewed.ping_users = reminder.ping_users.clone();
        renewed.whisper_users = reminder.whisper_users.clone();
        renewed.repeat_after = reminder.repeat_after;
        let id = ids.next_reminder();
        debug!("rescheduled recurring reminder as {}", id);
        reminders.insert(id, renewed);
    }

    fired
}

fn advance_time(now: &str, minutes: i64) -> Option<String> {
    let parsed = NaiveDateTime::parse_from_str(now, REMINDER_TIME_FORMAT).ok()?;
    Some(
        (parsed + ChronoDuration::minutes(minutes))
            .format(REMINDER_TIME_FORMAT)
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reminder(time: &str, message: &str) -> Reminder {
        Reminder::new(time.to_string(), message.to_string(), 42)
    }

    #[test]
    fn due_reminders_fire_and_are_removed() {
        let mut reminders = BTreeMap::new();
        let mut ids = IdSequences::default();
        reminders.insert(1, reminder("2026-08-07 12:00", "now"));
        reminders.insert(2, reminder("2026-08-07 13:00", "later"));

        let fired = scan_due(&mut reminders, &mut ids, "2026-08-07 12:00");
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].message, "now");
        assert!(!reminders.contains_key(&1));
        assert!(reminders.contains_key(&2));
    }

    #[test]
    fn stale_reminders_are_dropped_without_firing() {
        let mut reminders = BTreeMap::new();
        let mut ids = IdSequences::default();
        reminders.insert(1, reminder("2026-08-07 11:59", "missed"));

        let fired = scan_due(&mut reminders, &mut ids, "2026-08-07 12:00");
        assert!(fired.is_empty());
        assert!(reminders.is_empty());
    }

    #[test]
    fn repeating_reminders_are_rescheduled_with_fresh_ids() {
        let mut reminders = BTreeMap::new();
        let mut ids = IdSequences::default();
        ids.reminder = 5;
        let mut repeating = reminder("2026-08-07 12:00", "water the plants");
        repeating.repeat_after = 90;
        repeating.whisper_users.push(7);
        reminders.insert(3, repeating);

        let fired = scan_due(&mut reminders, &mut ids, "2026-08-07 12:00");
        assert_eq!(fired.len(), 1);
        assert!(!reminders.contains_key(&3));

        let (id, renewed) = reminders.iter().next().unwrap();
        assert_eq!(*id, 6);
        assert_eq!(renewed.time, "2026-08-07 13:30");
        assert_eq!(renewed.repeat_after, 90);
        assert_eq!(renewed.whisper_users, vec![7]);
    }

    #[test]
    fn future_reminders_are_untouched() {
        let mut reminders = BTreeMap::new();
        let mut ids = IdSequences::default();
        reminders.insert(1, reminder("2026-08-07 12:01", "soon"));

        let fired = scan_due(&mut reminders, &mut ids, "2026-08-07 12:00");
        assert!(fired.is_empty());
        assert_eq!(reminders.len(), 1);
    }

    #[test]
    fn advance_time_crosses_day_boundaries() {
        assert_eq!(
            advance_time("2026-08-07 23:45", 30).as_deref(),
            Some("2026-08-08 00:15")
        );
        assert!(advance_time("garbage", 30).is_none());
    }
}
