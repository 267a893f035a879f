use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serenity::all::{Context, Mentionable, Message};

use super::{CommandFuture, CommandRegistry};
use crate::config::{Reminder, REMINDER_TIME_FORMAT};
use crate::state::SharedState;

pub fn bind(registry: &mut CommandRegistry) {
    registry.bind("addreminder", 0, addreminder);
    registry.bind("listreminder", 0, listreminder);
    registry.bind("delreminder", 0, delreminder);
    registry.bind("repeatreminder", 0, repeatreminder);
    registry.bind("whisperreminder", 0, whisperreminder);
}

const USAGE: &str = "Usage: addreminder [YYYY-MM-DD] <HH:MM> <message>";

/// Interpret the leading time tokens of `addreminder`. A bare `HH:MM` means
/// the next occurrence of that wall-clock time. Returns the canonical
/// timestamp and the index of the first message token.
fn parse_time_spec(tokens: &[String], now: NaiveDateTime) -> Option<(String, usize)> {
    let first = tokens.get(1)?;
    if let Ok(date) = NaiveDate::parse_from_str(first, "%Y-%m-%d") {
        let time = NaiveTime::parse_from_str(tokens.get(2)?, "%H:%M").ok()?;
        let at = date.and_time(time);
        Some((at.format(REMINDER_TIME_FORMAT).to_string(), 3))
    } else {
        let time = NaiveTime::parse_from_str(first, "%H:%M").ok()?;
        let mut at = now.date().and_time(time);
        if at <= now {
            at = at + Duration::days(1);
        }
        Some((at.format(REMINDER_TIME_FORMAT).to_string(), 2))
    }
}

fn addreminder<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let now = Local::now().naive_local();
        let Some((time, message_start)) = parse_time_spec(tokens, now) else {
            msg.channel_id.say(&ctx.http, USAGE).await?;
            return Ok(());
        };
        let text = tokens[message_start..].join(" ");
        if text.is_empty() {
            msg.channel_id.say(&ctx.http, USAGE).await?;
            return Ok(());
        }

        let id = {
            let mut cfg = state.config.write().await;
            let id = cfg.ids.next_reminder();
            let mut reminder = Reminder::new(time.clone(), text, msg.channel_id.get());
            reminder.ping_users.push(msg.author.mention().to_string());
            cfg.reminders.insert(id, reminder);
            id
        };
        msg.channel_id
            .say(&ctx.http, format!("Reminder {id} is set at {time}"))
            .await?;
        Ok(())
    })
}

fn listreminder<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    _tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let listing = {
            let cfg = state.config.read().await;
            let mut entries: Vec<(u64, Reminder)> = cfg
                .reminders
                .iter()
                .map(|(id, reminder)| (*id, reminder.clone()))
                .collect();
            entries.sort_by(|a, b| (&a.1.time, a.0).cmp(&(&b.1.time, b.0)));
            entries
                .iter()
                .map(|(id, reminder)| {
                    let mut line =
                        format!("{}: {} -> {}", id, reminder.time, reminder.message);
                    if reminder.repeat_after > 0 {
                        line.push_str(&format!(" (repeats every {} min)", reminder.repeat_after));
                    }
                    line
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        if listing.is_empty() {
            msg.channel_id.say(&ctx.http, "No reminders").await?;
        } else {
            msg.channel_id.say(&ctx.http, listing).await?;
        }
        Ok(())
    })
}

fn delreminder<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let Some(id) = tokens.get(1).and_then(|raw| raw.parse::<u64>().ok()) else {
            msg.channel_id
                .say(&ctx.http, "Usage: delreminder <id>")
                .await?;
            return Ok(());
        };
        let removed = state.config.write().await.reminders.remove(&id).is_some();
        let reply = if removed {
            format!("Reminder {id} is deleted")
        } else {
            format!("Reminder {id} does not exist")
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn repeatreminder<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let id = tokens.get(1).and_then(|raw| raw.parse::<u64>().ok());
        let minutes = tokens.get(2).and_then(|raw| raw.parse::<i64>().ok());
        let (Some(id), Some(minutes)) = (id, minutes) else {
            msg.channel_id
                .say(&ctx.http, "Usage: repeatreminder <id> <minutes>")
                .await?;
            return Ok(());
        };
        if minutes < 0 {
            msg.channel_id
                .say(&ctx.http, "Repeat interval must not be negative")
                .await?;
            return Ok(());
        }
        let reply = {
            let mut cfg = state.config.write().await;
            match cfg.reminders.get_mut(&id) {
                Some(reminder) => {
                    reminder.repeat_after = minutes;
                    if minutes > 0 {
                        format!("Reminder {id} now repeats every {minutes} minute(s)")
                    } else {
                        format!("Reminder {id} no longer repeats")
                    }
                }
                None => format!("Reminder {id} does not exist"),
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

fn whisperreminder<'a>(
    ctx: &'a Context,
    msg: &'a Message,
    tokens: &'a [String],
    state: &'a SharedState,
) -> CommandFuture<'a> {
    Box::pin(async move {
        let Some(id) = tokens.get(1).and_then(|raw| raw.parse::<u64>().ok()) else {
            msg.channel_id
                .say(&ctx.http, "Usage: whisperreminder <id>")
                .await?;
            return Ok(());
        };
        let author_id = msg.author.id.get();
        let reply = {
            let mut cfg = state.config.write().await;
            match cfg.reminders.get_mut(&id) {
                Some(reminder) => {
                    if let Some(pos) =
                        reminder.whisper_users.iter().position(|uid| *uid == author_id)
                    {
                        reminder.whisper_users.remove(pos);
                        format!("You will no longer be whispered for reminder {id}")
                    } else {
                        reminder.whisper_users.push(author_id);
                        format!("You will be whispered when reminder {id} fires")
                    }
                }
                None => format!("Reminder {id} does not exist"),
            }
        };
        msg.channel_id.say(&ctx.http, reply).await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| p.to_string()).collect()
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn explicit_date_and_time_are_taken_verbatim() {
        let (time, start) = parse_time_spec(
            &tokens(&["addreminder", "2026-12-24", "18:30", "dinner"]),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(time, "2026-12-24 18:30");
        assert_eq!(start, 3);
    }

    #[test]
    fn bare_time_later_today_stays_today() {
        let (time, start) =
            parse_time_spec(&tokens(&["addreminder", "18:30", "tea"]), fixed_now()).unwrap();
        assert_eq!(time, "2026-08-07 18:30");
        assert_eq!(start, 2);
    }

    #[test]
    fn bare_time_already_past_rolls_to_tomorrow() {
        let (time, _) =
            parse_time_spec(&tokens(&["addreminder", "09:00", "tea"]), fixed_now()).unwrap();
        assert_eq!(time, "2026-08-08 09:00");
    }

    #[test]
    fn invalid_specs_are_rejected() {
        assert!(parse_time_spec(&tokens(&["addreminder"]), fixed_now()).is_none());
        assert!(parse_time_spec(&tokens(&["addreminder", "nonsense"]), fixed_now()).is_none());
        assert!(
            parse_time_spec(&tokens(&["addreminder", "2026-12-24", "late"]), fixed_now())
                .is_none()
        );
    }
}
