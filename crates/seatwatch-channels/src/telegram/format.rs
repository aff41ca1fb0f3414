//! MarkdownV2 rendering for bot replies and notifications

use chrono::{DateTime, Local, Utc};
use seatwatch_core::{Group, Notification, NotificationKind, Subscription};
use std::collections::BTreeMap;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::markdown::escape;

use super::commands::CallbackAction;

pub(crate) const WELCOME_TEXT: &str = "👋 Hi! I watch course sections and tell you when seats open up or run out.\n\n\
Send a course code (for example PHYS 161) to see its sections, then subscribe:\n\
/subscribe PHYS 161 1L 2R\n\n\
Type /help for the full list of commands.";

pub(crate) const HELP_TEXT: &str = "Commands:\n\
/subscribe <course> <sections> - watch sections\n\
/unsubscribe <course> [section] - stop watching a section or a whole course\n\
(send either one alone and I'll ask for the details)\n\
/list - your subscriptions\n\
/clear - drop every subscription\n\
/next - when the next check runs\n\n\
Any other text is read as a course code.\n\
To import a crashed.nu schedule, send /subscribe and then the .txt file.\n\n\
FAQ\n\
How often do you check? Every half hour normally, and up to every minute right before registration deadlines.\n\
Why didn't I get a message right after subscribing? I only write when a section changes between full and open.";

pub(crate) const SUBSCRIBE_PROMPT: &str = "Send the course and the sections to watch.\n\
Example: PHYS 161 1L 2R 3PLb\n\n\
You can also send a .txt schedule file from crashed.nu.";

pub(crate) const UNSUBSCRIBE_PROMPT: &str = "Send the course to stop watching, with a section to drop only that one.\n\
Example: PHYS 161 or PHYS 161 1L";

const TIME_FORMAT: &str = "%H:%M:%S %d.%m.%Y";

/// Plain text as a MarkdownV2 message
pub(crate) fn plain(text: &str) -> String {
    escape(text)
}

/// Local wall-clock rendering used in footers
pub(crate) fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

pub(crate) fn notification_text(notification: &Notification) -> String {
    let target = format!(
        "*{} {}*",
        escape(&notification.group_key),
        escape(&notification.item_key)
    );
    match &notification.kind {
        NotificationKind::Opened { size, capacity } => {
            format!("🔆 {target} now has free places \\({size}/{capacity}\\)")
        }
        NotificationKind::Filled { size, capacity } => {
            format!("🚫 {target} is full \\({size}/{capacity}\\)")
        }
        NotificationKind::GroupRemoved => format!(
            "⚠️ *{}* is no longer offered, so {target} can't be tracked",
            escape(&notification.group_key)
        ),
        NotificationKind::ItemRemoved => {
            format!("⚠️ {target} is not in the schedule anymore")
        }
    }
}

/// Unsubscribe/Ignore buttons offered with removal notices
pub(crate) fn removal_keyboard(notification: &Notification) -> InlineKeyboardMarkup {
    let unsubscribe = CallbackAction::Unsubscribe {
        course: notification.group_key.clone(),
        section: Some(notification.item_key.clone()),
    };
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("Unsubscribe", unsubscribe.to_data()),
        InlineKeyboardButton::callback("Ignore", CallbackAction::Ignore.to_data()),
    ]])
}

/// Split a section code into its prefix and number for ordering
fn section_order(item_key: &str) -> (String, u64) {
    let digits: String = item_key.chars().take_while(char::is_ascii_digit).collect();
    let prefix = item_key
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == ' ' || c == '-')
        .to_string();
    (prefix, digits.parse().unwrap_or(u64::MAX))
}

/// Course card: term label, title, sections grouped by kind, refresh time
pub(crate) fn group_details(label: &str, group: &Group, refreshed_at: DateTime<Utc>) -> String {
    let mut records: Vec<_> = group.records.iter().collect();
    records.sort_by_key(|r| section_order(&r.item_key));

    let mut out = format!("{}\n*{}*: {}\n", escape(label), escape(&group.key), escape(&group.title));
    let mut current_prefix: Option<String> = None;
    for record in records {
        let (prefix, _) = section_order(&record.item_key);
        if current_prefix.as_ref() != Some(&prefix) {
            out.push('\n');
            current_prefix = Some(prefix);
        }
        let line = format!(
            "{} \\({}/{}\\)",
            escape(&record.item_key),
            record.size,
            record.capacity
        );
        if record.is_full() {
            out.push_str(&format!("•   ~{line}~\n"));
        } else {
            out.push_str(&format!("•   {line}\n"));
        }
    }
    out.push_str(&format!(
        "\n_{}_",
        escape(&format!("Last update: {}", local_time(refreshed_at)))
    ));
    out
}

pub(crate) fn not_found(course: &str) -> String {
    format!("❌ Course *{}* not found", escape(course))
}

pub(crate) fn subscribed(course: &str, sections: &[String]) -> String {
    format!(
        "✅ Successfully subscribed to *{} \\({}\\)*",
        escape(course),
        escape(&sections.join(", "))
    )
}

pub(crate) fn unsubscribed(course: &str, section: Option<&str>, removed: u64) -> String {
    let target = match section {
        Some(section) => format!("{course} {section}"),
        None => course.to_string(),
    };
    if removed == 0 {
        format!("You were not subscribed to *{}*", escape(&target))
    } else {
        format!("✅ Unsubscribed from *{}*", escape(&target))
    }
}

pub(crate) fn cleared(removed: u64) -> String {
    if removed == 0 {
        plain("You have no subscriptions.")
    } else {
        plain(&format!("🗑 Removed {removed} subscription(s)."))
    }
}

/// `/list` reply, one line per course
pub(crate) fn subscription_list(subscriptions: &[Subscription]) -> String {
    if subscriptions.is_empty() {
        return plain("You have no subscriptions. Use /subscribe to add one.");
    }

    let mut by_course: BTreeMap<&str, Vec<&Subscription>> = BTreeMap::new();
    for subscription in subscriptions {
        by_course
            .entry(subscription.group_key.as_str())
            .or_default()
            .push(subscription);
    }

    let mut out = String::from("*Your subscriptions*\n");
    for (course, mut items) in by_course {
        items.sort_by_key(|s| section_order(&s.item_key));
        let sections: Vec<String> = items
            .iter()
            .map(|s| {
                if s.orphaned {
                    format!("{} (gone)", s.item_key)
                } else {
                    s.item_key.clone()
                }
            })
            .collect();
        out.push_str(&format!(
            "\n*{}*: {}",
            escape(course),
            escape(&sections.join(", "))
        ));
    }
    out
}

pub(crate) fn next_check(next: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match next {
        Some(at) => {
            let secs = (at - now).num_seconds().max(0);
            plain(&format!(
                "⏱ Next check at {} (in {}m {}s)",
                local_time(at),
                secs / 60,
                secs % 60
            ))
        }
        None => plain("⏱ No check is scheduled right now."),
    }
}

pub(crate) fn status(
    label: Option<&str>,
    refreshed_at: Option<DateTime<Utc>>,
    groups: usize,
    items: usize,
    subscriptions: usize,
) -> String {
    let refreshed = refreshed_at.map_or_else(|| "never".to_string(), local_time);
    plain(&format!(
        "Status\nTerm: {}\nLast refresh: {}\nCourses: {}\nSections: {}\nSubscriptions: {}",
        label.unwrap_or("unknown"),
        refreshed,
        groups,
        items,
        subscriptions
    ))
}

/// One reply line per imported schedule line
pub(crate) fn import_report(lines: &[String]) -> String {
    if lines.is_empty() {
        return plain("The file has no courses in it.");
    }
    lines.join("\n")
}

pub(crate) fn invalid_import_line(line: &str) -> String {
    plain(&format!("⚠️ Invalid line format: {line}"))
}

/// Persisted usage totals, highest first
pub(crate) fn usage_stats(counts: &[(String, i64)]) -> String {
    if counts.is_empty() {
        return plain("No usage recorded yet.");
    }
    let mut out = String::from("*Usage*\n");
    for (action, count) in counts {
        out.push_str(&format!("\n{}: {}", escape(action), count));
    }
    out
}
