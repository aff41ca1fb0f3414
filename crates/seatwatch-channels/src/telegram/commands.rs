//! Telegram command and callback parsing

use crate::error::{Error, Result};

const NOT_ENOUGH_ARGS: &str = "Not enough arguments. Example: /subscribe PHYS 161 1L 2L";
const UNSUBSCRIBE_USAGE: &str = "Specify a course. Example: /unsubscribe PHYS 161 1L";

/// A parsed chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start`
    Start,
    /// `/help`
    Help,
    /// `/subscribe <course> <sections..>`
    Subscribe {
        /// Normalized course code
        course: String,
        /// Raw section tokens, not yet matched against the feed
        sections: Vec<String>,
    },
    /// `/unsubscribe <course> [section]`
    Unsubscribe {
        /// Normalized course code
        course: String,
        /// Raw section; `None` drops the whole course
        section: Option<String>,
    },
    /// `/list`
    List,
    /// `/clear`
    Clear,
    /// `/next`
    Next,
    /// `/status`
    Status,
    /// `/stats` (alias `/parsestat`): persist and show usage counters
    Stats,
    /// `/subscribe` or `/unsubscribe` without arguments; the next plain
    /// message supplies them
    Prompt(PendingCommand),
    /// Plain text: show a course
    Lookup(String),
    /// Slash command the bot doesn't know
    Unknown(String),
}

impl Command {
    /// Parse a message text
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Parse("Empty message".to_string()));
        }

        if !text.starts_with('/') {
            return Ok(Self::Lookup(normalize_course_name(text)));
        }

        let mut parts = text.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        // Strip @bot_username suffix (e.g. /list@seatwatch_bot)
        let command = command.split('@').next().unwrap_or(command);
        let args = parts.next().unwrap_or("").trim();

        let parsed = match command {
            "/start" => Self::Start,
            "/help" => Self::Help,
            "/subscribe" if args.is_empty() => Self::Prompt(PendingCommand::Subscribe),
            "/subscribe" => PendingCommand::Subscribe.parse_args(args)?,
            "/unsubscribe" if args.is_empty() => Self::Prompt(PendingCommand::Unsubscribe),
            "/unsubscribe" => PendingCommand::Unsubscribe.parse_args(args)?,
            "/list" => Self::List,
            "/clear" => Self::Clear,
            "/next" => Self::Next,
            "/status" => Self::Status,
            "/stats" | "/parsestat" => Self::Stats,
            other => Self::Unknown(other.to_string()),
        };
        Ok(parsed)
    }

    /// Counter name recorded in the usage statistics
    #[must_use]
    pub fn usage_key(&self) -> String {
        let name = match self {
            Self::Start => "start",
            Self::Help => "help",
            Self::Subscribe { .. } => "subscribe",
            Self::Unsubscribe { .. } => "unsubscribe",
            Self::List => "list",
            Self::Clear => "clear",
            Self::Next => "next",
            Self::Status => "status",
            Self::Stats => "stats",
            Self::Prompt(pending) => pending.as_str(),
            Self::Lookup(course) => return format!("lookup/{course}"),
            Self::Unknown(_) => "unknown",
        };
        format!("command/{name}")
    }
}

/// Command waiting for its arguments in the chat's next message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCommand {
    /// Bare `/subscribe`
    Subscribe,
    /// Bare `/unsubscribe`
    Unsubscribe,
}

impl PendingCommand {
    /// Stored chat state
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }

    /// Decode a stored chat state; unknown states are dropped
    #[must_use]
    pub fn from_state(state: &str) -> Option<Self> {
        match state {
            "subscribe" => Some(Self::Subscribe),
            "unsubscribe" => Some(Self::Unsubscribe),
            _ => None,
        }
    }

    /// Read `args` as this command's arguments
    pub fn parse_args(self, args: &str) -> Result<Command> {
        match self {
            Self::Subscribe => {
                let (course, sections) = parse_subscribe_args(args)?;
                Ok(Command::Subscribe { course, sections })
            }
            Self::Unsubscribe => {
                let (course, section) = parse_unsubscribe_args(args)?;
                Ok(Command::Unsubscribe { course, section })
            }
        }
    }
}

/// One line of an imported schedule file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportLine {
    /// `PHYS 161: 1L, 2R` style line
    Subscribe {
        /// Normalized course code
        course: String,
        /// Raw section tokens
        sections: Vec<String>,
    },
    /// Line without a course and at least one section
    Invalid(String),
}

/// Parse a crashed.nu schedule export
///
/// Each non-empty line is `COURSE: S1, S2, ...`; `:` and `,` separators
/// are interchangeable.
#[must_use]
pub fn parse_import(text: &str) -> Vec<ImportLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line
                .split(|c: char| c == ':' || c == ',' || c == '|')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .collect();
            match fields.split_first() {
                Some((course, sections)) if !sections.is_empty() => ImportLine::Subscribe {
                    course: normalize_course_name(course),
                    sections: sections.iter().map(|s| s.replace(' ', "")).collect(),
                },
                _ => ImportLine::Invalid(line.to_string()),
            }
        })
        .collect()
}

/// Upper-case a course code and put a single space before its number
///
/// `phys161`, `PHYS 161` and `Phys  161` all become `PHYS 161`.
#[must_use]
pub fn normalize_course_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 1);
    let mut number_started = false;
    for c in raw.to_uppercase().chars() {
        if c.is_whitespace() {
            continue;
        }
        if c.is_ascii_digit() && !number_started {
            if !out.is_empty() {
                out.push(' ');
            }
            number_started = true;
        }
        out.push(c);
    }
    out
}

/// Match a section token against the feed's section prefixes
///
/// `2l` with prefixes `["L", "Lb"]` becomes `2L`. Returns `None` when the
/// token has no number or its prefix is unknown. A bare number is kept.
#[must_use]
pub fn normalize_section(raw: &str, prefixes: &[String]) -> Option<String> {
    let raw = raw.trim();
    let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let rest = raw.trim_start_matches(|c: char| c.is_ascii_digit() || c == ' ' || c == '-');
    if rest.is_empty() {
        return Some(digits);
    }
    prefixes
        .iter()
        .find(|prefix| prefix.eq_ignore_ascii_case(rest))
        .map(|prefix| format!("{digits}{prefix}"))
}

fn tokens(args: &str) -> Vec<&str> {
    args.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect()
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn ends_with_digit(s: &str) -> bool {
    s.chars().last().is_some_and(|c| c.is_ascii_digit())
}

/// Split tokens into the course code and what follows it
///
/// `PHYS 161 1L` and `PHYS161 1L` both yield `PHYS 161`.
fn split_course<'a, 'b>(fields: &'b [&'a str]) -> (String, &'b [&'a str]) {
    match fields {
        [letters, number, rest @ ..] if !ends_with_digit(letters) && starts_with_digit(number) => {
            (normalize_course_name(&format!("{letters}{number}")), rest)
        }
        [course, rest @ ..] => (normalize_course_name(course), rest),
        [] => (String::new(), &[]),
    }
}

/// Parse `/subscribe` arguments into a course and raw section tokens
///
/// A token starting with a digit begins a new section; anything else is
/// glued to the previous one, so `2 L` reads as `2L`.
pub fn parse_subscribe_args(args: &str) -> Result<(String, Vec<String>)> {
    let fields = tokens(args);
    if fields.len() < 2 {
        return Err(Error::Parse(NOT_ENOUGH_ARGS.to_string()));
    }

    let (course, rest) = split_course(&fields);
    let mut sections: Vec<String> = Vec::new();
    for token in rest {
        if starts_with_digit(token) {
            sections.push((*token).to_string());
        } else if let Some(last) = sections.last_mut() {
            last.push_str(token);
        } else {
            return Err(Error::Parse(format!(
                "Invalid section \"{token}\": sections start with a number, like 1L"
            )));
        }
    }

    if sections.is_empty() {
        return Err(Error::Parse(NOT_ENOUGH_ARGS.to_string()));
    }
    Ok((course, sections))
}

/// Parse `/unsubscribe` arguments into a course and an optional section
pub fn parse_unsubscribe_args(args: &str) -> Result<(String, Option<String>)> {
    let fields = tokens(args);
    if fields.is_empty() {
        return Err(Error::Parse(UNSUBSCRIBE_USAGE.to_string()));
    }

    let (course, rest) = split_course(&fields);
    match rest.first() {
        None => Ok((course, None)),
        Some(first) if starts_with_digit(first) => Ok((course, Some(rest.concat()))),
        Some(first) => Err(Error::Parse(format!(
            "Invalid section \"{first}\": sections start with a number, like 1L"
        ))),
    }
}

/// Inline keyboard callback payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Drop a subscription (a whole course when `section` is `None`)
    Unsubscribe {
        /// Course code
        course: String,
        /// Section code
        section: Option<String>,
    },
    /// Dismiss the message
    Ignore,
}

impl CallbackAction {
    /// Decode callback data
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if data == "ignore" {
            return Some(Self::Ignore);
        }
        let rest = data.strip_prefix("unsub:")?;
        let (course, section) = match rest.split_once(':') {
            Some((course, section)) => (course, Some(section.to_string())),
            None => (rest, None),
        };
        if course.is_empty() {
            return None;
        }
        Some(Self::Unsubscribe {
            course: course.to_string(),
            section,
        })
    }

    /// Encode as callback data
    #[must_use]
    pub fn to_data(&self) -> String {
        match self {
            Self::Unsubscribe {
                course,
                section: Some(section),
            } => format!("unsub:{course}:{section}"),
            Self::Unsubscribe { course, section: None } => format!("unsub:{course}"),
            Self::Ignore => "ignore".to_string(),
        }
    }
}
