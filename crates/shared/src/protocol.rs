//! One-line commands accepted by the feed service's `ctl` file.

use std::fmt;

use crate::domain::WindowMode;

pub const CTL_PATH: &str = "ctl";

/// Number of entries kept by `Trim`.
pub const TRIM_KEEP: u32 = 10;

/// Bytes read from each entry file when rendering a timeline; longer
/// entries are truncated.
pub const ENTRY_READ_LIMIT: usize = 4096;

/// Target of a pagination or trim command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Home,
    Mentions,
    User(String),
}

impl Scope {
    pub fn for_mode(mode: &WindowMode) -> Option<Self> {
        match mode {
            WindowMode::Home => Some(Self::Home),
            WindowMode::Mentions => Some(Self::Mentions),
            WindowMode::UserTimeline { screen_name } => Some(Self::User(screen_name.clone())),
            WindowMode::Compose { .. } => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("home"),
            Self::Mentions => f.write_str("mentions"),
            Self::User(screen_name) => write!(f, "@{screen_name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Newer { scope: Scope },
    Older { scope: Scope },
    Trim { scope: Scope, keep: u32 },
    Post { text: String },
    Reply { in_reply_to: String, text: String },
}

impl ControlCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Newer { .. } => "newer",
            Self::Older { .. } => "older",
            Self::Trim { .. } => "trim",
            Self::Post { .. } => "post",
            Self::Reply { .. } => "reply",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.verb();
        match self {
            Self::Newer { scope } | Self::Older { scope } => write!(f, "{verb} {scope}"),
            Self::Trim { scope, keep } => write!(f, "{verb} {scope} {keep}"),
            Self::Post { text } => write!(f, "{verb} {text}"),
            Self::Reply { in_reply_to, text } => write!(f, "{verb} {in_reply_to} {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_follow_window_mode() {
        assert_eq!(Scope::for_mode(&WindowMode::Home), Some(Scope::Home));
        assert_eq!(
            Scope::for_mode(&WindowMode::user("alice")).map(|s| s.to_string()),
            Some("@alice".to_string())
        );
        assert_eq!(Scope::for_mode(&WindowMode::new_post()), None);
    }

    #[test]
    fn commands_format_as_single_lines() {
        let trim = ControlCommand::Trim {
            scope: Scope::User("alice".into()),
            keep: TRIM_KEEP,
        };
        assert_eq!(trim.to_string(), "trim @alice 10");
        assert_eq!(
            ControlCommand::Newer {
                scope: Scope::Home
            }
            .to_string(),
            "newer home"
        );
        assert_eq!(
            ControlCommand::Reply {
                in_reply_to: "9".into(),
                text: "hi there".into()
            }
            .to_string(),
            "reply 9 hi there"
        );
    }
}
