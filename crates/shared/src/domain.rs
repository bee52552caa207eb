use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

id_newtype!(WindowId);

/// Prefix shared by every window title this client creates.
pub const TITLE_PREFIX: &str = "/twitter/";

pub const TIMELINE_TAG: &str = " New Reply Newer Older Trim Get ";
pub const COMPOSE_TAG: &str = " Post ";

/// The fixed role of a window. A window never changes mode; opening a
/// different view means opening another window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WindowMode {
    Home,
    Mentions,
    UserTimeline { screen_name: String },
    /// `in_reply_to` is `None` for a new post.
    Compose { in_reply_to: Option<String> },
}

impl WindowMode {
    pub fn user(screen_name: impl Into<String>) -> Self {
        Self::UserTimeline {
            screen_name: screen_name.into(),
        }
    }

    pub fn new_post() -> Self {
        Self::Compose { in_reply_to: None }
    }

    pub fn reply(entry_id: impl Into<String>) -> Self {
        Self::Compose {
            in_reply_to: Some(entry_id.into()),
        }
    }

    /// Title used by the editor to address the window, e.g. `/twitter/home`.
    pub fn title(&self) -> String {
        let suffix = match self {
            Self::Home => "home".to_string(),
            Self::Mentions => "mentions".to_string(),
            Self::UserTimeline { screen_name } => format!("users/{screen_name}"),
            Self::Compose { in_reply_to: None } => "new".to_string(),
            Self::Compose {
                in_reply_to: Some(id),
            } => format!("reply/{id}"),
        };
        format!("{TITLE_PREFIX}{suffix}")
    }

    /// Remote directory holding this window's timeline, if it shows one.
    pub fn timeline_path(&self) -> Option<String> {
        match self {
            Self::Home => Some("home".to_string()),
            Self::Mentions => Some("mentions".to_string()),
            Self::UserTimeline { screen_name } => Some(user_path(screen_name)),
            Self::Compose { .. } => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Home | Self::Mentions | Self::UserTimeline { .. } => TIMELINE_TAG,
            Self::Compose { .. } => COMPOSE_TAG,
        }
    }

    pub fn is_timeline(&self) -> bool {
        !matches!(self, Self::Compose { .. })
    }
}

pub fn user_path(screen_name: &str) -> String {
    format!("users/{screen_name}")
}

/// True for non-empty strings made only of ASCII decimal digits, the shape
/// of a feed entry id.
pub fn is_entry_id(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    /// Modification time, seconds since the epoch.
    pub modified: u32,
    pub is_dir: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_follow_mode_parameters() {
        assert_eq!(WindowMode::Home.title(), "/twitter/home");
        assert_eq!(WindowMode::Mentions.title(), "/twitter/mentions");
        assert_eq!(WindowMode::user("alice").title(), "/twitter/users/alice");
        assert_eq!(WindowMode::new_post().title(), "/twitter/new");
        assert_eq!(WindowMode::reply("7").title(), "/twitter/reply/7");
    }

    #[test]
    fn compose_has_no_timeline() {
        assert_eq!(WindowMode::new_post().timeline_path(), None);
        assert_eq!(
            WindowMode::user("bob").timeline_path().as_deref(),
            Some("users/bob")
        );
    }

    #[test]
    fn tags_depend_only_on_mode() {
        assert_eq!(WindowMode::Home.tag(), " New Reply Newer Older Trim Get ");
        assert_eq!(WindowMode::user("x").tag(), WindowMode::Mentions.tag());
        assert_eq!(WindowMode::reply("1").tag(), " Post ");
    }

    #[test]
    fn entry_ids_are_plain_decimal() {
        assert!(is_entry_id("42"));
        assert!(!is_entry_id(""));
        assert!(!is_entry_id("4a2"));
        assert!(!is_entry_id(" 42"));
        assert!(!is_entry_id("４２"));
    }
}
