use std::env;

/// The local user, used as the 9P attach name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: u32,
    pub name: String,
}

impl Identity {
    #[cfg(unix)]
    pub fn current() -> Self {
        use nix::unistd::{Uid, User};

        let uid = Uid::current();
        match User::from_uid(uid) {
            Ok(Some(user)) => Self {
                uid: uid.as_raw(),
                name: user.name,
            },
            Ok(None) | Err(_) => Self {
                uid: uid.as_raw(),
                name: fallback_name(&["USER"]),
            },
        }
    }

    #[cfg(not(unix))]
    pub fn current() -> Self {
        Self {
            uid: 0,
            name: fallback_name(&["user", "USERNAME"]),
        }
    }
}

fn fallback_name(vars: &[&str]) -> String {
    vars.iter()
        .find_map(|var| env::var(var).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "none".to_string())
}
