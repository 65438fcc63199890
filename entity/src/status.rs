use std::fmt;
use std::str::FromStr;

/// Read-state filter accepted by the notification history endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    All,
    Unread,
    Read,
}

#[derive(Debug, PartialEq, Eq)]
pub struct NotificationStatusParseError;

impl FromStr for NotificationStatus {
    type Err = NotificationStatusParseError;

    // The empty string is accepted as "all" so that a bare
    // `GET …/notifications` lists everything.
    fn from_str(status: &str) -> Result<NotificationStatus, Self::Err> {
        match status {
            "" | "all" => Ok(NotificationStatus::All),
            "unread" => Ok(NotificationStatus::Unread),
            "read" => Ok(NotificationStatus::Read),
            _ => Err(NotificationStatusParseError),
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotificationStatus::All => write!(f, "all"),
            NotificationStatus::Unread => write!(f, "unread"),
            NotificationStatus::Read => write!(f, "read"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_allowed_status_set() {
        assert_eq!("".parse(), Ok(NotificationStatus::All));
        assert_eq!("all".parse(), Ok(NotificationStatus::All));
        assert_eq!("unread".parse(), Ok(NotificationStatus::Unread));
        assert_eq!("read".parse(), Ok(NotificationStatus::Read));
    }

    #[test]
    fn rejects_anything_outside_the_allowed_set() {
        assert!("new".parse::<NotificationStatus>().is_err());
        assert!("READ".parse::<NotificationStatus>().is_err());
        assert!("seen".parse::<NotificationStatus>().is_err());
    }
}
