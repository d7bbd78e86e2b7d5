//! Fixed values shared by the portal and calendar sides.

use chrono_tz::Tz;

/// Private extended property key marking events created by gesync.
pub const OWNERSHIP_KEY: &str = "sync-application";

/// Value stored under [`OWNERSHIP_KEY`].
pub const OWNERSHIP_VALUE: &str = "gesync";

/// Zone the portal's naive timestamps are implicitly expressed in.
pub const PORTAL_TIMEZONE: Tz = chrono_tz::Europe::Luxembourg;

/// Minutes before start for the single popup reminder on mirrored events.
pub const REMINDER_MINUTES: i64 = 15;
