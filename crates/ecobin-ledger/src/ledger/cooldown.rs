//! Scan cooldown state for a single (user, bin) pair.
//!
//! ```text
//! Eligible --scan--> Cooling(now)
//! Cooling(t) --scan, now - t >= cooldown--> Cooling(now)
//! Cooling(t) --scan, now - t <  cooldown--> Cooling(t)   (rejected)
//! ```

use crate::storage::ScanRecord;

const SECS_PER_MINUTE: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownState {
    /// No scan recorded yet.
    Eligible,
    Cooling { last_scanned_at: i64 },
}

impl CooldownState {
    pub fn from_record(record: Option<&ScanRecord>) -> Self {
        record.map_or(Self::Eligible, |r| Self::Cooling {
            last_scanned_at: r.last_scanned_at,
        })
    }

    /// `Ok` when a scan at `now` may be awarded, otherwise the whole minutes
    /// left before the next accepted scan.
    pub fn check(&self, now: i64, cooldown_secs: i64) -> Result<(), i64> {
        match *self {
            Self::Eligible => Ok(()),
            Self::Cooling { last_scanned_at } => {
                // A record from the future (clock skew) counts as just scanned.
                let elapsed = (now - last_scanned_at).max(0);
                if elapsed >= cooldown_secs {
                    Ok(())
                } else {
                    Err(remaining_minutes(cooldown_secs - elapsed))
                }
            }
        }
    }
}

/// Ceiling of `remaining_secs` in minutes.
pub fn remaining_minutes(remaining_secs: i64) -> i64 {
    (remaining_secs + SECS_PER_MINUTE - 1).div_euclid(SECS_PER_MINUTE)
}
