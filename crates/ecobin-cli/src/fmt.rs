//! Output formatting helpers.

use std::io::{self, Write};

use chrono::DateTime;

use ecobin_ledger::catalog::CouponView;
use ecobin_ledger::ledger::DashboardStats;
use ecobin_ledger::session::Notice;
use ecobin_ledger::storage::HistoryEntry;

/// `YYYY-MM-DD HH:MM` in UTC; the raw value when out of range.
pub fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0).map_or_else(
        || secs.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub fn format_points_change(change: i64) -> String {
    if change > 0 {
        format!("+{change}")
    } else {
        change.to_string()
    }
}

pub fn write_notice(w: &mut impl Write, notice: &Notice) -> io::Result<()> {
    writeln!(w, "{notice}")
}

pub fn write_history_entry(w: &mut impl Write, entry: &HistoryEntry) -> io::Result<()> {
    writeln!(
        w,
        "  {}  {:>6}  {}",
        format_timestamp(entry.created_at),
        format_points_change(entry.points_change),
        entry.description
    )
}

pub fn write_history(w: &mut impl Write, entries: &[HistoryEntry]) -> io::Result<()> {
    if entries.is_empty() {
        writeln!(w, "  No activity yet.")?;
        return Ok(());
    }
    for entry in entries {
        write_history_entry(w, entry)?;
    }
    Ok(())
}

pub fn write_dashboard(w: &mut impl Write, stats: &DashboardStats) -> io::Result<()> {
    writeln!(w, "  Points:   {}", stats.points)?;
    writeln!(w, "  Scans:    {}", stats.total_scans)?;
    writeln!(w, "  Redeemed: {}", stats.total_redeemed)?;
    writeln!(w)?;
    writeln!(w, "Recent activity:")?;
    write_history(w, &stats.recent_history)
}

pub fn write_coupons(w: &mut impl Write, views: &[CouponView]) -> io::Result<()> {
    for view in views {
        writeln!(
            w,
            "  {:<8} {:<28} {:>4} pts  [{}]",
            view.coupon.id, view.coupon.name, view.coupon.points, view.label
        )?;
    }
    Ok(())
}
