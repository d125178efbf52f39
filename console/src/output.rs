use chrono::{DateTime, Utc};
use crash::{
    BranchSummary, CrashBadge, Notification, NotificationSink, NotificationVariant,
};
use crash_core::{compute_remaining, BranchView, GlobalCrashSnapshot};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Prints notifications the way the operator reads them on a terminal.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    errors: AtomicUsize,
}

impl ConsoleNotifier {
    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl NotificationSink for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        match n.variant {
            NotificationVariant::Success => println!("SUCCESS: {} - {}", n.title, n.description),
            NotificationVariant::Info => println!("INFO: {} - {}", n.title, n.description),
            NotificationVariant::Destructive => {
                self.errors.fetch_add(1, Ordering::SeqCst);
                eprintln!("ERROR: {} - {}", n.title, n.description);
            }
        }
    }
}

pub fn print_branches(branches: &[BranchSummary], now: DateTime<Utc>) {
    println!("{:<20} | {:<24} | {:<10} | {:<9}", "ID", "NAME", "STATUS", "REMAINING");
    println!("{:-<20}-+-{:-<24}-+-{:-<10}-+-{:-<9}", "", "", "", "");
    for branch in branches {
        let (status, remaining) = if branch.active() {
            ("CRASHING", compute_remaining(branch, now).display())
        } else {
            ("normal", "-".to_string())
        };
        println!(
            "{:<20} | {:<24} | {:<10} | {:<9}",
            branch.branch_id(),
            branch.name(),
            status,
            remaining
        );
    }
}

pub fn print_snapshot(snapshot: &GlobalCrashSnapshot) {
    if !snapshot.is_any_branch_crashing() {
        println!("No branch is crashing");
        return;
    }
    let labels: Vec<&str> = snapshot
        .crashing_branches()
        .iter()
        .map(|b| b.label())
        .collect();
    println!(
        "MARKET CRASH ACTIVE on {} branch(es): {}",
        labels.len(),
        labels.join(", ")
    );
}

pub fn print_view(view: &BranchView) {
    let state = view.state();
    if state.active() {
        println!(
            "{} [{}] crashing at {}%, {} remaining",
            state.label(),
            state.branch_id(),
            state.intensity_percent(),
            view.timer().display()
        );
    } else {
        println!("{} [{}] is not crashing", state.label(), state.branch_id());
    }

    if let Some(entry) = view.history() {
        let badge = match entry.badge() {
            CrashBadge::Active => "active",
            CrashBadge::Ended => "ended",
        };
        println!(
            "  last crash: started {}, {} min at {}% ({})",
            entry.started_at().format("%Y-%m-%d %H:%M:%S UTC"),
            entry.duration_minutes(),
            entry.intensity_percent(),
            badge
        );
    }
}

pub fn print_countdown(view: &BranchView) {
    println!(
        "{} [{}] {}",
        view.state().label(),
        view.state().branch_id(),
        view.timer().display()
    );
}
