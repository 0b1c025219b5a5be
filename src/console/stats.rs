//! Statistics line formatting

use std::time::Duration;

/// One-line summary of the current or last run
pub fn format_stats(running: bool, count: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if running {
        let rate = if secs > 0.0 { count as f64 / secs } else { 0.0 };
        format!(
            "Actions: {} | Time: {:.1}s | Rate: {:.1} CPS/APS",
            group_thousands(count),
            secs,
            rate
        )
    } else if count > 0 {
        format!("Last Session: {} actions", group_thousands(count))
    } else {
        "Ready to start...".to_string()
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
