//! Human-readable elapsed time formatting for run reports

use std::time::Duration;

/// Format an elapsed duration by magnitude:
/// - under 100 s: `X.XXs`
/// - under 100 min: `M:SS.Xs`
/// - otherwise: `H:MM:SS`
///
/// # Examples
///
/// ```
/// use songstats_common::human_time::format_elapsed;
/// use std::time::Duration;
///
/// assert_eq!(format_elapsed(Duration::from_millis(4_500)), "4.50s");
/// assert_eq!(format_elapsed(Duration::from_secs(330)), "5:30.0s");
/// assert_eq!(format_elapsed(Duration::from_secs(7_261)), "2:01:01");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 100.0 {
        format!("{:.2}s", secs)
    } else if secs < 6000.0 {
        let minutes = (secs / 60.0).floor();
        format!("{}:{:04.1}s", minutes as u64, secs - minutes * 60.0)
    } else {
        let whole = elapsed.as_secs();
        format!("{}:{:02}:{:02}", whole / 3600, (whole % 3600) / 60, whole % 60)
    }
}
