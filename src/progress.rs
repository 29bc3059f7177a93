/// Parses one line of yt-dlp output produced by
/// `--progress-template downloaded_bytes:%(progress._percent_str)s`.
/// Returns the fraction 0.0..=1.0 for the current download.
pub fn parse_progress_from_line(line: &str) -> Option<f32> {
    if let Some(rest) = line.strip_prefix("downloaded_bytes:") {
        let trimmed = rest.trim();
        if let Some(number) = trimmed.strip_suffix('%') {
            if let Ok(v) = number.trim().parse::<f32>() {
                return Some(v / 100.0);
            }
        }
    }
    None
}

/// Overall percentage after `completed` of `total` items:
/// `round(100 * completed / total)`. Non-decreasing as `completed` grows and
/// exactly 100 once every item has been attempted, failed or not.
pub fn overall_percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_template_lines() {
        let frac = parse_progress_from_line("downloaded_bytes:  42.3%").unwrap();
        assert!((frac - 0.423).abs() < 1e-4);
        assert_eq!(parse_progress_from_line("downloaded_bytes: 100.0%"), Some(1.0));
        assert_eq!(parse_progress_from_line("[download] Destination: x.mp4"), None);
        assert_eq!(parse_progress_from_line("downloaded_bytes: N/A"), None);
    }

    #[test]
    fn percent_sequence_is_monotonic_and_ends_at_100() {
        for total in 1..=17 {
            let mut last = 0;
            for completed in 1..=total {
                let pct = overall_percent(completed, total);
                assert!(pct >= last, "regressed at {completed}/{total}");
                last = pct;
            }
            assert_eq!(last, 100);
        }
    }

    #[test]
    fn rounds_to_nearest() {
        assert_eq!(overall_percent(1, 3), 33);
        assert_eq!(overall_percent(2, 3), 67);
        assert_eq!(overall_percent(1, 8), 13);
    }
}
