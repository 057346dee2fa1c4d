//! Shortening policies for clips longer than their cap.

/// A `[start, end)` window in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

impl TrimWindow {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the window covers the whole source.
    pub fn is_full(&self, source_duration: f64) -> bool {
        self.start <= 0.0 && self.end >= source_duration
    }
}

/// How to pick a window when a source exceeds its cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimPolicy {
    /// Keep the middle of the clip; used for compilation bodies
    Centered,
    /// Keep the beginning; used for shorts
    Leading,
}

impl TrimPolicy {
    /// Window to keep from a source of `duration` seconds.
    ///
    /// Sources at or under `max` (or with no cap) are kept whole.
    pub fn window(&self, duration: f64, max: Option<f64>) -> TrimWindow {
        match max {
            Some(max) if duration > max => match self {
                TrimPolicy::Centered => centered_window(duration, max),
                TrimPolicy::Leading => leading_window(max),
            },
            _ => TrimWindow {
                start: 0.0,
                end: duration,
            },
        }
    }
}

/// `[D/2 - M/2, D/2 + M/2]`
pub fn centered_window(duration: f64, max: f64) -> TrimWindow {
    TrimWindow {
        start: duration / 2.0 - max / 2.0,
        end: duration / 2.0 + max / 2.0,
    }
}

/// `[0, M]`
pub fn leading_window(max: f64) -> TrimWindow {
    TrimWindow {
        start: 0.0,
        end: max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_window() {
        let w = TrimPolicy::Centered.window(20.0, Some(8.0));
        assert_eq!(w, TrimWindow { start: 6.0, end: 14.0 });
        assert_eq!(w.duration(), 8.0);
    }

    #[test]
    fn test_leading_window() {
        let w = TrimPolicy::Leading.window(120.0, Some(59.0));
        assert_eq!(w, TrimWindow { start: 0.0, end: 59.0 });
    }

    #[test]
    fn test_short_sources_are_untouched() {
        for policy in [TrimPolicy::Centered, TrimPolicy::Leading] {
            let w = policy.window(7.5, Some(10.0));
            assert!(w.is_full(7.5));
            let w = policy.window(7.5, None);
            assert!(w.is_full(7.5));
        }
    }

    #[test]
    fn test_exactly_at_cap_is_untouched() {
        let w = TrimPolicy::Centered.window(10.0, Some(10.0));
        assert!(w.is_full(10.0));
    }
}
