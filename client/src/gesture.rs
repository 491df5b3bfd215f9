pub const SWIPE_THRESHOLD: f64 = 50.0;
pub const TAP_THRESHOLD: f64 = 10.0;
pub const TAP_MAX_DURATION_MS: f64 = 300.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Tap,
    SwipeUp,
    SwipeDown,
    SwipeLeft,
    SwipeRight,
}

impl Gesture {
    pub fn feedback(self) -> &'static str {
        match self {
            Gesture::Tap => "Play / Pause",
            Gesture::SwipeUp => "Faster",
            Gesture::SwipeDown => "Slower",
            Gesture::SwipeLeft => "Rewind",
            Gesture::SwipeRight => "Forward",
        }
    }
}

/// Classifies a finished touch from its displacement (screen coordinates,
/// y grows downward) and duration. The dominant axis decides the swipe.
pub fn classify(dx: f64, dy: f64, duration_ms: f64) -> Option<Gesture> {
    let (abs_x, abs_y) = (dx.abs(), dy.abs());
    if abs_x < TAP_THRESHOLD && abs_y < TAP_THRESHOLD && duration_ms < TAP_MAX_DURATION_MS {
        return Some(Gesture::Tap);
    }
    if abs_x > abs_y && abs_x > SWIPE_THRESHOLD {
        return Some(if dx > 0.0 {
            Gesture::SwipeRight
        } else {
            Gesture::SwipeLeft
        });
    }
    if abs_y > abs_x && abs_y > SWIPE_THRESHOLD {
        return Some(if dy < 0.0 {
            Gesture::SwipeUp
        } else {
            Gesture::SwipeDown
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_still_touch_is_a_tap() {
        assert_eq!(classify(3.0, -4.0, 120.0), Some(Gesture::Tap));
        assert_eq!(classify(3.0, -4.0, 450.0), None);
    }

    #[test]
    fn dominant_axis_wins() {
        assert_eq!(classify(-120.0, 30.0, 200.0), Some(Gesture::SwipeLeft));
        assert_eq!(classify(90.0, -60.0, 200.0), Some(Gesture::SwipeRight));
        assert_eq!(classify(20.0, -80.0, 200.0), Some(Gesture::SwipeUp));
        assert_eq!(classify(-10.0, 140.0, 900.0), Some(Gesture::SwipeDown));
    }

    #[test]
    fn short_drags_do_nothing() {
        assert_eq!(classify(40.0, 5.0, 200.0), None);
        assert_eq!(classify(50.0, 0.0, 200.0), None);
        assert_eq!(classify(30.0, 30.0, 100.0), None);
    }
}
