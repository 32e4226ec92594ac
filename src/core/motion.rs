//! Frame-difference motion heuristic.
//!
//! The score of a frame is the summed absolute difference of its RGB channels
//! against the preceding frame, divided by the pixel count. It lies in
//! `0.0..=765.0`. Alpha is ignored.

use image::RgbaImage;

/// Default score a frame must exceed to count as a hit.
pub const DEFAULT_THRESHOLD: f64 = 25.0;

/// Default number of consecutive hits that confirms motion.
pub const DEFAULT_REQUIRED_STREAK: u32 = 3;

/// Compute the per-pixel motion score between two frames.
///
/// Returns `None` when the frames differ in size (the stream was renegotiated)
/// or are empty.
pub fn motion_score(previous: &RgbaImage, current: &RgbaImage) -> Option<f64> {
    if previous.dimensions() != current.dimensions() {
        return None;
    }
    let pixels = (current.width() as u64) * (current.height() as u64);
    if pixels == 0 {
        return None;
    }

    let total: u64 = previous
        .as_raw()
        .chunks_exact(4)
        .zip(current.as_raw().chunks_exact(4))
        .map(|(a, b)| {
            (a[0].abs_diff(b[0]) as u64) + (a[1].abs_diff(b[1]) as u64) + (a[2].abs_diff(b[2]) as u64)
        })
        .sum();

    Some(total as f64 / pixels as f64)
}

/// Debounces per-frame scores into a single confirmation.
///
/// A score strictly above the threshold extends the streak; anything else
/// decays it by one, floored at zero.
#[derive(Debug, Clone)]
pub struct MotionDebouncer {
    threshold: f64,
    required: u32,
    streak: u32,
}

impl MotionDebouncer {
    pub fn new(threshold: f64, required: u32) -> Self {
        Self {
            threshold,
            required: required.max(1),
            streak: 0,
        }
    }

    /// Feed one score. Returns `true` when this frame completes the streak.
    pub fn observe(&mut self, score: f64) -> bool {
        if score > self.threshold {
            self.streak += 1;
            self.streak >= self.required
        } else {
            self.streak = self.streak.saturating_sub(1);
            false
        }
    }

    /// Forget the current streak.
    pub fn reset(&mut self) {
        self.streak = 0;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn required(&self) -> u32 {
        self.required
    }
}

impl Default for MotionDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD, DEFAULT_REQUIRED_STREAK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_identical_frames_score_zero() {
        let a = RgbaImage::from_pixel(3, 3, Rgba([40, 50, 60, 255]));
        assert_eq!(motion_score(&a, &a.clone()), Some(0.0));
    }

    #[test]
    fn test_score_is_per_pixel_rgb_sum() {
        let a = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let b = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0]));
        // Alpha changes are ignored.
        assert_eq!(motion_score(&a, &b), Some(60.0));

        let black = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let white = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        assert_eq!(motion_score(&black, &white), Some(765.0));
    }

    #[test]
    fn test_partial_change_is_averaged() {
        let a = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        let mut b = a.clone();
        b.put_pixel(0, 0, Rgba([100, 0, 0, 255]));
        assert_eq!(motion_score(&a, &b), Some(50.0));
    }

    #[test]
    fn test_mismatched_dimensions() {
        let a = RgbaImage::new(2, 2);
        let b = RgbaImage::new(3, 2);
        assert_eq!(motion_score(&a, &b), None);
        assert_eq!(motion_score(&RgbaImage::new(0, 0), &RgbaImage::new(0, 0)), None);
    }

    #[test]
    fn test_streak_confirms_on_third_consecutive_hit() {
        let mut debouncer = MotionDebouncer::new(25.0, 3);
        let scores = [5.0, 5.0, 40.0, 42.0, 45.0, 5.0];

        let fired: Vec<usize> = scores
            .iter()
            .enumerate()
            .filter(|(_, s)| debouncer.observe(**s))
            .map(|(i, _)| i)
            .collect();

        assert_eq!(fired.first(), Some(&4));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut debouncer = MotionDebouncer::new(25.0, 1);
        assert!(!debouncer.observe(25.0));
        assert!(debouncer.observe(25.1));
    }

    #[test]
    fn test_decay_is_one_step() {
        let mut debouncer = MotionDebouncer::new(25.0, 3);
        assert!(!debouncer.observe(30.0));
        assert!(!debouncer.observe(30.0));
        assert_eq!(debouncer.streak(), 2);

        // One quiet frame only costs one step.
        assert!(!debouncer.observe(0.0));
        assert_eq!(debouncer.streak(), 1);
        assert!(!debouncer.observe(30.0));
        assert!(debouncer.observe(30.0));

        debouncer.reset();
        assert!(!debouncer.observe(0.0));
        assert_eq!(debouncer.streak(), 0);
    }

    #[test]
    fn test_never_confirms_below_threshold() {
        let mut debouncer = MotionDebouncer::default();
        assert!((0..1000).all(|i| !debouncer.observe((i % 26) as f64)));
    }
}
