//! Built-in pattern catalog.

use super::TimingPattern;

/// The ten stock patterns. Every entry reaches 100% within a nominal
/// 100-tick, 8-segment run when pauses are ignored.
pub fn builtin_catalog() -> Vec<TimingPattern> {
    vec![
        TimingPattern::new(
            "slow-fast-slow",
            vec![0.4, 0.6, 1.0, 1.5, 1.8, 1.5, 1.0, 0.6],
            vec![3, 6],
            vec![400, 500],
        ),
        TimingPattern::new(
            "fast-slow-fast",
            vec![1.8, 1.5, 0.5, 0.4, 0.6, 1.2, 1.6, 1.8],
            vec![2, 5],
            vec![350, 450],
        ),
        TimingPattern::new("steady", vec![1.0; 8], vec![4], vec![600]),
        TimingPattern::new(
            "variable",
            vec![0.7, 1.3, 0.8, 1.5, 0.9, 1.2, 0.6, 1.4],
            vec![2, 5, 7],
            vec![300, 400, 350],
        ),
        TimingPattern::new(
            "accelerating",
            vec![0.3, 0.5, 0.7, 0.9, 1.1, 1.3, 1.5, 1.7],
            vec![3],
            vec![450],
        ),
        TimingPattern::new(
            "decelerating",
            vec![1.8, 1.6, 1.4, 1.2, 1.0, 0.8, 0.6, 0.4],
            vec![5],
            vec![500],
        ),
        TimingPattern::new(
            "fast-slow-rhythm",
            vec![1.5, 0.6, 1.4, 0.7, 1.3, 0.8, 1.2, 0.9],
            vec![1, 4, 7],
            vec![250, 350, 300],
        ),
        TimingPattern::new(
            "slow-fast-rhythm",
            vec![0.5, 1.6, 0.6, 1.5, 0.7, 1.4, 0.8, 1.3],
            vec![2, 6],
            vec![400, 450],
        ),
        TimingPattern::new(
            "double-burst",
            vec![0.8, 1.8, 1.8, 0.7, 0.6, 1.7, 1.7, 0.9],
            vec![1, 4],
            vec![300, 400],
        ),
        TimingPattern::new(
            "wave",
            vec![0.7, 1.0, 1.3, 1.5, 1.3, 1.0, 0.7, 0.6],
            vec![3, 6],
            vec![350, 400],
        ),
    ]
}
