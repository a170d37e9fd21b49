//! Splitting the input into output segments.

use std::path::{Path, PathBuf};

/// One contiguous range of mono samples destined for one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPlan {
    pub segment_index: usize,
    pub sample_offset: u64,
    pub sample_count: u64,
}

impl SegmentPlan {
    /// Tile `[0, total)` with segments of `per_file` samples.
    ///
    /// The last segment takes whatever is left. Returns an empty plan list
    /// when `total` is zero; `per_file` of zero is treated as "everything in
    /// one file".
    pub fn tile(total: u64, per_file: u64) -> Vec<SegmentPlan> {
        if total == 0 {
            return Vec::new();
        }
        let per_file = if per_file == 0 { total } else { per_file };

        let segment_count = total.div_ceil(per_file);
        (0..segment_count)
            .map(|index| {
                let sample_offset = index * per_file;
                SegmentPlan {
                    segment_index: index as usize,
                    sample_offset,
                    sample_count: per_file.min(total - sample_offset),
                }
            })
            .collect()
    }

    pub fn end(&self) -> u64 {
        self.sample_offset + self.sample_count
    }

    pub fn duration_sec(&self, sample_rate_hz: u32) -> f64 {
        self.sample_count as f64 / sample_rate_hz as f64
    }

    /// `talk.mp3` becomes `talk.007.chirp.mp3` for segment 7.
    pub fn output_path(&self, input: &Path, extension: &str) -> PathBuf {
        input.with_extension(format!(
            "{:03}.{}.{extension}",
            self.segment_index,
            crate::defaults::OUTPUT_TAG
        ))
    }
}

/// Samples per output file for a requested file duration.
///
/// Zero duration means a single file covering the whole input.
pub fn file_sample_count(file_duration_sec: f64, sample_rate_hz: u32, total: u64) -> u64 {
    if file_duration_sec <= 0.0 {
        return total;
    }
    ((file_duration_sec * sample_rate_hz as f64).round() as u64).max(1)
}

/// Total samples to process, honouring an optional duration cap.
pub fn capped_total(total: u64, max_duration_sec: Option<f64>, sample_rate_hz: u32) -> u64 {
    match max_duration_sec {
        Some(max) if max >= 0.0 => total.min((max * sample_rate_hz as f64).round() as u64),
        _ => total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiles_contiguously_with_short_tail() {
        let plans = SegmentPlan::tile(25, 10);

        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].sample_offset, 0);
        assert_eq!(plans[1].sample_offset, 10);
        assert_eq!(plans[2].sample_offset, 20);
        assert_eq!(plans[2].sample_count, 5);

        for pair in plans.windows(2) {
            assert_eq!(pair[0].end(), pair[1].sample_offset);
        }
        let covered: u64 = plans.iter().map(|p| p.sample_count).sum();
        assert_eq!(covered, 25);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let plans = SegmentPlan::tile(30, 10);
        assert_eq!(plans.len(), 3);
        assert!(plans.iter().all(|p| p.sample_count == 10));
    }

    #[test]
    fn per_file_larger_than_total_gives_one_segment() {
        let plans = SegmentPlan::tile(7, 100);
        assert_eq!(
            plans,
            vec![SegmentPlan {
                segment_index: 0,
                sample_offset: 0,
                sample_count: 7
            }]
        );
    }

    #[test]
    fn zero_total_plans_nothing() {
        assert!(SegmentPlan::tile(0, 10).is_empty());
    }

    #[test]
    fn indices_ascend_from_zero() {
        let plans = SegmentPlan::tile(1000, 64);
        for (i, plan) in plans.iter().enumerate() {
            assert_eq!(plan.segment_index, i);
            assert!(plan.sample_count > 0);
        }
    }

    #[test]
    fn output_path_replaces_extension() {
        let plan = SegmentPlan {
            segment_index: 7,
            sample_offset: 0,
            sample_count: 1,
        };
        assert_eq!(
            plan.output_path(Path::new("/audio/talk.mp3"), "mp3"),
            PathBuf::from("/audio/talk.007.chirp.mp3")
        );
        assert_eq!(
            plan.output_path(Path::new("noext"), "mp3"),
            PathBuf::from("noext.007.chirp.mp3")
        );
    }

    #[test]
    fn file_sample_count_zero_means_whole_input() {
        assert_eq!(file_sample_count(0.0, 8000, 12345), 12345);
        assert_eq!(file_sample_count(1.5, 8000, 12345), 12000);
    }

    #[test]
    fn capped_total_honours_limit() {
        assert_eq!(capped_total(16000, Some(1.0), 8000), 8000);
        assert_eq!(capped_total(16000, Some(10.0), 8000), 16000);
        assert_eq!(capped_total(16000, None, 8000), 16000);
    }
}
