use super::{BucketGrid, MalformedSampleSet, Sample, SeriesPoint};
use std::collections::HashMap;

/// A gap-free series aligned to a grid, with its totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedSeries {
    pub series: Vec<SeriesPoint>,
    pub visits: i64,
    pub page_views: i64,
}

/// Merge sparse samples onto `grid`, zero-filling absent buckets.
///
/// Two samples sharing a bucket key fail with [`MalformedSampleSet`].
/// Samples outside the grid are ignored. Counts are passed through
/// unchanged, negative values included. Totals are summed over the emitted
/// series so they always agree with it.
pub fn normalize(
    samples: &[Sample],
    grid: &BucketGrid,
) -> Result<NormalizedSeries, MalformedSampleSet> {
    let mut by_bucket: HashMap<&str, &Sample> = HashMap::with_capacity(samples.len());
    for sample in samples {
        if by_bucket.insert(sample.bucket.as_str(), sample).is_some() {
            return Err(MalformedSampleSet {
                bucket: sample.bucket.clone(),
            });
        }
    }

    let series: Vec<SeriesPoint> = grid
        .keys()
        .iter()
        .map(|key| {
            let (visits, page_views) = by_bucket
                .get(key.as_str())
                .map_or((0, 0), |s| (s.visits, s.page_views));
            SeriesPoint {
                timestamp: key.clone(),
                visits,
                page_views,
            }
        })
        .collect();

    let (visits, page_views) = series.iter().fold((0i64, 0i64), |(v, pv), point| {
        (
            v.saturating_add(point.visits),
            pv.saturating_add(point.page_views),
        )
    });

    Ok(NormalizedSeries {
        series,
        visits,
        page_views,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Period;
    use chrono::{TimeZone, Utc};

    fn week_grid() -> BucketGrid {
        BucketGrid::generate(Period::Week, Utc.with_ymd_and_hms(2024, 1, 21, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_zero_fills_missing_buckets() {
        let grid = week_grid();
        let samples = vec![Sample::new("2024-01-17", 5, 9)];
        let out = normalize(&samples, &grid).unwrap();

        assert_eq!(out.series.len(), 7);
        assert_eq!(out.series[0].timestamp, "2024-01-15");
        assert_eq!((out.series[0].visits, out.series[0].page_views), (0, 0));
        assert_eq!(out.series[2].timestamp, "2024-01-17");
        assert_eq!((out.series[2].visits, out.series[2].page_views), (5, 9));
        assert_eq!((out.visits, out.page_views), (5, 9));
    }

    #[test]
    fn test_empty_samples_give_all_zero_series() {
        let grid = week_grid();
        let out = normalize(&[], &grid).unwrap();
        assert_eq!(out.series.len(), 7);
        assert!(out.series.iter().all(|p| p.visits == 0 && p.page_views == 0));
        assert_eq!((out.visits, out.page_views), (0, 0));
    }

    #[test]
    fn test_out_of_window_samples_are_ignored() {
        let grid = week_grid();
        let samples = vec![
            Sample::new("2023-12-01", 100, 100),
            Sample::new("2024-01-21", 2, 3),
            Sample::new("not-a-date", 7, 7),
        ];
        let out = normalize(&samples, &grid).unwrap();
        assert_eq!((out.visits, out.page_views), (2, 3));
        assert_eq!(out.series[6].visits, 2);
    }

    #[test]
    fn test_duplicate_bucket_is_rejected() {
        let grid = week_grid();
        let samples = vec![
            Sample::new("2024-01-16", 1, 1),
            Sample::new("2024-01-16", 2, 2),
        ];
        let err = normalize(&samples, &grid).unwrap_err();
        assert_eq!(err.bucket, "2024-01-16");
    }

    #[test]
    fn test_duplicate_outside_grid_is_still_rejected() {
        let grid = week_grid();
        let samples = vec![Sample::new("1999-01-01", 1, 1), Sample::new("1999-01-01", 1, 1)];
        assert!(normalize(&samples, &grid).is_err());
    }

    #[test]
    fn test_negative_counts_pass_through() {
        let grid = week_grid();
        let samples = vec![Sample::new("2024-01-18", -3, 4)];
        let out = normalize(&samples, &grid).unwrap();
        assert_eq!(out.series[3].visits, -3);
        assert_eq!(out.visits, -3);
    }

    #[test]
    fn test_page_views_below_visits_are_kept() {
        let grid = week_grid();
        let samples = vec![Sample::new("2024-01-19", 10, 4)];
        let out = normalize(&samples, &grid).unwrap();
        assert_eq!((out.visits, out.page_views), (10, 4));
    }

    #[test]
    fn test_hourly_keys_merge_by_exact_match() {
        let grid = BucketGrid::generate(
            Period::Day,
            Utc.with_ymd_and_hms(2024, 1, 15, 3, 20, 0).unwrap(),
        );
        let samples = vec![
            Sample::new("2024-01-15T02:00:00Z", 4, 6),
            // Different key format for the same hour does not merge.
            Sample::new("2024-01-15 02:00", 50, 50),
        ];
        let out = normalize(&samples, &grid).unwrap();
        assert_eq!(out.series[22].timestamp, "2024-01-15T02:00:00Z");
        assert_eq!(out.series[22].visits, 4);
        assert_eq!(out.visits, 4);
    }
}
