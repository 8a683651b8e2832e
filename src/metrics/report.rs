use std::cmp::Ordering;

use serde::Serialize;

use crate::types::{CorpusResult, PerFileResult, Split};

pub const SCHEMA_VERSION: u32 = 1;
const OUTLIER_TOP_N: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: Meta,
    pub files: Vec<FileReport>,
    pub skipped: Vec<SkippedFile>,
    pub aggregates: AggregateReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub generated_at: String,
    pub config_path: String,
    pub checkpoint_path: String,
    pub corpus_path: String,
    pub device: String,
    pub split: Split,
    pub window: String,
    pub resolutions: Vec<usize>,
    pub voicing_floor_hz: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    #[serde(flatten)]
    pub result: PerFileResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f0_mean_error: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub corpus: CorpusResult,
    pub skipped_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectral_loss: Option<MetricDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f0_mean_error: Option<MetricDistribution>,
    pub outliers: OutlierReport,
}

/// Unweighted distribution of a per-file metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricDistribution {
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlierReport {
    pub worst_spectral_loss: Vec<OutlierEntry>,
    pub worst_f0_mean_error: Vec<OutlierEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutlierEntry {
    pub id: String,
    pub value: f64,
}

pub fn build_report(
    meta: Meta,
    files: &[PerFileResult],
    skipped: Vec<SkippedFile>,
    corpus: CorpusResult,
) -> Report {
    let spectral: Vec<f64> = files.iter().map(|file| file.spectral_loss).collect();
    let f0: Vec<f64> = files.iter().filter_map(PerFileResult::f0_mean_error).collect();

    let aggregates = AggregateReport {
        corpus,
        skipped_count: skipped.len(),
        spectral_loss: distribution_or_none(&spectral),
        f0_mean_error: distribution_or_none(&f0),
        outliers: OutlierReport {
            worst_spectral_loss: ranked_outliers(files, OUTLIER_TOP_N, |file| {
                Some(file.spectral_loss)
            }),
            worst_f0_mean_error: ranked_outliers(files, OUTLIER_TOP_N, PerFileResult::f0_mean_error),
        },
    };

    Report {
        schema_version: SCHEMA_VERSION,
        meta,
        files: files
            .iter()
            .map(|file| FileReport {
                f0_mean_error: file.f0_mean_error(),
                result: file.clone(),
            })
            .collect(),
        skipped,
        aggregates,
    }
}

fn ranked_outliers(
    files: &[PerFileResult],
    top_n: usize,
    metric: impl Fn(&PerFileResult) -> Option<f64>,
) -> Vec<OutlierEntry> {
    let mut entries: Vec<OutlierEntry> = files
        .iter()
        .filter_map(|file| {
            metric(file)
                .filter(|value| value.is_finite())
                .map(|value| OutlierEntry {
                    id: file.id.clone(),
                    value,
                })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    entries.truncate(top_n);
    entries
}

fn distribution_or_none(values: &[f64]) -> Option<MetricDistribution> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    Some(MetricDistribution {
        mean: mean(&sorted),
        p50: percentile_sorted(&sorted, 0.5),
        p90: percentile_sorted(&sorted, 0.9),
        p95: percentile_sorted(&sorted, 0.95),
        p99: percentile_sorted(&sorted, 0.99),
    })
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn percentile_sorted(sorted_values: &[f64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    if sorted_values.len() == 1 {
        return sorted_values[0];
    }

    let clamped = percentile.clamp(0.0, 1.0);
    let max_index = (sorted_values.len() - 1) as f64;
    let rank = clamped * max_index;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted_values[lower]
    } else {
        let weight = rank - lower as f64;
        sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, spectral_loss: f64, f0_sum: f64, frames: usize) -> PerFileResult {
        PerFileResult {
            id: id.to_string(),
            spectral_loss,
            waveform_length: 1000,
            f0_abs_error_sum: f0_sum,
            valid_voiced_frames: frames,
            unvoiced_estimate_frames: 1,
        }
    }

    fn meta() -> Meta {
        Meta {
            generated_at: "2026-01-01T00:00:00Z".to_string(),
            config_path: "config.yaml".to_string(),
            checkpoint_path: "model.safetensors".to_string(),
            corpus_path: "data".to_string(),
            device: "cpu".to_string(),
            split: Split::Test,
            window: "hann".to_string(),
            resolutions: vec![512, 1024, 2048],
            voicing_floor_hz: 80.0,
        }
    }

    fn corpus() -> CorpusResult {
        CorpusResult {
            weighted_spectral_loss: 1.0,
            weighted_f0_error: 10.0,
            total_frames: 3000,
            total_valid_f0_frames: 6,
            total_unvoiced_estimate_frames: 3,
            file_count: 3,
        }
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(percentile_sorted(&sorted, 1.0), 4.0);
        assert!((percentile_sorted(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(percentile_sorted(&[7.0], 0.9), 7.0);
    }

    #[test]
    fn outliers_rank_descending_with_id_tiebreak() {
        let files = vec![
            file("b", 2.0, 0.0, 0),
            file("a", 2.0, 0.0, 0),
            file("c", 5.0, 0.0, 0),
        ];
        let ranked = ranked_outliers(&files, 2, |f| Some(f.spectral_loss));
        let ids: Vec<&str> = ranked.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn report_skips_unvoiced_files_in_f0_statistics() {
        let files = vec![
            file("a", 1.0, 20.0, 2),
            file("b", 3.0, 0.0, 0),
            file("c", 2.0, 40.0, 4),
        ];
        let skipped = vec![SkippedFile {
            id: "d".to_string(),
            reason: "missing .pv".to_string(),
        }];
        let report = build_report(meta(), &files, skipped, corpus());
        assert_eq!(report.files.len(), 3);
        assert_eq!(report.aggregates.skipped_count, 1);
        let f0 = report.aggregates.f0_mean_error.as_ref().unwrap();
        assert!((f0.mean - 10.0).abs() < 1e-12);
        assert_eq!(report.aggregates.outliers.worst_f0_mean_error.len(), 2);
        assert_eq!(report.aggregates.outliers.worst_spectral_loss[0].id, "b");
        assert!(report.files[1].f0_mean_error.is_none());
    }

    #[test]
    fn report_serializes_flattened_file_entries() {
        let report = build_report(meta(), &[file("a", 1.5, 30.0, 3)], Vec::new(), corpus());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["schema_version"], SCHEMA_VERSION);
        assert_eq!(json["meta"]["split"], "test");
        assert_eq!(json["files"][0]["id"], "a");
        assert_eq!(json["files"][0]["valid_voiced_frames"], 3);
        assert_eq!(json["files"][0]["unvoiced_estimate_frames"], 1);
        assert_eq!(json["files"][0]["f0_mean_error"], 10.0);
        assert_eq!(json["aggregates"]["corpus"]["total_frames"], 3000);
        assert_eq!(
            json["aggregates"]["corpus"]["total_unvoiced_estimate_frames"],
            3
        );
    }
}
