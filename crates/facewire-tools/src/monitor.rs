//! Per-instance summary of the instance monitor CSV.

use crate::ToolError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One row of the monitor CSV. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSample {
    pub timestamp: String,
    pub instance_id: String,
    pub fps: f64,
    pub current_framerate: f64,
    /// Milliseconds.
    pub latency: f64,
    pub cpu_usage_percent: f64,
    pub dropped_frames_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSummary {
    pub instance_id: String,
    pub samples: usize,
    pub first_timestamp: String,
    /// Last row for the instance, in file order.
    pub latest: MonitorSample,
    pub avg_fps: f64,
    pub avg_current_framerate: f64,
    pub avg_latency: f64,
    pub max_latency: f64,
    pub avg_cpu_usage_percent: f64,
}

pub fn read_samples(path: &Path) -> Result<Vec<MonitorSample>, ToolError> {
    let file = std::fs::File::open(path).map_err(|source| ToolError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_samples(file)
}

pub fn parse_samples<R: Read>(reader: R) -> Result<Vec<MonitorSample>, ToolError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let samples = csv
        .deserialize()
        .collect::<Result<Vec<MonitorSample>, csv::Error>>()?;
    tracing::debug!(rows = samples.len(), "monitor samples read");
    Ok(samples)
}

/// Group samples by instance, in order of first appearance.
pub fn summarize(samples: &[MonitorSample]) -> Vec<InstanceSummary> {
    let mut order: Vec<&str> = Vec::new();
    for sample in samples {
        if !order.contains(&sample.instance_id.as_str()) {
            order.push(&sample.instance_id);
        }
    }

    order
        .into_iter()
        .filter_map(|id| {
            let rows: Vec<&MonitorSample> = samples.iter().filter(|s| s.instance_id == id).collect();
            let first = rows.first()?;
            let latest = rows.last()?;
            let n = rows.len() as f64;
            let mean = |f: fn(&MonitorSample) -> f64| rows.iter().map(|s| f(s)).sum::<f64>() / n;
            Some(InstanceSummary {
                instance_id: id.to_string(),
                samples: rows.len(),
                first_timestamp: first.timestamp.clone(),
                latest: (*latest).clone(),
                avg_fps: mean(|s| s.fps),
                avg_current_framerate: mean(|s| s.current_framerate),
                avg_latency: mean(|s| s.latency),
                max_latency: rows.iter().map(|s| s.latency).fold(f64::MIN, f64::max),
                avg_cpu_usage_percent: mean(|s| s.cpu_usage_percent),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
timestamp,instance_id,fps,current_framerate,latency,cpu_usage_percent,dropped_frames_count
2025-01-10 10:00:00,cam-a,25.0,24.0,40,30.5,0
2025-01-10 10:00:00,cam-b,15.0,14.5,80,50.0,3
2025-01-10 10:00:05,cam-a,23.0,22.0,60,32.5,1
";

    #[test]
    fn test_summary_per_instance() {
        let samples = parse_samples(CSV.as_bytes()).unwrap();
        let summary = summarize(&samples);

        assert_eq!(summary.len(), 2);
        let a = &summary[0];
        assert_eq!(a.instance_id, "cam-a");
        assert_eq!(a.samples, 2);
        assert_eq!(a.first_timestamp, "2025-01-10 10:00:00");
        assert_eq!(a.latest.timestamp, "2025-01-10 10:00:05");
        assert_eq!(a.latest.dropped_frames_count, 1);
        assert_eq!(a.avg_fps, 24.0);
        assert_eq!(a.avg_latency, 50.0);
        assert_eq!(a.max_latency, 60.0);
        assert_eq!(a.avg_cpu_usage_percent, 31.5);

        assert_eq!(summary[1].instance_id, "cam-b");
        assert_eq!(summary[1].samples, 1);
    }

    #[test]
    fn test_extra_columns_ignored() {
        let csv = "instance_id,timestamp,fps,current_framerate,latency,cpu_usage_percent,dropped_frames_count,gpu\n\
                   cam-x,t0,10,10,5,1.0,0,77\n";
        let samples = parse_samples(csv.as_bytes()).unwrap();
        assert_eq!(samples[0].instance_id, "cam-x");
    }

    #[test]
    fn test_bad_row_is_csv_error() {
        let csv = "timestamp,instance_id,fps,current_framerate,latency,cpu_usage_percent,dropped_frames_count\n\
                   t0,cam-a,fast,10,5,1.0,0\n";
        assert!(matches!(parse_samples(csv.as_bytes()), Err(ToolError::Csv(_))));
    }

    #[test]
    fn test_read_samples_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();
        assert_eq!(read_samples(file.path()).unwrap().len(), 3);
        assert!(matches!(
            read_samples(Path::new("/nonexistent/instance_monitor.csv")),
            Err(ToolError::Io { .. })
        ));
    }

    #[test]
    fn test_empty_csv_has_no_instances() {
        let csv = "timestamp,instance_id,fps,current_framerate,latency,cpu_usage_percent,dropped_frames_count\n";
        assert!(summarize(&parse_samples(csv.as_bytes()).unwrap()).is_empty());
    }
}
