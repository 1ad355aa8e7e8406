use indicatif::{ProgressBar, ProgressStyle};

pub fn get_progressbar_long_jobs(job_name: &str, len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_message(job_name.to_string());
    bar.set_style(
        ProgressStyle::with_template(" {msg} {wide_bar} estimated remaining: {eta_precise}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

/// Histogram of `values` in buckets of `step`, rendered as `from-to: count`
/// entries. Values at or above `max` share the last bucket.
pub fn format_histogram(values: impl IntoIterator<Item = usize>, step: usize, max: usize) -> String {
    let step = step.max(1);
    let buckets = max / step + 1;
    let mut counts = vec![0usize; buckets];
    for value in values {
        counts[(value.min(max)) / step] += 1;
    }
    counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(bucket, count)| {
            if bucket + 1 == buckets {
                format!("{}+: {}", bucket * step, count)
            } else {
                format!("{}-{}: {}", bucket * step, (bucket + 1) * step - 1, count)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::format_histogram;

    #[test]
    fn histogram_buckets() {
        assert_eq!(format_histogram([0, 1, 5, 12], 5, 10), "0-4: 2, 5-9: 1, 10+: 1");
        assert_eq!(format_histogram([], 5, 10), "");
    }
}
