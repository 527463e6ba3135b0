use chrono::Utc;
use std::path::PathBuf;

/// Timestamped directory for one tester run's saves.
pub fn run_store_dir(base: &str) -> PathBuf {
    let ts = Utc::now().format("%Y%m%dT%H%M%S");
    PathBuf::from(base).join(format!("run-{ts}"))
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn run_dirs_live_under_the_base() {
        let dir = run_store_dir("target/saves");
        assert!(dir.starts_with("target/saves"));
        assert!(
            dir.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("run-"))
        );
    }
}
