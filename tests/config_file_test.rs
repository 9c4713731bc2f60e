mod common;

use std::io::Write;
use std::time::Duration;

use bluehole_core::config::{load_config, ResolutionPolicy};
use bluehole_core::projector::{ConfirmedTotals, VoteTotals};
use bluehole_core::tracker::types::{ActionKind, ActionPayload, VoteDirection};
use tempfile::NamedTempFile;

use common::session;

#[tokio::test(start_paused = true)]
async fn test_grace_period_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "grace_period_ms = 1000\nresolution_policy = \"LatestSubmissionWins\"\n\n[toasts]\nmax_visible = 3"
    )
    .unwrap();

    let config = load_config(Some(file.path())).unwrap();
    assert_eq!(config.grace_period(), Duration::from_secs(1));
    assert_eq!(config.resolution_policy, ResolutionPolicy::LatestSubmissionWins);
    assert_eq!(config.toasts.max_visible, 3);

    let s = session(config);
    s.chain
        .seed_totals("REF-2", ConfirmedTotals::Votes(VoteTotals::default()));
    let outcome = s
        .tracker
        .submit("REF-2", ActionKind::Vote, ActionPayload::vote(VoteDirection::Nay, 2))
        .unwrap()
        .await;
    assert!(outcome.success);
    assert!(s.tracker.has("REF-2", "alice"));

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert!(s.tracker.has("REF-2", "alice"));
    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(!s.tracker.has("REF-2", "alice"));
}

#[test]
fn test_invalid_file_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "grace_period_ms = 0").unwrap();

    assert!(load_config(Some(file.path())).is_err());
}
