//! Clap wiring of the subcommands.

use super::*;
use rstest::rstest;

#[rstest]
fn update_trails_flags_reach_the_args() {
    let cli = Cli::try_parse_from([
        "traildb",
        "update-trails",
        "--cutoff",
        "2024-02-01",
        "--max-retries",
        "3",
        "--data-dir",
        "/srv/traildb/data",
        "--verbose",
    ])
    .expect("arguments parse");

    assert!(cli.verbose);
    match cli.command {
        Command::UpdateTrails(args) => {
            assert_eq!(args.cutoff.as_deref(), Some("2024-02-01"));
            assert_eq!(args.max_retries, Some(3));
            assert_eq!(args.data_dir, Some(Utf8PathBuf::from("/srv/traildb/data")));
            assert_eq!(args.endpoint, None);
        }
        other => panic!("expected update-trails, found {other:?}"),
    }
}

#[rstest]
#[case("register")]
#[case("update-trails")]
#[case("recalculate-stats")]
#[case("build-trails")]
#[case("update-pois")]
#[case("build-pois")]
fn every_subcommand_parses_without_options(#[case] name: &str) {
    let cli = Cli::try_parse_from(["traildb", name]).expect("bare subcommand parses");
    assert!(!cli.verbose);
}

#[rstest]
fn build_pois_accepts_the_unmatched_switch() {
    let cli = Cli::try_parse_from(["traildb", "build-pois", "--log-unmatched"])
        .expect("arguments parse");

    match cli.command {
        Command::BuildPois(args) => assert!(args.log_unmatched),
        other => panic!("expected build-pois, found {other:?}"),
    }
}

#[rstest]
fn unknown_subcommands_are_rejected() {
    let err = Cli::try_parse_from(["traildb", "sync-everything"]).expect_err("unknown command");
    assert_eq!(err.kind(), clap::error::ErrorKind::InvalidSubcommand);
}
