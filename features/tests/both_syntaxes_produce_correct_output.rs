// The `unused_crate_dependencies` lint checks every crate in a package separately.
// See <https://github.com/rust-lang/rust/issues/57274>.
#![allow(unused_crate_dependencies)]

use features::{log, Feature};
use log::Level;

#[test]
fn both_syntaxes_produce_correct_output() {
    testing_logger::setup();

    showcase();

    testing_logger::validate(|logs| {
        itertools::assert_equal(
            logs.iter().map(|log| log.body.as_str()),
            core::iter::repeat([
                "[LogHeadChanges] head moved to slot 1",
                "[LogHeadChanges] head moved to slot 4",
            ])
            .take(3)
            .flatten(),
        );

        for log in logs {
            assert_eq!(log.level, Level::Info);
            assert_eq!(log.target, "features");
        }
    });
}

#[test]
fn disabled_feature_does_not_evaluate_message() {
    testing_logger::setup();

    let mut evaluated = false;

    log!(LogPruning, "{}", {
        evaluated = true;
        "pruned"
    });

    assert!(!evaluated);

    testing_logger::validate(|logs| assert!(logs.is_empty()));
}

#[test]
fn feature_names_round_trip_through_strings() {
    assert_eq!(Feature::DebugForkChoice.to_string(), "DebugForkChoice");
    assert_eq!("LogVoteBatches".parse::<Feature>().ok(), Some(Feature::LogVoteBatches));
    assert!("LogEverything".parse::<Feature>().is_err());
}

fn showcase() {
    Feature::LogHeadChanges.enable();

    if Feature::LogHeadChanges.is_enabled() {
        Feature::LogHeadChanges.log("head moved to slot 1");
    }
    if Feature::LogHeadChanges.is_enabled() {
        Feature::LogHeadChanges.log(format_args!("head moved to slot {}", 2 + 2));
    }

    // This is a shorthand for the above.
    // The expressions used in the message are only evaluated if the feature is enabled.
    log!(LogHeadChanges, "head moved to slot 1");
    log!(LogHeadChanges, "head moved to slot {}", 2 + 2);

    // Using the full path may help avoid namespace clashes with `log::log!`.
    features::log!(LogHeadChanges, "head moved to slot 1");
    features::log!(LogHeadChanges, "head moved to slot {}", 2 + 2);
}
