//! Property-based tests for branch references and filter vocabulary.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use crossforge::forge::{parse_branch_reference, BranchRefError, Labels, StateFilter};

/// Strategy for characters that may appear in an owner or branch name.
fn name_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::char::range('a', 'z'),
        prop::char::range('A', 'Z'),
        prop::char::range('0', '9'),
        Just('-'),
        Just('_'),
        Just('.'),
        Just('/'),
    ]
}

/// Non-empty name without a colon.
fn name() -> impl Strategy<Value = String> {
    prop::collection::vec(name_char(), 1..40).prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #[test]
    fn bare_branch_is_same_repo(branch in name()) {
        let parsed = parse_branch_reference(&branch).unwrap();
        prop_assert_eq!(parsed.owner, None);
        prop_assert_eq!(parsed.branch, branch);
        prop_assert!(!parsed.is_cross_repo);
    }

    #[test]
    fn qualified_branch_is_cross_repo(owner in name(), branch in name()) {
        let reference = format!("{}:{}", owner, branch);
        let parsed = parse_branch_reference(&reference).unwrap();
        prop_assert_eq!(parsed.owner.as_deref(), Some(owner.as_str()));
        prop_assert_eq!(parsed.branch.as_str(), branch.as_str());
        prop_assert!(parsed.is_cross_repo);
    }

    #[test]
    fn display_round_trips(owner in proptest::option::of(name()), branch in name()) {
        let reference = match &owner {
            Some(owner) => format!("{}:{}", owner, branch),
            None => branch.clone(),
        };
        let parsed = parse_branch_reference(&reference).unwrap();
        prop_assert_eq!(parsed.to_string(), reference);
    }

    #[test]
    fn empty_half_is_rejected(part in name()) {
        let leading = format!(":{}", part);
        let trailing = format!("{}:", part);
        prop_assert!(
            matches!(
                parse_branch_reference(&leading),
                Err(BranchRefError::InvalidFormat(_))
            ),
            "leading colon should be rejected"
        );
        prop_assert!(
            matches!(
                parse_branch_reference(&trailing),
                Err(BranchRefError::InvalidFormat(_))
            ),
            "trailing colon should be rejected"
        );
    }

    #[test]
    fn labels_join_with_commas(labels in prop::collection::vec("[a-z]{1,10}", 0..6)) {
        let joined = labels.join(",");
        let parsed = Labels::from(labels.clone());
        prop_assert_eq!(parsed.joined(), joined);
        prop_assert_eq!(parsed.is_empty(), labels.is_empty());
    }

    #[test]
    fn state_filter_parse_matches_name(state in prop_oneof![
        Just(StateFilter::Opened),
        Just(StateFilter::Closed),
        Just(StateFilter::Merged),
        Just(StateFilter::All),
    ]) {
        prop_assert_eq!(StateFilter::parse(state.as_str()), Some(state));
    }
}

#[test]
fn empty_reference_is_rejected() {
    assert_eq!(parse_branch_reference(""), Err(BranchRefError::Empty));
}
