//! # Presets
//!
//! Canned settings for the two record types the tool was built to move.
//! A preset only fills gaps: any flag given explicitly on the command line
//! replaces the preset's choice for that setting.

use clap::ValueEnum;
use docmig_core::{NaturalKey, SourceValue};

/// Named bundles of key strategy, collection, and defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// Newsletter subscribers keyed by lowercased e-mail.
    Subscribers,
    /// Blog posts keyed by their source `_id`.
    Posts,
}

impl Preset {
    /// Destination collection used when `--collection` is omitted.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Subscribers => "subscribers",
            Self::Posts => "posts",
        }
    }

    /// Natural-key strategy used when no key flag is given.
    pub fn natural_key(self) -> NaturalKey {
        match self {
            Self::Subscribers => NaturalKey::normalized_field("email"),
            Self::Posts => NaturalKey::SourceId,
        }
    }

    /// Fields filled with the run's start time when absent.
    pub fn default_now_fields(self) -> &'static [&'static str] {
        match self {
            Self::Subscribers => &["subscribedAt"],
            Self::Posts => &["createdAt", "updatedAt"],
        }
    }

    /// Constant defaults.
    pub fn defaults(self) -> Vec<(&'static str, SourceValue)> {
        match self {
            Self::Subscribers => vec![(
                "preferences",
                SourceValue::Object(
                    [("weeklyDigest".to_string(), SourceValue::Bool(true))]
                        .into_iter()
                        .collect(),
                ),
            )],
            Self::Posts => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_key_on_lowercased_email() {
        assert_eq!(
            Preset::Subscribers.natural_key(),
            NaturalKey::normalized_field("email")
        );
        assert_eq!(Preset::Subscribers.collection(), "subscribers");
    }

    #[test]
    fn posts_key_on_source_id_and_stamp_both_times() {
        assert_eq!(Preset::Posts.natural_key(), NaturalKey::SourceId);
        assert_eq!(Preset::Posts.default_now_fields(), &["createdAt", "updatedAt"]);
        assert!(Preset::Posts.defaults().is_empty());
    }

    #[test]
    fn subscribers_default_to_weekly_digest() {
        let defaults = Preset::Subscribers.defaults();
        assert_eq!(defaults.len(), 1);
        let (field, value) = &defaults[0];
        assert_eq!(*field, "preferences");
        match value {
            SourceValue::Object(map) => assert_eq!(map["weeklyDigest"], SourceValue::Bool(true)),
            other => panic!("expected object, got {other:?}"),
        }
    }
}
