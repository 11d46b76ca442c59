//! # docmig-cli -- Command-line front end for docmig
//!
//! Provides the `docmig` binary.
//!
//! ## Subcommands
//!
//! - `docmig migrate`: Copy a `mongoexport` file into a Firestore collection.
//! - `docmig encode`: Print the Firestore payload each record would get.
//!
//! ```bash
//! FIRESTORE_PROJECT_ID=site FIRESTORE_API_KEY=... \
//!     docmig migrate --source subscribers.json --preset subscribers
//! docmig migrate --source posts.json --preset posts --dry-run --json
//! docmig encode --source posts.json --limit 3
//! ```
//!
//! Firestore settings come from the environment; see
//! [`docmig_firestore::FirestoreConfig::from_env`].

pub mod encode;
pub mod migrate;
pub mod preset;

use docmig_migrate::SourceError;

/// Exit code for a completed run, including runs with per-record failures.
pub const EXIT_OK: u8 = 0;
/// Exit code for bad configuration or arguments.
pub const EXIT_CONFIG: u8 = 2;
/// Exit code when the source export cannot be read.
pub const EXIT_SOURCE: u8 = 3;

/// Map a fatal error to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<SourceError>().is_some() {
        EXIT_SOURCE
    } else {
        EXIT_CONFIG
    }
}
