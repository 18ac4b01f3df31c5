//! Upload staging cache
//!
//! Keeps user uploads alive across form validation failures. A submitted
//! file is staged under `root/<identifier>/<basename>`, and the form carries
//! `<identifier>/<basename>` back in a hidden field so the next request can
//! pick it up again without a re-upload.
//!
//! # Entry Lifecycle
//!
//! | Stage | Trigger | Result |
//! |-------|---------|--------|
//! | Staged | New upload stream in the bag | Fresh directory, bytes persisted |
//! | Rehydrated | Durable reference in the bag | Entry over the existing file |
//! | Defaulted | Neither | Empty entry, optional placeholder |
//! | Cleared | `CacheEntry::clear` | Directory removed |
//! | Reclaimed | Sweep after the retention age | Directory removed |
//!
//! Directory names are validated identifiers and references are resolved
//! segment by segment, so nothing outside the root is ever read or removed.

pub mod entry;
pub mod identifier;
pub mod reclaim;
pub mod resolve;
pub mod sanitize;
pub mod settings;
pub mod staging;

pub use entry::{durable_key_for, CacheEntry, EntryDefaults, HiddenField, DURABLE_SUFFIX};
pub use identifier::{is_identifier, IdentifierSource, UuidSource};
pub use reclaim::{ReclaimSwitch, Reclaimer, ShutdownSweep, SweepReport};
pub use resolve::{ResolveOptions, ResolveScope, UploadCache};
pub use sanitize::clean_name;
pub use settings::{normalize_url, CacheSettings};
pub use staging::{StagedDir, StagingArea};
