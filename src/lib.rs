//! # sermon-archiver
//!
//! This crate keeps per-channel text archives of YouTube transcripts up to
//! date. Every run lists the recent live streams and uploads of each
//! configured channel, skips whatever the channel's archive file already
//! mentions, downloads English captions for the rest and appends them as
//! fixed-layout entries.
//!
//! ## Usage
//!
//! The binary wires up the real network clients. To drive a run from code,
//! build the same pieces yourself:
//!
//! ```no_run
//! use sermon_archiver::{
//!     controller::{self, RunSettings},
//!     fetcher::{DirectPayloadClient, LadderFetcher},
//!     innertube::{ClientIdentity, InnertubeResolver},
//!     listing::BrowseLister,
//!     policy::RequestPolicy,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let policy = RequestPolicy::default();
//!
//!     // Lists channel tabs, retrying transient failures
//!     let lister = BrowseLister::new(policy.user_agent(), 3, std::time::Duration::from_secs(1))
//!         .unwrap();
//!
//!     // Browser identity first, app identity second
//!     let fetcher = LadderFetcher::new(
//!         vec![
//!             Box::new(InnertubeResolver::new(ClientIdentity::Web).unwrap()),
//!             Box::new(InnertubeResolver::new(ClientIdentity::Android).unwrap()),
//!         ],
//!         Box::new(DirectPayloadClient::new(policy.clone()).unwrap()),
//!     );
//!
//!     let summary = controller::run(&RunSettings::default(), &lister, &fetcher, &policy)
//!         .await
//!         .unwrap();
//!     println!("{} new entries", summary.appended());
//! }
//! ```
//!
//! An archive file is only ever appended to. Which videos it holds is read
//! back from the `URL:` line of each entry, so re-running after a crash or a
//! partial failure is always safe.

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

pub mod archive;
pub mod captions;
pub mod config;
pub mod controller;
pub mod entry;
pub mod fetcher;
pub mod innertube;
pub mod listing;
pub mod policy;
pub mod processor;
pub mod util;
