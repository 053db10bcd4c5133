// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Ingest SuperDARN rawacf session metadata and derive radar uptime statistics.

Files are decoded ([`decode`]) into session records, which are kept in a
store ([`store`]) keyed by site and start time. Near-contiguous sessions are
merged into operating intervals ([`intervals`]), from which uptime statistics
are computed over any window ([`stats`]). [`ingest`] runs the decoding
pipeline for a scope of files and [`batch`] runs it over ranges of days.
 */

pub mod batch;
pub mod config;
pub mod constants;
pub mod decode;
pub mod fetch;
pub mod ingest;
pub mod intervals;
mod io;
pub mod quarantine;
pub mod record;
pub mod site;
pub mod stats;
pub mod store;
pub mod unit_parsing;
pub mod window;

mod cli;

#[cfg(test)]
mod tests;

// Re-exports.
pub use cli::{Uptime, UptimeError};
