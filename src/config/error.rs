// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::unit_parsing::UnitParseError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("The number of workers must be at least 1")]
    ZeroWorkers,

    #[error("A per-file timeout of zero would time out every file")]
    ZeroTimeout,

    #[error("The store write batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Couldn't parse gap threshold '{input}': {source}")]
    GapThreshold {
        input: String,
        source: UnitParseError,
    },

    #[error("Couldn't parse per-file timeout '{input}': {source}")]
    Timeout {
        input: String,
        source: UnitParseError,
    },
}
