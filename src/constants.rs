// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Useful constants.

All durations here are in whole seconds; sessions are stored at one-second
resolution.
 */

/// The number of seconds in a UTC day (leap seconds are not modelled).
pub const SEC_IN_DAY: i64 = 86400;

/// Two sessions whose spans are separated by no more than this many seconds
/// are merged into the same operating interval.
pub const DEFAULT_GAP_THRESHOLD_SECS: u64 = 600;

/// Consecutive records within a rawacf file must be closer together than this
/// many seconds for the file's timing to be considered consistent.
pub const CONSISTENT_RAWACF_THRESH_SECS: f64 = 20.0;

/// The number of decoded sessions the writer accumulates before committing
/// them to the store in one transaction.
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 256;

/// The DMAP encoding code that every supported record starts with.
pub const DMAP_ENCODING_CODE: i32 = 0x0001_0001;

/// The program (and arguments) used to decompress `.bz2` rawacf files. The
/// file path is appended as the last argument and the decompressed bytes are
/// read from stdout.
pub const DEFAULT_BZ2_DECOMPRESSOR: &str = "bzip2 -dc";

/// The default path to the session store.
pub const DEFAULT_STORE_PATH: &str = "rawacf_sessions.sqlite";

/// The default path to the quarantine log.
pub const DEFAULT_QUARANTINE_PATH: &str = "bad_rawacfs.jsonl";
