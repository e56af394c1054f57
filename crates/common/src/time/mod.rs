//! Time abstraction for testability
//!
//! Auth bookkeeping compares wall-clock timestamps across process restarts, so
//! the clock hands out `DateTime<Utc>` rather than monotonic instants.
//!
//! # Examples
//!
//! ```
//! use chrono::Duration;
//!
//! use bdaybot_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now_utc();
//! clock.advance(Duration::days(8));
//! assert_eq!((clock.now_utc() - start).num_days(), 8);
//! ```

mod clock;

pub use clock::{Clock, MockClock, SystemClock};
