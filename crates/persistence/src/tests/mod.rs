// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence test suite.
//!
//! All tests run against unique in-memory `SQLite` databases.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod bulk_tests;
mod poll_tests;

use crate::NewPollRecord;
use chrono::{Duration, Utc};
use pollwarden_domain::{PollOption, PollStatus};

/// Builds a creation record for a two-option poll opening now.
pub fn test_poll_record(name: &str, status: PollStatus) -> NewPollRecord {
    let now = Utc::now();
    NewPollRecord {
        name: name.to_string(),
        description: Some(String::from("test poll")),
        status,
        open_time: now,
        close_time: now + Duration::hours(2),
        timezone: String::from("America/New_York"),
        anonymous: false,
        multiple_choice: false,
        max_choices: 1,
        options: vec![PollOption::new("Yes", "✅"), PollOption::new("No", "❌")],
        created_at: now,
    }
}
