// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Field-level validation for polls and ballots.

use crate::error::DomainError;
use crate::types::{Ballot, Poll, PollOption};
use std::collections::HashSet;

/// Validates a poll name.
///
/// # Errors
///
/// Returns an error if the name is empty or whitespace-only.
pub fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::InvalidName(String::from(
            "name cannot be empty",
        )));
    }
    Ok(())
}

/// Validates an option list at creation time.
///
/// # Errors
///
/// Returns an error if:
/// - The count is outside 2..=10
/// - Any label is empty
/// - Two options share a marker
pub fn validate_options(options: &[PollOption]) -> Result<(), DomainError> {
    if !(2..=10).contains(&options.len()) {
        return Err(DomainError::InvalidOptionCount {
            count: options.len(),
        });
    }
    let mut seen_markers: HashSet<&str> = HashSet::new();
    for (index, option) in options.iter().enumerate() {
        if option.label.trim().is_empty() {
            return Err(DomainError::EmptyOptionLabel { index });
        }
        if !seen_markers.insert(option.marker.as_str()) {
            return Err(DomainError::DuplicateOptionMarker {
                marker: option.marker.clone(),
            });
        }
    }
    Ok(())
}

/// Validates the max-choices setting against the option list.
///
/// # Errors
///
/// Returns an error if `max_choices` is zero or exceeds the option count.
pub fn validate_max_choices(max_choices: u8, option_count: usize) -> Result<(), DomainError> {
    if max_choices == 0 || usize::from(max_choices) > option_count {
        return Err(DomainError::InvalidMaxChoices {
            max_choices,
            option_count,
        });
    }
    Ok(())
}

/// Validates a ballot against the poll's option list and choice settings.
///
/// Status gating (votes only while active) is the lifecycle service's
/// responsibility; this checks only the selection itself.
///
/// # Errors
///
/// Returns an error if the ballot is empty, selects a duplicate or
/// out-of-range index, or exceeds the permitted selection count.
pub fn validate_ballot(poll: &Poll, ballot: &Ballot) -> Result<(), DomainError> {
    if ballot.option_indices.is_empty() {
        return Err(DomainError::EmptyBallot);
    }
    let allowed = poll.effective_max_choices();
    if ballot.option_indices.len() > allowed {
        return Err(DomainError::TooManySelections {
            selected: ballot.option_indices.len(),
            allowed,
        });
    }
    let mut seen: HashSet<u32> = HashSet::new();
    for &index in &ballot.option_indices {
        let in_range = usize::try_from(index).is_ok_and(|i| i < poll.options.len());
        if !in_range {
            return Err(DomainError::SelectionOutOfRange {
                index,
                option_count: poll.options.len(),
            });
        }
        if !seen.insert(index) {
            return Err(DomainError::DuplicateSelection { index });
        }
    }
    Ok(())
}
