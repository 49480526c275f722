//! Output assembly.
//!
//! Joining thousands of fragments with `+` in one flat chain overflows the
//! evaluation stack of some engines, so long runs are split into a left part
//! and a parenthesized right part, recursively, until every flat chain fits
//! the group threshold.

use crate::config::EncoderConfig;
use crate::solution::{Level, Solution};
use std::borrow::Cow;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Assembled text with the level of the value it evaluates to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub text: String,
    pub level: Level,
}

/// Ordered solutions waiting to be joined
#[derive(Debug, Clone)]
pub struct ScrewBuffer {
    solutions: Vec<Arc<Solution>>,
    length: usize,
    bond: bool,
    force_string: bool,
    group_threshold: usize,
    capacity: usize,
    optimize_window: Option<usize>,
}

impl ScrewBuffer {
    /// Create an empty buffer.
    ///
    /// `bond` parenthesizes multi-part output; `force_string` makes sure the
    /// result evaluates to a string.
    pub fn new(bond: bool, force_string: bool, config: &EncoderConfig, optimize: bool) -> Self {
        Self {
            solutions: Vec::new(),
            length: 0,
            bond,
            force_string,
            group_threshold: config.group_threshold.max(2),
            capacity: config.capacity(),
            optimize_window: optimize.then_some(config.optimize_window),
        }
    }

    /// Append a solution; returns `false` when the buffer is full
    pub fn append(&mut self, solution: Arc<Solution>) -> bool {
        if self.solutions.len() >= self.capacity {
            return false;
        }
        if !self.solutions.is_empty() {
            self.length += 1;
        }
        self.length += solution.len();
        self.solutions.push(solution);
        true
    }

    /// Lower bound of the assembled length
    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of appended solutions
    pub fn count(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn assemble(&self) -> Assembly {
        self.collect(0..self.solutions.len(), self.bond, self.force_string)
    }

    fn collect(&self, range: Range<usize>, bond: bool, force_string: bool) -> Assembly {
        let count = range.len();
        if count <= self.group_threshold {
            return sequence(&self.solutions[range], bond, force_string);
        }
        let split = range.start + self.split_offset(&range);
        let left = self.collect(range.start..split, false, true);
        let right = self.collect(split..range.end, true, false);
        let mut text = format!("{}+{}", left.text, right.text);
        if bond {
            text = format!("({text})");
        }
        Assembly {
            text,
            level: Level::String,
        }
    }

    /// Offset in `range` where the right group starts
    fn split_offset(&self, range: &Range<usize>) -> usize {
        let count = range.len();
        // Each half must fit in one less level of nesting
        let mut limit = self.group_threshold;
        while limit.saturating_mul(2) < count {
            limit *= 2;
        }
        let low = count.saturating_sub(limit).max(1);
        let high = limit.min(count - 2);
        let middle = (count / 2).clamp(low, high);
        let Some(window) = self.optimize_window else {
            return middle;
        };

        let start = middle.saturating_sub(window).max(low);
        let end = (middle + window).min(high);
        (start..=end)
            .max_by_key(|&offset| {
                let gain = self.boundary_gain(range.start + offset);
                (gain, std::cmp::Reverse(offset.abs_diff(middle)))
            })
            .unwrap_or(middle)
    }

    /// Characters saved by starting a group at `index`: the first solution
    /// of a group never needs a protective wrap
    fn boundary_gain(&self, index: usize) -> usize {
        let solution = &self.solutions[index];
        let previous = &self.solutions[index - 1];
        let wrapped = solution.outer_plus
            || (solution.level < Level::Object && previous.level < Level::Object);
        if wrapped && solution.level > Level::Undefined {
            2
        } else {
            0
        }
    }
}

impl fmt::Display for ScrewBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.assemble().text)
    }
}

/// Join solutions with `+` so that the result concatenates their values
pub fn sequence(solutions: &[Arc<Solution>], bond: bool, force_string: bool) -> Assembly {
    let mut iter = solutions.iter();
    let (mut text, mut level, outer_plus) = match iter.next() {
        Some(first) => (first.replacement.clone(), first.level, first.outer_plus),
        None => ("[]".to_string(), Level::Object, false),
    };
    let mut multipart = false;
    for solution in iter {
        let mut part = Cow::Borrowed(solution.as_str());
        if (level < Level::Object && solution.level < Level::Object) || solution.outer_plus {
            if solution.level > Level::Undefined {
                part = Cow::Owned(format!("[{part}]"));
            } else if level > Level::Undefined {
                text = format!("[{text}]");
            } else {
                text.push_str("+[]");
            }
        }
        text.push('+');
        text.push_str(&part);
        level = Level::String;
        multipart = true;
    }
    if force_string && level < Level::String {
        text.push_str("+[]");
        level = Level::String;
        multipart = true;
    }
    if bond && (multipart || outer_plus) {
        text = format!("({text})");
    }
    Assembly { text, level }
}
