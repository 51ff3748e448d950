//! Repeat functions
//!
//! A repeat function decides which existing node is copied, and where the
//! copy goes, whenever a data array has more items than the template has
//! matching nodes. It is written as a comma separated list of tokens:
//!
//! | token               | meaning                                               |
//! |---------------------|-------------------------------------------------------|
//! | `repeat-last`       | copy the last found node (the default)                |
//! | `repeat-first`      | copy the first found node                             |
//! | `repeat-middle`     | copy the middle node; `left` picks the left one of an even count |
//! | `repeat-nth(N)`     | copy the Nth found node, 1-based                      |
//! | `repeat-all`        | walk the list with a cursor, copies go to the end     |
//! | `simple`            | with `repeat-all`: wrap from the last node to the first |
//! | `alternate`         | with `repeat-all`: bounce between the ends            |
//! | `once`              | with `repeat-all`: delay the first wrap or bounce until it will not happen again |
//! | `shuffle-data`      | shuffle the completed list                            |
//!
//! ```rust
//! use html_datastack::repeat::RepeatStrategy;
//!
//! let strategy: RepeatStrategy = "repeat-all, alternate, once".parse().unwrap();
//! let sources: Vec<usize> = strategy.plan(3, 7).iter().map(|d| d.source).collect();
//! assert_eq!(sources, vec![2, 2, 1, 0]);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Cursor movement for `repeat-all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatDirection {
    Simple,
    Alternate,
}

/// Which slot a copy is made from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatSource {
    Last,
    First,
    Middle { left: bool },
    /// 1-based
    Nth(usize),
    All { direction: RepeatDirection, once: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatStrategy {
    pub source: RepeatSource,
    pub shuffle: bool,
}

/// Where a copy goes, in the document and in the working list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Right after the source node, and right after the source slot
    AfterSource,
    /// After the last node of the list, as the new last slot
    AtEnd,
}

/// One planned copy: the working-list index copied from and where it goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duplication {
    pub source: usize,
    pub placement: Placement,
}

impl Default for RepeatStrategy {
    fn default() -> Self {
        Self {
            source: RepeatSource::Last,
            shuffle: false,
        }
    }
}

impl RepeatStrategy {
    /// Plan the copies needed to grow `found` slots to `expected`
    ///
    /// Indices refer to the working list as it stands when each copy is
    /// made, so `repeat-all` may copy a slot an earlier step created.
    pub fn plan(&self, found: usize, expected: usize) -> Vec<Duplication> {
        if found == 0 || found >= expected {
            return Vec::new();
        }
        let count = expected - found;
        let fixed = |source: usize| {
            vec![
                Duplication {
                    source,
                    placement: Placement::AfterSource,
                };
                count
            ]
        };

        match self.source {
            RepeatSource::Last => fixed(found - 1),
            RepeatSource::First => fixed(0),
            RepeatSource::Middle { left } => {
                let mut middle = found / 2;
                if left && found % 2 == 0 && middle > 0 {
                    middle -= 1;
                }
                fixed(middle)
            }
            RepeatSource::Nth(n) => fixed(n.saturating_sub(1).min(found - 1)),
            RepeatSource::All { direction, once } => plan_walk(direction, once, found, expected),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Move {
    Forward,
    Backward,
}

fn plan_walk(direction: RepeatDirection, once: bool, found: usize, expected: usize) -> Vec<Duplication> {
    let found = found as isize;
    let mut cursor: Option<isize> = None;
    let mut next_move: Option<Move> = None;
    let mut plan = Vec::with_capacity(expected.saturating_sub(found as usize));

    for key in found..expected as isize {
        match (next_move, cursor) {
            (Some(Move::Forward), Some(c)) if c < found => cursor = Some(c + 1),
            (Some(Move::Backward), Some(c)) if c > -1 => cursor = Some(c - 1),
            _ => {}
        }

        if cursor.is_none() || cursor == Some(found) {
            // Without `once` every end triggers the turn; with it, only the
            // turn that finishes exactly on the expected count does.
            if !once || key + found >= expected as isize {
                match direction {
                    RepeatDirection::Alternate => {
                        cursor = Some(found - 1);
                        next_move = Some(Move::Backward);
                    }
                    RepeatDirection::Simple => {
                        cursor = Some(0);
                        next_move = Some(Move::Forward);
                    }
                }
            }
            if cursor.is_none() {
                cursor = Some(found - 1);
                next_move = Some(Move::Forward);
            }
        } else if cursor == Some(-1) {
            cursor = Some(0);
            next_move = Some(Move::Forward);
        }

        plan.push(Duplication {
            source: cursor.unwrap_or(found - 1).max(0) as usize,
            placement: Placement::AtEnd,
        });
    }
    plan
}

impl FromStr for RepeatStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        let mut all = false;
        let mut middle = false;
        let mut first = false;
        let mut nth: Option<usize> = None;
        let mut left = false;
        let mut alternate = false;
        let mut once = false;
        let mut shuffle = false;

        for token in normalized.split(',').filter(|t| !t.is_empty()) {
            match token {
                "repeat-last" => {}
                "repeat-first" => first = true,
                "repeat-middle" => middle = true,
                "repeat-all" => all = true,
                "left" => left = true,
                "alternate" => alternate = true,
                "simple" => alternate = false,
                "once" => once = true,
                "shuffle-data" => shuffle = true,
                token if token.starts_with("repeat-nth(") && token.ends_with(')') => {
                    let n = token["repeat-nth(".len()..token.len() - 1]
                        .parse::<usize>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| {
                            Error::directive_owned(format!("Bad repeat-nth index in '{}'", s))
                        })?;
                    nth = Some(n);
                }
                other => {
                    return Err(Error::directive_owned(format!(
                        "Unknown repeat function '{}' in '{}'",
                        other, s
                    )))
                }
            }
        }

        // Precedence when several sources are named: all, middle, nth, first, last.
        let source = if all {
            RepeatSource::All {
                direction: if alternate {
                    RepeatDirection::Alternate
                } else {
                    RepeatDirection::Simple
                },
                once,
            }
        } else if middle {
            RepeatSource::Middle { left }
        } else if let Some(n) = nth {
            RepeatSource::Nth(n)
        } else if first {
            RepeatSource::First
        } else {
            RepeatSource::Last
        };

        Ok(RepeatStrategy { source, shuffle })
    }
}

impl fmt::Display for RepeatStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            RepeatSource::Last => write!(f, "repeat-last")?,
            RepeatSource::First => write!(f, "repeat-first")?,
            RepeatSource::Middle { left: false } => write!(f, "repeat-middle")?,
            RepeatSource::Middle { left: true } => write!(f, "repeat-middle,left")?,
            RepeatSource::Nth(n) => write!(f, "repeat-nth({})", n)?,
            RepeatSource::All { direction, once } => {
                write!(f, "repeat-all")?;
                if direction == RepeatDirection::Alternate {
                    write!(f, ",alternate")?;
                }
                if once {
                    write!(f, ",once")?;
                }
            }
        }
        if self.shuffle {
            write!(f, ",shuffle-data")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sources(strategy: &str, found: usize, expected: usize) -> Vec<usize> {
        strategy
            .parse::<RepeatStrategy>()
            .unwrap()
            .plan(found, expected)
            .iter()
            .map(|d| d.source)
            .collect()
    }

    #[test]
    fn test_parsing() {
        assert_eq!("repeat-last".parse::<RepeatStrategy>().unwrap(), RepeatStrategy::default());
        assert_eq!(
            " Repeat-All , Alternate, ONCE ".parse::<RepeatStrategy>().unwrap().source,
            RepeatSource::All {
                direction: RepeatDirection::Alternate,
                once: true
            }
        );
        assert_eq!(
            "repeat-nth(3)".parse::<RepeatStrategy>().unwrap().source,
            RepeatSource::Nth(3)
        );
        assert_eq!(
            "repeat-middle,left".parse::<RepeatStrategy>().unwrap().source,
            RepeatSource::Middle { left: true }
        );

        let shuffle_only = "shuffle-data".parse::<RepeatStrategy>().unwrap();
        assert_eq!(shuffle_only.source, RepeatSource::Last);
        assert!(shuffle_only.shuffle);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "repeat-sideways".parse::<RepeatStrategy>(),
            Err(Error::DirectiveError(_))
        ));
        assert!("repeat-nth(0)".parse::<RepeatStrategy>().is_err());
        assert!("repeat-nth(x)".parse::<RepeatStrategy>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for text in ["repeat-last", "repeat-middle,left", "repeat-all,alternate,once,shuffle-data"] {
            let strategy: RepeatStrategy = text.parse().unwrap();
            assert_eq!(strategy.to_string(), text);
        }
    }

    #[test]
    fn test_fixed_sources_place_after_source() {
        let plan = "repeat-last".parse::<RepeatStrategy>().unwrap().plan(2, 5);
        assert_eq!(
            plan,
            vec![
                Duplication {
                    source: 1,
                    placement: Placement::AfterSource
                };
                3
            ]
        );
        assert_eq!(sources("repeat-first", 3, 5), vec![0, 0]);
        assert_eq!(sources("repeat-nth(2)", 3, 5), vec![1, 1]);
        assert_eq!(sources("repeat-nth(9)", 3, 4), vec![2]);
    }

    #[test]
    fn test_middle_source() {
        assert_eq!(sources("repeat-middle", 1, 2), vec![0]);
        assert_eq!(sources("repeat-middle", 2, 3), vec![1]);
        assert_eq!(sources("repeat-middle,left", 2, 3), vec![0]);
        assert_eq!(sources("repeat-middle", 3, 4), vec![1]);
        assert_eq!(sources("repeat-middle,left", 3, 4), vec![1]);
        assert_eq!(sources("repeat-middle", 4, 5), vec![2]);
        assert_eq!(sources("repeat-middle,left", 4, 5), vec![1]);
    }

    #[test]
    fn test_repeat_all_golden_table() {
        let table: &[(&str, usize, usize, &[usize])] = &[
            ("repeat-all,alternate,once", 3, 7, &[2, 2, 1, 0]),
            ("repeat-all,alternate", 3, 7, &[2, 1, 0, 0]),
            ("repeat-all,simple", 3, 7, &[0, 1, 2, 0]),
            ("repeat-all", 3, 7, &[0, 1, 2, 0]),
            ("repeat-all,simple,once", 3, 7, &[2, 0, 1, 2]),
            ("repeat-all,alternate,once", 2, 7, &[1, 2, 2, 1, 0]),
            ("repeat-all,alternate", 2, 7, &[1, 0, 0, 1, 1]),
            ("repeat-all,simple", 2, 7, &[0, 1, 0, 1, 0]),
            ("repeat-all,alternate,once", 1, 4, &[0, 1, 0]),
            ("repeat-all,alternate,once", 3, 4, &[2]),
        ];
        for (strategy, found, expected, want) in table {
            assert_eq!(
                sources(strategy, *found, *expected),
                want.to_vec(),
                "{} with {} found and {} expected",
                strategy,
                found,
                expected
            );
        }
    }

    #[test]
    fn test_repeat_all_appends_at_end() {
        let plan = "repeat-all".parse::<RepeatStrategy>().unwrap().plan(2, 4);
        assert!(plan.iter().all(|d| d.placement == Placement::AtEnd));
    }

    #[test]
    fn test_nothing_to_plan() {
        assert!(sources("repeat-last", 3, 3).is_empty());
        assert!(sources("repeat-last", 4, 2).is_empty());
        assert!(sources("repeat-last", 0, 2).is_empty());
    }
}
