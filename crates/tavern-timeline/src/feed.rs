//! Mutation logs.
//!
//! A mutation log is newline-delimited JSON, one [`Mutation`] per line,
//! tagged by `type`:
//!
//! ```text
//! {"type":"add_entity","entity":{"id":1,"tags":{"20":1}}}
//! {"type":"increment_time"}
//! {"type":"tag_change","entity":1,"tag":20,"value":2}
//! {"type":"increment_time","delta":12.5}
//! ```
//!
//! Blank lines are skipped. Decoding is lazy, so a log can be streamed while
//! it is still being written.

use std::io::BufRead;

use tavern_state::mutator::Mutation;

use crate::TimelineError;

/// Decode mutations from a JSON-lines reader.
///
/// Each item is either a mutation or the error for that line; the iterator
/// keeps going after a bad line.
///
/// ```
/// use tavern_timeline::feed::read_mutation_log;
///
/// let log = "{\"type\":\"increment_time\"}\n\nnot json\n";
/// let items: Vec<_> = read_mutation_log(log.as_bytes()).collect();
/// assert_eq!(items.len(), 2);
/// assert!(items[0].is_ok());
/// assert!(items[1].is_err());
/// ```
pub fn read_mutation_log<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<Mutation, TimelineError>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(TimelineError::Io(e))),
            };
            if line.trim().is_empty() {
                return None;
            }
            Some(
                serde_json::from_str(&line).map_err(|source| {
                    TimelineError::MalformedMutation {
                        line: index + 1,
                        source,
                    }
                }),
            )
        })
}
