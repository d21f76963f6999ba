use std::fmt;

use time::{macros::format_description, Date, Duration};

pub const DEFAULT_MAX_CHUNK_DAYS: u32 = 6;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: Date, end: Date },
    #[error("chunk size must be at least one day")]
    InvalidChunkSize,
    #[error("date range exceeds {max_days} days: {days} days")]
    RangeTooLarge { days: i64, max_days: i64 },
}

/// An inclusive `[start, end]` span of settlement dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateChunk {
    pub start: Date,
    pub end: Date,
}

impl DateChunk {
    pub fn days(&self) -> i64 {
        inclusive_days(self.start, self.end)
    }
}

impl fmt::Display for DateChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

pub fn parse_date(s: &str) -> Result<Date, RangeError> {
    Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| RangeError::InvalidDate(s.to_string()))
}

pub fn inclusive_days(start: Date, end: Date) -> i64 {
    (end - start).whole_days() + 1
}

/// Lazy sequence of contiguous, non-overlapping chunks covering `[start, end]`.
///
/// Each chunk spans at most `max_days` days; the last one may be shorter.
/// Cloning yields an independent iterator from the same position, so a fresh
/// plan can be replayed without recomputing it.
#[derive(Debug, Clone)]
pub struct DateChunks {
    next_start: Option<Date>,
    end: Date,
    max_days: u32,
}

impl Iterator for DateChunks {
    type Item = DateChunk;

    fn next(&mut self) -> Option<DateChunk> {
        let start = self.next_start?;
        let span = Duration::days(i64::from(self.max_days) - 1);
        let end = start.checked_add(span).map_or(self.end, |d| d.min(self.end));

        self.next_start = if end < self.end { end.next_day() } else { None };
        Some(DateChunk { start, end })
    }
}

pub fn plan_chunks(start: Date, end: Date, max_days: u32) -> Result<DateChunks, RangeError> {
    if start > end {
        return Err(RangeError::InvalidRange { start, end });
    }
    if max_days == 0 {
        return Err(RangeError::InvalidChunkSize);
    }

    Ok(DateChunks {
        next_start: Some(start),
        end,
        max_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn assert_covers(start: Date, end: Date, max_days: u32) {
        let chunks: Vec<_> = plan_chunks(start, end, max_days).unwrap().collect();

        assert_eq!(chunks.first().map(|c| c.start), Some(start));
        assert_eq!(chunks.last().map(|c| c.end), Some(end));
        for chunk in &chunks {
            assert!(chunk.start <= chunk.end);
            assert!(chunk.days() <= i64::from(max_days), "{chunk} too long");
        }
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end.next_day(), Some(pair[1].start), "gap or overlap");
        }
        let covered: i64 = chunks.iter().map(DateChunk::days).sum();
        assert_eq!(covered, inclusive_days(start, end));
    }

    #[test]
    fn chunks_cover_range_contiguously() {
        let start = date!(2024 - 01 - 01);
        for len in 0..40 {
            let end = start + Duration::days(len);
            for max_days in 1..=7 {
                assert_covers(start, end, max_days);
            }
        }
    }

    #[test]
    fn final_chunk_is_shorter() {
        let chunks: Vec<_> = plan_chunks(date!(2024 - 01 - 01), date!(2024 - 01 - 14), 6)
            .unwrap()
            .collect();
        let spans: Vec<_> = chunks.iter().map(DateChunk::days).collect();
        assert_eq!(spans, vec![6, 6, 2]);
        assert_eq!(chunks[1].start, date!(2024 - 01 - 07));
    }

    #[test]
    fn single_day_range_is_one_chunk() {
        let day = date!(2024 - 02 - 29);
        let chunks: Vec<_> = plan_chunks(day, day, 6).unwrap().collect();
        assert_eq!(chunks, vec![DateChunk { start: day, end: day }]);
    }

    #[test]
    fn plan_is_restartable() {
        let plan = plan_chunks(date!(2024 - 03 - 01), date!(2024 - 03 - 20), 6).unwrap();
        let first: Vec<_> = plan.clone().collect();
        let second: Vec<_> = plan.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn start_after_end_is_rejected() {
        let err = plan_chunks(date!(2024 - 01 - 02), date!(2024 - 01 - 01), 6).unwrap_err();
        assert!(matches!(err, RangeError::InvalidRange { .. }));
        assert_eq!(
            plan_chunks(date!(2024 - 01 - 01), date!(2024 - 01 - 01), 0).unwrap_err(),
            RangeError::InvalidChunkSize
        );
    }

    #[test]
    fn parse_date_requires_iso_format() {
        assert_eq!(parse_date("2024-01-31"), Ok(date!(2024 - 01 - 31)));
        assert_eq!(parse_date("31/01/2024"), Err(RangeError::InvalidDate("31/01/2024".into())));
        assert!(parse_date("2024-02-30").is_err());
    }
}
