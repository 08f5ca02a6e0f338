//! Datetime-string <-> hour-index conversion, parameterized by a per-store
//! local epoch attribute.
//!
//! The store never assumes the process's local timezone: every [`Epoch`]
//! carries an explicit `utc_offset_minutes`, so the same store produces the
//! same hour-indices regardless of the host it is opened on.

use chrono::{Duration, NaiveDate, NaiveDateTime};

/// The only datetime format the store accepts, on both read and write.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("datetime {0:?} does not match the expected format `YYYY-MM-DD HH:MM:SS`")]
    Unparseable(String),

    #[error("hour-index {0} is before the store epoch")]
    BeforeEpoch(i64),
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// A store's local, UTC-free wall-clock epoch.
///
/// `utc_offset_minutes` is carried alongside the wall-clock string so that
/// hour-index arithmetic is reproducible across hosts with different `TZ`
/// settings (see the time-zone portability open question in the design
/// notes) -- it does not otherwise participate in arithmetic, since both the
/// epoch and every datetime handed to [`Epoch::to_index`] are interpreted in
/// the same fixed zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    naive: NaiveDateTime,
    utc_offset_minutes: i32,
}

impl Epoch {
    /// Parses the store-creation epoch string. Fails the same way any other
    /// datetime fails to parse.
    pub fn parse(datetime: &str, utc_offset_minutes: i32) -> CalendarResult<Self> {
        Ok(Self {
            naive: parse_naive(datetime)?,
            utc_offset_minutes,
        })
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes
    }

    /// The epoch rendered back out in [`DATETIME_FORMAT`], for persisting in
    /// the store's file header.
    pub fn epoch_string(&self) -> String {
        self.naive.format(DATETIME_FORMAT).to_string()
    }

    /// `to_index(datetime_string) -> int | ERROR`.
    ///
    /// Seconds-difference from the epoch is computed, then divided by 3600
    /// using floating-point division and truncated toward zero -- matching
    /// the source's truncation-toward-the-enclosing-hour behavior for
    /// fractional minutes.
    pub fn to_index(&self, datetime: &str) -> CalendarResult<i64> {
        let parsed = parse_naive(datetime)?;
        let seconds = (parsed - self.naive).num_seconds();
        let hour = (seconds as f64 / 3600.0).trunc() as i64;
        if hour < 0 {
            return Err(CalendarError::BeforeEpoch(hour));
        }
        Ok(hour)
    }

    /// Hour-index arithmetic straight from a CSV record's `date`
    /// (`YYYYMMDD`) and `time` (`HHMM`) fields, skipping the
    /// format-then-reparse round trip [`Epoch::to_index`] does -- the
    /// ingestion pipeline's producers are expected to do this math
    /// themselves on every record.
    pub fn to_index_ymdhm(&self, date_yyyymmdd: u32, time_hhmm: u16) -> CalendarResult<i64> {
        let year = (date_yyyymmdd / 10_000) as i32;
        let month = date_yyyymmdd / 100 % 100;
        let day = date_yyyymmdd % 100;
        let hour = (time_hhmm / 100) as u32;
        let minute = (time_hhmm % 100) as u32;

        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| CalendarError::Unparseable(date_yyyymmdd.to_string()))?;
        let naive = date
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(|| CalendarError::Unparseable(time_hhmm.to_string()))?;

        let seconds = (naive - self.naive).num_seconds();
        let hour_idx = (seconds as f64 / 3600.0).trunc() as i64;
        if hour_idx < 0 {
            return Err(CalendarError::BeforeEpoch(hour_idx));
        }
        Ok(hour_idx)
    }

    /// `from_index(int) -> datetime_string`.
    pub fn from_index(&self, index: i64) -> String {
        let dt = self.naive + Duration::hours(index);
        dt.format(DATETIME_FORMAT).to_string()
    }
}

fn parse_naive(s: &str) -> CalendarResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map_err(|_| CalendarError::Unparseable(s.to_string()))
}
