use std::ops::Index;

use crate::{record::HourlyRecord, timestamp};

pub const HOURS_PER_DAY: usize = 24;

/// Average power for each hour of the day, index 0 being 00:00-00:59 UTC.
///
/// Hours without any sample hold `0.0`, so an hour without data can't be told
/// apart from an hour that really produced nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyProfile([f64; HOURS_PER_DAY]);

impl MonthlyProfile {
    pub fn zeroed() -> Self {
        Self([0.0; HOURS_PER_DAY])
    }

    pub fn as_array(&self) -> &[f64; HOURS_PER_DAY] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    /// `(hour, average)` pairs in hour order.
    pub fn hourly(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.iter().enumerate()
    }

    /// Highest hourly average and its hour. The earliest hour wins a tie.
    pub fn peak(&self) -> (usize, f64) {
        self.hourly()
            .fold((0, self.0[0]), |best, (hour, value)| {
                if value > best.1 {
                    (hour, value)
                } else {
                    best
                }
            })
    }

    /// Energy of an average day in Wh, each hourly mean standing for one hour.
    pub fn daily_energy(&self) -> f64 {
        self.iter().sum()
    }

    /// True when no hour produced anything, e.g. a month without samples.
    pub fn is_all_zero(&self) -> bool {
        self.iter().all(|value| value == 0.0)
    }
}

impl Default for MonthlyProfile {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Index<usize> for MonthlyProfile {
    type Output = f64;

    fn index(&self, hour: usize) -> &f64 {
        &self.0[hour]
    }
}

impl From<MonthlyProfile> for Vec<f64> {
    fn from(profile: MonthlyProfile) -> Self {
        profile.0.to_vec()
    }
}

/// Averages the power of every record falling in `month` (1-12) per hour of
/// the day, after multiplying it by `scale_factor`.
///
/// Records with an unparsable timestamp or without a power value are left out.
/// A month outside 1-12 matches nothing and yields an all-zero profile.
pub fn aggregate(records: &[HourlyRecord], month: u8, scale_factor: f64) -> MonthlyProfile {
    let mut sums = [0.0; HOURS_PER_DAY];
    let mut counts = [0u32; HOURS_PER_DAY];

    for (hour, power) in records.iter().filter_map(|record| sample(record, month)) {
        sums[hour] += power * scale_factor;
        counts[hour] += 1;
    }

    let mut averages = [0.0; HOURS_PER_DAY];
    for ((average, sum), count) in averages.iter_mut().zip(sums).zip(counts) {
        if count > 0 {
            *average = sum / f64::from(count);
        }
    }

    MonthlyProfile(averages)
}

/// The `(hour, power, 1.0)` a record contributes to `month`, if any.
fn sample(record: &HourlyRecord, month: u8) -> Option<(usize, f64)> {
    let time = timestamp::parse(&record.time).ok()?;
    if u8::from(time.month()) != month {
        return None;
    }
    let power = record.power?;

    Some((usize::from(time.hour()), power))
}
