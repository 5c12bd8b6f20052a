use chrono::{DateTime, TimeDelta, Utc};

use crate::{TypesError, TypesResult};

/// Юлианская дата эпохи J2000.
pub const J2000_JD: i64 = 2_451_545;

/// Смещение, вычтенное из юлианской даты в полях `mjd_day` LoCo-файлов.
pub const LOCO_JD_OFFSET: i64 = 2_400_000;

/// MJD даты 1970-01-01T00:00:00Z.
pub const MJD_UNIX_EPOCH: i64 = 40_587;

pub const MS_PER_DAY: f64 = 8.64e7;

/// Формат метки времени в именах выходных файлов и `start_time`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Эпоха очередного burst-а в терминах записи: пара (день, миллисекунда дня).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstEpoch {
    pub mjd_day: i64,
    pub mjd_msec: f64,
    /// Время интегрирования, если burst переопределяет значение заголовка.
    pub int_time: Option<f64>,
}

/// Контекст одного burst-а. Живёт, пока не исчерпаны его интеграции.
#[derive(Debug, Clone)]
pub struct BurstContext {
    pub epoch: BurstEpoch,
    /// Смещение начала burst-а относительно J2000, секунды
    pub time_offset_j2000: f64,
    /// Начало burst-а (UTC)
    pub start: DateTime<Utc>,
    /// `start` в формате [`TIMESTAMP_FORMAT`]
    pub timestamp: String,
    /// Длительность одной интеграции, секунды
    pub int_time: f64,
}

impl BurstEpoch {
    pub fn new(
        mjd_day: i64,
        mjd_msec: f64,
    ) -> Self {
        Self {
            mjd_day,
            mjd_msec,
            int_time: None,
        }
    }

    /// Эпоха из дробного MJD.
    pub fn from_mjd(mjd: f64) -> Self {
        let day = mjd.floor();
        Self::new(day as i64, (mjd - day) * MS_PER_DAY)
    }

    /// Секунды от J2000 в соглашении о днях, принятом в LoCo-записях.
    pub fn time_offset_j2000(&self) -> f64 {
        let days = self.mjd_day - (J2000_JD - LOCO_JD_OFFSET);
        days as f64 * 86_400.0 + self.mjd_msec * 0.001
    }

    pub fn to_utc(&self) -> TypesResult<DateTime<Utc>> {
        let out_of_range = || TypesError::EpochOutOfRange {
            mjd_day: self.mjd_day,
            mjd_msec: self.mjd_msec,
        };

        if !self.mjd_msec.is_finite() {
            return Err(out_of_range());
        }

        let millis = (self.mjd_day - MJD_UNIX_EPOCH)
            .checked_mul(86_400_000)
            .and_then(|ms| ms.checked_add(self.mjd_msec.floor() as i64))
            .ok_or_else(out_of_range)?;

        TimeDelta::try_milliseconds(millis)
            .and_then(|delta| DateTime::<Utc>::UNIX_EPOCH.checked_add_signed(delta))
            .ok_or_else(out_of_range)
    }
}

impl BurstContext {
    /// Строит контекст burst-а; `default_int_time` берётся из метаданных
    /// записи, если burst не задаёт своё значение.
    pub fn new(
        epoch: BurstEpoch,
        default_int_time: f64,
    ) -> TypesResult<Self> {
        let start = epoch.to_utc()?;

        Ok(Self {
            epoch,
            time_offset_j2000: epoch.time_offset_j2000(),
            timestamp: start.format(TIMESTAMP_FORMAT).to_string(),
            start,
            int_time: epoch.int_time.unwrap_or(default_int_time),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_offset_at_reference_day() {
        let epoch = BurstEpoch::new(51_545, 1_500.0);
        assert!((epoch.time_offset_j2000() - 1.5).abs() < 1e-12);

        let next_day = BurstEpoch::new(51_546, 0.0);
        assert_eq!(next_day.time_offset_j2000(), 86_400.0);

        let before = BurstEpoch::new(51_544, 0.0);
        assert_eq!(before.time_offset_j2000(), -86_400.0);
    }

    #[test]
    fn test_timestamp_is_zero_padded() {
        // MJD 57000 = 2014-12-09; 3 723 456 мс = 01:02:03.456
        let ctx = BurstContext::new(BurstEpoch::new(57_000, 3_723_456.0), 0.5).unwrap();
        assert_eq!(ctx.timestamp, "20141209_010203");
        assert_eq!(ctx.int_time, 0.5);
    }

    #[test]
    fn test_unix_epoch_day() {
        let utc = BurstEpoch::new(MJD_UNIX_EPOCH, 0.0).to_utc().unwrap();
        assert_eq!(utc, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_burst_int_time_overrides_default() {
        let mut epoch = BurstEpoch::from_mjd(57_000.5);
        epoch.int_time = Some(0.125);

        let ctx = BurstContext::new(epoch, 0.5).unwrap();
        assert_eq!(ctx.int_time, 0.125);
        assert_eq!(ctx.timestamp, "20141209_120000");
    }

    #[test]
    fn test_non_finite_epoch_rejected() {
        let epoch = BurstEpoch::new(57_000, f64::NAN);
        assert!(BurstContext::new(epoch, 1.0).is_err());
    }
}
