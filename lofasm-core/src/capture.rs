//! Контракт с crawler-ом записи и адаптеры поверх него.
//!
//! Crawler разбирает кадрирование burst-ов и интеграций сырой записи и
//! отдаёт спектры по каналам. Конвертер видит его только через
//! [`CaptureCrawler`].

use lofasm_types::{
    usable_bins, BurstContext, BurstEpoch, CaptureMetadata, ComplexSpectrum, EndOfCapture,
    HeaderFields, IntegrationError, MetadataError, MetadataResult, PolarizationChannel,
    SampleResult,
};
use log::{debug, warn};

/// Источник данных записи (LoCo crawler).
pub trait CaptureCrawler {
    /// Сырые поля заголовка записи.
    fn header_fields(&mut self) -> MetadataResult<HeaderFields>;

    /// Переход к следующему burst-у. Возвращает его эпоху.
    fn advance_burst(&mut self) -> Result<BurstEpoch, EndOfCapture>;

    /// Выбирает канал для последующих `read_current_sample`.
    fn select_channel(
        &mut self,
        channel: PolarizationChannel,
    );

    /// Спектр выбранного канала в текущей интеграции.
    fn read_current_sample(&mut self) -> SampleResult<ComplexSpectrum>;

    /// Сдвигается на `n` интеграций вперёд.
    fn advance_integration(
        &mut self,
        n: usize,
    ) -> Result<(), IntegrationError>;

    /// `Ok(())`, если текущая интеграция есть. Иначе исход, на котором
    /// остановился burst (пустой burst, повреждение, конец записи).
    fn integration_status(&self) -> Result<(), IntegrationError>;
}

impl<C: CaptureCrawler + ?Sized> CaptureCrawler for Box<C> {
    fn header_fields(&mut self) -> MetadataResult<HeaderFields> {
        (**self).header_fields()
    }

    fn advance_burst(&mut self) -> Result<BurstEpoch, EndOfCapture> {
        (**self).advance_burst()
    }

    fn select_channel(
        &mut self,
        channel: PolarizationChannel,
    ) {
        (**self).select_channel(channel)
    }

    fn read_current_sample(&mut self) -> SampleResult<ComplexSpectrum> {
        (**self).read_current_sample()
    }

    fn advance_integration(
        &mut self,
        n: usize,
    ) -> Result<(), IntegrationError> {
        (**self).advance_integration(n)
    }

    fn integration_status(&self) -> Result<(), IntegrationError> {
        (**self).integration_status()
    }
}

/// Извлекает [`CaptureMetadata`] из полей заголовка записи.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Читает заголовок через crawler и разбирает его.
    pub fn read<C: CaptureCrawler + ?Sized>(crawler: &mut C) -> MetadataResult<CaptureMetadata> {
        let fields = crawler.header_fields()?;
        Self::extract(&fields)
    }

    /// Разбор полей: `station`, `Nbins`, `fstart`, `fstep`, `mjd_day`,
    /// `mjd_msec`, `int_time`.
    pub fn extract(fields: &HeaderFields) -> MetadataResult<CaptureMetadata> {
        let station = required(fields, "station")?.to_string();
        let raw_bins: usize = parse_field(fields, "Nbins")?;
        let fstart: f64 = parse_field(fields, "fstart")?;
        let fstep = parse_fraction_mhz(fields, "fstep")?;
        let mjd_day: i64 = parse_field(fields, "mjd_day")?;
        let mjd_msec: f64 = parse_field(fields, "mjd_msec")?;
        let int_time: f64 = parse_field(fields, "int_time")?;

        let start = BurstEpoch::new(mjd_day, mjd_msec);
        // Эпоха первого burst-а должна быть представима
        start.to_utc()?;

        Ok(CaptureMetadata {
            station,
            raw_bins,
            bins: usable_bins(raw_bins),
            fstart,
            fstep,
            start,
            int_time,
        })
    }
}

fn required<'a>(
    fields: &'a HeaderFields,
    name: &'static str,
) -> MetadataResult<&'a str> {
    fields
        .get(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(MetadataError::MissingField(name))
}

fn parse_field<T: std::str::FromStr>(
    fields: &HeaderFields,
    name: &'static str,
) -> MetadataResult<T> {
    let value = required(fields, name)?;
    value.parse().map_err(|_| MetadataError::InvalidField {
        field: name,
        value: value.to_string(),
    })
}

/// `fstep` хранится как цифры дробной части мегагерц: `"09765625"` →
/// `0.09765625 МГц` → `97656.25 Гц`.
fn parse_fraction_mhz(
    fields: &HeaderFields,
    name: &'static str,
) -> MetadataResult<f64> {
    let digits = required(fields, name)?;
    let invalid = || MetadataError::InvalidField {
        field: name,
        value: digits.to_string(),
    };

    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let fraction: f64 = format!("0.{digits}").parse().map_err(|_| invalid())?;
    Ok(fraction * 1e6)
}

/// Исход перехода к следующей интеграции внутри burst-а.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// Текущая интеграция доступна
    Continue,
    /// Повреждение: заканчивается только текущий burst
    BurstCorrupt(String),
    /// Данные записи исчерпаны: заканчивается burst и весь файл
    CaptureExhausted,
}

/// Курсор по burst-ам записи.
///
/// Первый burst берёт эпоху из метаданных, каждый следующий требует
/// успешного `advance_burst` crawler-а.
pub struct BurstCursor<'c, C: CaptureCrawler + ?Sized> {
    crawler: &'c mut C,
    default_int_time: f64,
    start: BurstEpoch,
    current: Option<BurstContext>,
    started: bool,
    exhausted: bool,
}

impl<'c, C: CaptureCrawler + ?Sized> BurstCursor<'c, C> {
    pub fn new(
        crawler: &'c mut C,
        meta: &CaptureMetadata,
    ) -> Self {
        Self {
            crawler,
            default_int_time: meta.int_time,
            start: meta.start,
            current: None,
            started: false,
            exhausted: false,
        }
    }

    /// Текущий burst (после первого успешного `advance`).
    pub fn current_burst(&self) -> Option<&BurstContext> {
        self.current.as_ref()
    }

    /// Переходит к следующему burst-у.
    pub fn advance(&mut self) -> Result<BurstContext, EndOfCapture> {
        self.current = None;

        if self.exhausted {
            return Err(EndOfCapture);
        }

        let epoch = if self.started {
            match self.crawler.advance_burst() {
                Ok(epoch) => epoch,
                Err(e) => {
                    self.exhausted = true;
                    return Err(e);
                }
            }
        } else {
            self.started = true;
            self.start
        };

        // Burst может переопределить время интегрирования для всех следующих
        if let Some(t) = epoch.int_time {
            self.default_int_time = t;
        }

        match BurstContext::new(epoch, self.default_int_time) {
            Ok(ctx) => {
                self.current = Some(ctx.clone());
                Ok(ctx)
            }
            Err(e) => {
                warn!("Unusable burst epoch ({e}); abandoning rest of capture");
                self.exhausted = true;
                Err(EndOfCapture)
            }
        }
    }

    /// Есть ли у текущего burst-а первая интеграция.
    ///
    /// Вызывается сразу после [`advance`](Self::advance): burst без
    /// интеграций сообщает свой исход, не трогая каналы.
    pub fn first_integration(&mut self) -> IntegrationOutcome {
        if self.exhausted {
            return IntegrationOutcome::CaptureExhausted;
        }

        let status = self.crawler.integration_status();
        self.settle(status)
    }

    /// Переходит к следующей интеграции текущего burst-а.
    pub fn next_integration(&mut self) -> IntegrationOutcome {
        if self.exhausted {
            return IntegrationOutcome::CaptureExhausted;
        }

        let step = self.crawler.advance_integration(1);
        self.settle(step)
    }

    /// `true`, если запись исчерпана.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn crawler(&mut self) -> &mut C {
        self.crawler
    }

    fn settle(
        &mut self,
        step: Result<(), IntegrationError>,
    ) -> IntegrationOutcome {
        match step {
            Ok(()) => IntegrationOutcome::Continue,
            Err(IntegrationError::Corrupt(reason)) => {
                debug!("Integration run ended: {reason}");
                IntegrationOutcome::BurstCorrupt(reason)
            }
            Err(IntegrationError::EndOfCapture) => {
                self.exhausted = true;
                IntegrationOutcome::CaptureExhausted
            }
        }
    }
}
