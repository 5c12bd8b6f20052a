//! Crawler в памяти с детерминированными спектрами и внедрением сбоев.

use std::collections::{BTreeMap, HashSet};

use lofasm_types::{
    BurstEpoch, ComplexSpectrum, EndOfCapture, HeaderFields, IntegrationError, MetadataResult,
    PolarizationChannel, SampleError, SampleResult, CANONICAL_CHANNELS,
};
use num_complex::Complex64;

use crate::capture::CaptureCrawler;

/// Шаг между эпохами соседних burst-ов, мс.
pub const SIM_BURST_SPACING_MS: f64 = 60_000.0;

pub const SIM_START_MJD: i64 = 57_000;

pub const SIM_INT_TIME: f64 = 0.5;

/// Симулированная запись.
///
/// `bursts[i]` — число интеграций в burst-е `i`. Каждый burst отстоит от
/// предыдущего на [`SIM_BURST_SPACING_MS`].
#[derive(Debug, Clone)]
pub struct SimulatedCapture {
    fields: HeaderFields,
    raw_bins: usize,
    bursts: Vec<usize>,
    channels: Vec<PolarizationChannel>,
    burst_int_time: BTreeMap<usize, f64>,
    sample_faults: HashSet<(usize, usize, PolarizationChannel)>,
    corrupt_after: BTreeMap<usize, usize>,
    burst: usize,
    integration: usize,
    selected: Option<PolarizationChannel>,
}

impl SimulatedCapture {
    pub fn new(
        raw_bins: usize,
        bursts: &[usize],
    ) -> Self {
        let fields = [
            ("station", "LoFASM1".to_string()),
            ("Nbins", raw_bins.to_string()),
            ("fstart", "0".to_string()),
            ("fstep", "09765625".to_string()),
            ("mjd_day", SIM_START_MJD.to_string()),
            ("mjd_msec", "0".to_string()),
            ("int_time", SIM_INT_TIME.to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            fields,
            raw_bins,
            bursts: bursts.to_vec(),
            channels: CANONICAL_CHANNELS.to_vec(),
            burst_int_time: BTreeMap::new(),
            sample_faults: HashSet::new(),
            corrupt_after: BTreeMap::new(),
            burst: 0,
            integration: 0,
            selected: None,
        }
    }

    /// Ограничивает набор записанных каналов.
    pub fn with_channels(
        mut self,
        channels: &[PolarizationChannel],
    ) -> Self {
        self.channels = channels.to_vec();
        self
    }

    /// Burst `burst` переопределяет время интегрирования.
    pub fn with_burst_int_time(
        mut self,
        burst: usize,
        int_time: f64,
    ) -> Self {
        self.burst_int_time.insert(burst, int_time);
        self
    }

    /// Заменяет сырое значение поля заголовка.
    pub fn with_field(
        mut self,
        name: &str,
        value: &str,
    ) -> Self {
        self.fields.insert(name, value);
        self
    }

    /// Убирает поле из заголовка.
    pub fn without_field(
        mut self,
        name: &str,
    ) -> Self {
        self.fields.remove(name);
        self
    }

    /// Чтение `channel` в интеграции `integration` burst-а `burst` даёт ошибку.
    pub fn fail_sample(
        mut self,
        burst: usize,
        integration: usize,
        channel: PolarizationChannel,
    ) -> Self {
        self.sample_faults.insert((burst, integration, channel));
        self
    }

    /// В burst-е `burst` доступны только первые `n` интеграций, затем
    /// переход сообщает о повреждении.
    pub fn corrupt_after(
        mut self,
        burst: usize,
        n: usize,
    ) -> Self {
        self.corrupt_after.insert(burst, n);
        self
    }

    /// Эпоха burst-а `burst`.
    pub fn epoch(
        &self,
        burst: usize,
    ) -> BurstEpoch {
        let mut epoch = BurstEpoch::new(SIM_START_MJD, burst as f64 * SIM_BURST_SPACING_MS);
        epoch.int_time = self.burst_int_time.get(&burst).copied();
        epoch
    }

    /// Значение бина, которое отдаёт запись.
    pub fn expected_value(
        burst: usize,
        integration: usize,
        channel: PolarizationChannel,
        bin: usize,
    ) -> Complex64 {
        let [a, b] = channel.code();
        let tag = f64::from(a - b'A') * 10.0 + f64::from(b - b'A');
        let re = (burst * 1_000 + integration) as f64 + tag * 0.01 + bin as f64 * 1e-6;

        if channel.is_real() {
            Complex64::new(re, 0.0)
        } else {
            Complex64::new(re, -(bin as f64) - tag)
        }
    }

    pub fn position(&self) -> (usize, usize) {
        (self.burst, self.integration)
    }

    /// Почему интеграция `integration` текущего burst-а недоступна.
    fn stall_at(
        &self,
        integration: usize,
    ) -> Option<IntegrationError> {
        if self
            .corrupt_after
            .get(&self.burst)
            .is_some_and(|&k| integration >= k)
        {
            return Some(IntegrationError::corrupt("injected corruption"));
        }

        let available = self.bursts.get(self.burst).copied().unwrap_or(0);
        if integration < available {
            return None;
        }

        // Следующей идёт запись нового burst-а
        if self.burst + 1 < self.bursts.len() {
            Some(IntegrationError::corrupt("burst boundary"))
        } else {
            Some(IntegrationError::EndOfCapture)
        }
    }
}

impl CaptureCrawler for SimulatedCapture {
    fn header_fields(&mut self) -> MetadataResult<HeaderFields> {
        Ok(self.fields.clone())
    }

    fn advance_burst(&mut self) -> Result<BurstEpoch, EndOfCapture> {
        if self.burst + 1 >= self.bursts.len() {
            self.integration = usize::MAX;
            return Err(EndOfCapture);
        }

        self.burst += 1;
        self.integration = 0;

        Ok(self.epoch(self.burst))
    }

    fn select_channel(
        &mut self,
        channel: PolarizationChannel,
    ) {
        self.selected = Some(channel);
    }

    fn read_current_sample(&mut self) -> SampleResult<ComplexSpectrum> {
        let channel = self.selected.ok_or(SampleError::NoChannelSelected)?;

        let available = self.bursts.get(self.burst).copied().unwrap_or(0);
        if self.integration >= available {
            return Err(SampleError::corrupted("no integration available"));
        }
        if !self.channels.contains(&channel) {
            return Err(SampleError::ChannelUnavailable(channel));
        }
        if self
            .sample_faults
            .contains(&(self.burst, self.integration, channel))
        {
            return Err(SampleError::corrupted("injected sample fault"));
        }

        Ok((0..self.raw_bins)
            .map(|bin| Self::expected_value(self.burst, self.integration, channel, bin))
            .collect())
    }

    fn advance_integration(
        &mut self,
        n: usize,
    ) -> Result<(), IntegrationError> {
        for _ in 0..n {
            let next = self.integration.saturating_add(1);
            if let Some(e) = self.stall_at(next) {
                return Err(e);
            }
            self.integration = next;
        }

        Ok(())
    }

    fn integration_status(&self) -> Result<(), IntegrationError> {
        self.stall_at(self.integration).map_or(Ok(()), Err)
    }
}
