use std::collections::BTreeMap;

use num_complex::Complex64;

use crate::BurstEpoch;

/// Спектр одной интеграции одного канала, как его отдаёт crawler.
pub type ComplexSpectrum = Vec<Complex64>;

/// Метаданные записи. Читаются один раз на входной файл.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureMetadata {
    /// Идентификатор станции
    pub station: String,
    /// Число бинов, заявленное в заголовке записи
    pub raw_bins: usize,
    /// Используемое число бинов, см. [`usable_bins`]
    pub bins: usize,
    /// Начальная частота, Гц
    pub fstart: f64,
    /// Шаг по частоте, Гц
    pub fstep: f64,
    /// Эпоха первого burst-а
    pub start: BurstEpoch,
    /// Длительность интеграции, секунды
    pub int_time: f64,
}

/// Сырые поля заголовка записи (имя → строковое значение).
///
/// Порядок полей в записи не сохраняется: итерация идёт по имени.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: BTreeMap<String, String>,
}

/// Используемое число частотных бинов.
///
/// Особенность формата LoCo: верхняя половина заявленных бинов не несёт
/// данных и отбрасывается всегда, независимо от инструмента. Это константа
/// формата, а не общее правило усечения спектров.
pub const fn usable_bins(raw_bins: usize) -> usize {
    raw_bins / 2
}

impl CaptureMetadata {
    /// Полный частотный охват используемых бинов, Гц.
    pub fn bandwidth_hz(&self) -> f64 {
        self.fstep * self.bins as f64
    }
}

impl HeaderFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<String>>(
        &mut self,
        key: K,
        value: V,
    ) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn remove(
        &mut self,
        key: &str,
    ) -> Option<String> {
        self.fields.remove(key)
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = HeaderFields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}
