//! Hex-представление полезной нагрузки `.abx`.
//!
//! Каждый байт превращается в две заглавные hex-цифры. После каждых
//! [`LINE_WIDTH`] выходных символов вставляется перевод строки. Переносы
//! косметические: декодер их игнорирует.

use std::io::{self, Write};

use crate::error::{FormatError, FormatResult};

/// Ширина строки hex-вывода (символов).
pub const LINE_WIDTH: usize = 80;

/// Таблица байт → две hex-цифры. Строится при компиляции.
pub static HEX_TABLE: [[u8; 2]; 256] = build_hex_table();

const fn build_hex_table() -> [[u8; 2]; 256] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    let mut table = [[0u8; 2]; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = [DIGITS[i >> 4], DIGITS[i & 0x0F]];
        i += 1;
    }
    table
}

/// Пишет байты hex-парами с переносом строки каждые [`LINE_WIDTH`] символов.
pub struct HexWriter<W: Write> {
    inner: W,
    column: usize,
    line: Vec<u8>,
}

impl<W: Write> HexWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            column: 0,
            line: Vec::with_capacity(4 * LINE_WIDTH),
        }
    }

    /// Кодирует `bytes`. Возвращает число записанных выходных байт.
    pub fn write_bytes(
        &mut self,
        bytes: &[u8],
    ) -> io::Result<usize> {
        let mut written = 0;

        for chunk in bytes.chunks(LINE_WIDTH) {
            self.line.clear();

            for &b in chunk {
                self.line.extend_from_slice(&HEX_TABLE[b as usize]);
                self.column += 2;

                if self.column >= LINE_WIDTH {
                    self.line.push(b'\n');
                    self.column = 0;
                }
            }

            self.inner.write_all(&self.line)?;
            written += self.line.len();
        }

        Ok(written)
    }

    /// Завершает текущую строку, если она не пуста.
    pub fn end_line(&mut self) -> io::Result<usize> {
        if self.column == 0 {
            return Ok(0);
        }

        self.inner.write_all(b"\n")?;
        self.column = 0;

        Ok(1)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Hex-строка без переносов (для коротких полей заголовка).
pub fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        let [hi, lo] = HEX_TABLE[b as usize];
        out.push(hi as char);
        out.push(lo as char);
    }
    out
}

/// Декодирует hex-текст, пропуская пробельные символы.
pub fn decode_hex(text: &[u8]) -> FormatResult<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() / 2);
    let mut high: Option<u8> = None;

    for (pos, &c) in text.iter().enumerate() {
        if c.is_ascii_whitespace() {
            continue;
        }

        let nibble = match c {
            b'0'..=b'9' => c - b'0',
            b'A'..=b'F' => c - b'A' + 10,
            b'a'..=b'f' => c - b'a' + 10,
            _ => {
                return Err(FormatError::InvalidHex(format!(
                    "unexpected byte 0x{c:02X} at offset {pos}"
                )))
            }
        };

        match high.take() {
            Some(h) => out.push((h << 4) | nibble),
            None => high = Some(nibble),
        }
    }

    if high.is_some() {
        return Err(FormatError::InvalidHex("odd number of hex digits".into()));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_entries() {
        assert_eq!(&HEX_TABLE[0x00], b"00");
        assert_eq!(&HEX_TABLE[0x0A], b"0A");
        assert_eq!(&HEX_TABLE[0x3F], b"3F");
        assert_eq!(&HEX_TABLE[0xFF], b"FF");
    }

    #[test]
    fn test_encode_hex_float_pattern() {
        assert_eq!(encode_hex(&1.0f32.to_le_bytes()), "0000803F");
    }

    #[test]
    fn test_wraps_every_80_chars() {
        let mut w = HexWriter::new(Vec::new());
        let n = w.write_bytes(&[0xAB; 100]).unwrap();
        w.end_line().unwrap();

        let text = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 80);
        assert_eq!(lines[1].len(), 80);
        assert_eq!(lines[2].len(), 40);
        // 200 hex-символов + 2 переноса внутри write_bytes
        assert_eq!(n, 202);
    }

    #[test]
    fn test_wrap_continues_across_calls() {
        let mut w = HexWriter::new(Vec::new());
        w.write_bytes(&[0x01; 30]).unwrap();
        w.write_bytes(&[0x02; 30]).unwrap();
        w.end_line().unwrap();

        let text = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].len(), 80);
        assert_eq!(lines[1].len(), 40);
    }

    #[test]
    fn test_end_line_no_blank_lines() {
        let mut w = HexWriter::new(Vec::new());
        w.write_bytes(&[0x11; 40]).unwrap(); // ровно 80 символов
        assert_eq!(w.end_line().unwrap(), 0);

        let text = w.into_inner();
        assert_eq!(text.len(), 81);
        assert_eq!(text.last(), Some(&b'\n'));
    }

    #[test]
    fn test_decode_ignores_whitespace() {
        let bytes = decode_hex(b"0000\n803F\r\n ab").unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x80, 0x3F, 0xAB]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_hex(b"0G").is_err());
        assert!(decode_hex(b"ABC").is_err());
    }

    #[test]
    fn test_random_bytes_round_trip() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let data: Vec<u8> = (0..1_000).map(|_| rng.gen()).collect();

        let mut w = HexWriter::new(Vec::new());
        w.write_bytes(&data).unwrap();
        w.end_line().unwrap();

        assert_eq!(decode_hex(&w.into_inner()).unwrap(), data);
    }
}
