//! T.4 1D/2D and T.6 row decoding (§4.5): the inverse of `encode.rs`,
//! plus EOL/RTC/EOFB resynchronisation and the bad-row-quality policy.

use super::tables::{self, Color, DecodedRun};
use super::{k_factor_for_resolution, runs_to_row, CodingScheme, PackedBits};
use crate::errors::ImageCodingError;

/// Result of decoding one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderOutcome {
    Row(Vec<u8>),
    EndOfPage,
}

fn changes_from_runs(runs: &[u32], width: u32) -> Vec<u32> {
    let mut v = Vec::with_capacity(runs.len() + 2);
    let mut acc = 0u32;
    for &r in runs {
        acc += r;
        v.push(acc);
    }
    v.push(width);
    v.push(width);
    v
}

fn color_at_change(i: usize) -> Color {
    if i % 2 == 0 {
        Color::Black
    } else {
        Color::White
    }
}

fn find_b1(changes: &[u32], a0: i64, a0_color: Color) -> usize {
    let want = a0_color.flip();
    for (i, &c) in changes.iter().enumerate() {
        if (c as i64) > a0 && color_at_change(i) == want {
            return i;
        }
    }
    changes.len() - 1
}

/// Decode a 1D-coded bitstream into a run-length list totalling `width`.
pub fn decode_1d_runs(bits: &PackedBits, width: u32) -> Result<Vec<u32>, ImageCodingError> {
    let mut runs = Vec::new();
    let mut color = Color::White;
    let mut total = 0u32;
    let mut pos = 0usize;
    let mut pending = 0u32;

    while total < width {
        let (decoded, len) =
            tables::lookup_run(color, bits, pos).ok_or(ImageCodingError::InvalidCodeWord { bit_offset: pos })?;
        pos += len;
        match decoded {
            DecodedRun::Makeup(r) => pending += r,
            DecodedRun::Terminating(r) => {
                let run = pending + r;
                pending = 0;
                total += run;
                runs.push(run);
                color = color.flip();
            }
        }
    }
    Ok(runs)
}

/// Decode a 2D/MMR-coded row's mode stream against `ref_runs`.
pub fn decode_2d_runs(bits: &PackedBits, ref_runs: &[u32], width: u32) -> Result<Vec<u32>, ImageCodingError> {
    let ref_changes = changes_from_runs(ref_runs, width);
    let mut cur_changes: Vec<u32> = Vec::new();

    let mut a0: i64 = -1;
    let mut a0_color = Color::White;
    let mut pos = 0usize;

    while a0 < width as i64 {
        let b1_idx = find_b1(&ref_changes, a0, a0_color);
        let b1 = ref_changes[b1_idx] as i64;
        let b2 = ref_changes[(b1_idx + 1).min(ref_changes.len() - 1)] as i64;

        let (pass_value, pass_len) = tables::MODE_PASS;
        if bits.starts_with_code(pos, pass_value, pass_len) {
            pos += pass_len as usize;
            a0 = b2;
            continue;
        }

        let mut matched = None;
        for &((value, len), delta) in &tables::VERTICAL_MODE_CODES {
            if bits.starts_with_code(pos, value, len) {
                matched = Some((len, delta));
                break;
            }
        }
        if let Some((len, delta)) = matched {
            pos += len as usize;
            let a1 = b1 + delta;
            cur_changes.push(a1 as u32);
            a0 = a1;
            a0_color = a0_color.flip();
            continue;
        }

        let (horiz_value, horiz_len) = tables::MODE_HORIZONTAL;
        if bits.starts_with_code(pos, horiz_value, horiz_len) {
            pos += horiz_len as usize;
            let (d1, l1) =
                tables::lookup_run(a0_color, bits, pos).ok_or(ImageCodingError::InvalidCodeWord { bit_offset: pos })?;
            pos += l1;
            let run1 = expect_terminating(d1, pos)?;
            let (d2, l2) = tables::lookup_run(a0_color.flip(), bits, pos)
                .ok_or(ImageCodingError::InvalidCodeWord { bit_offset: pos })?;
            pos += l2;
            let run2 = expect_terminating(d2, pos)?;

            let start = if a0 < 0 { 0 } else { a0 };
            let a1 = start + run1 as i64;
            let a2 = a1 + run2 as i64;
            cur_changes.push(a1 as u32);
            cur_changes.push(a2 as u32);
            a0 = a2;
            continue;
        }

        return Err(ImageCodingError::InvalidCodeWord { bit_offset: pos });
    }

    // Convert the changing-element list back to run lengths.
    let mut runs = Vec::with_capacity(cur_changes.len());
    let mut prev = 0u32;
    for &c in &cur_changes {
        runs.push(c - prev);
        prev = c;
    }
    if prev < width {
        runs.push(width - prev);
    }
    Ok(runs)
}

fn expect_terminating(decoded: DecodedRun, bit_offset: usize) -> Result<u32, ImageCodingError> {
    match decoded {
        DecodedRun::Terminating(r) => Ok(r),
        DecodedRun::Makeup(_) => Err(ImageCodingError::InvalidCodeWord { bit_offset }),
    }
}

/// Stateful page decoder, the mirror image of [`super::encode::Encoder`].
pub struct Decoder {
    scheme: CodingScheme,
    width: usize,
    k: u32,
    rows_since_1d: u32,
    ref_runs: Vec<u32>,
    bad_rows: usize,
    max_bad_rows: usize,
}

impl Decoder {
    pub fn new(scheme: CodingScheme, width: usize, vertical_resolution_dpi: u16, max_bad_rows: usize) -> Self {
        Self {
            scheme,
            width,
            k: k_factor_for_resolution(vertical_resolution_dpi),
            rows_since_1d: 0,
            ref_runs: vec![width as u32],
            bad_rows: 0,
            max_bad_rows,
        }
    }

    pub fn bad_row_count(&self) -> usize {
        self.bad_rows
    }

    /// Decode one row body (without the leading EOL; for T4_2D the caller
    /// strips the EOL and passes the following tag bit in as `is_1d_row`).
    pub fn decode_row(&mut self, body: &PackedBits, is_1d_row: bool) -> Result<Vec<u8>, ImageCodingError> {
        let width = self.width as u32;
        let result = match self.scheme {
            CodingScheme::T4_1D => decode_1d_runs(body, width),
            CodingScheme::T4_2D => {
                if is_1d_row {
                    decode_1d_runs(body, width)
                } else {
                    decode_2d_runs(body, &self.ref_runs, width)
                }
            }
            CodingScheme::T6 => decode_2d_runs(body, &self.ref_runs, width),
        };

        match result {
            Ok(runs) => {
                self.ref_runs = runs.clone();
                self.bad_rows = 0;
                self.rows_since_1d = (self.rows_since_1d + 1) % self.k.max(1);
                Ok(runs_to_row(&runs, self.width))
            }
            Err(e) => {
                self.bad_rows += 1;
                if self.bad_rows > self.max_bad_rows {
                    return Err(ImageCodingError::PageQualityExceeded { bad_rows: self.bad_rows });
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::encode::{encode_1d_runs, encode_2d_runs};

    #[test]
    fn decode_1d_round_trips_encode_1d() {
        let runs = vec![4u32, 4, 8];
        let bits = encode_1d_runs(&runs);
        let decoded = decode_1d_runs(&bits, 16).unwrap();
        assert_eq!(decoded, runs);
    }

    #[test]
    fn decode_2d_round_trips_encode_2d_all_white() {
        let width = 64u32;
        let reference = vec![width];
        let cur = vec![width];
        let bits = encode_2d_runs(&cur, &reference, width);
        let decoded = decode_2d_runs(&bits, &reference, width).unwrap();
        assert_eq!(decoded, cur);
    }

    #[test]
    fn decode_2d_round_trips_a_mixed_row() {
        let width = 32u32;
        let reference = vec![32u32];
        let cur = vec![8u32, 8, 16];
        let bits = encode_2d_runs(&cur, &reference, width);
        let decoded = decode_2d_runs(&bits, &reference, width).unwrap();
        assert_eq!(decoded.iter().sum::<u32>(), width);
    }

    #[test]
    fn decoder_tracks_bad_row_count_and_trips_threshold() {
        let mut dec = Decoder::new(CodingScheme::T4_1D, 16, 98, 2);
        let garbage: PackedBits = std::iter::repeat(true).take(16).collect();
        assert!(dec.decode_row(&garbage, true).is_err());
        assert_eq!(dec.bad_row_count(), 1);
        assert!(dec.decode_row(&garbage, true).is_err());
        let third = dec.decode_row(&garbage, true);
        assert!(matches!(third, Err(ImageCodingError::PageQualityExceeded { bad_rows: 3 })));
    }
}
