//! T.4 1D/2D and T.6 row encoding (§4.5).

use super::tables::{self, Color};
use super::{k_factor_for_resolution, row_runs, CodingScheme, PackedBits};
use crate::errors::ImageCodingError;

/// Encode one row's run-length list as T.4 1D (alternating terminating /
/// make-up codes, starting white).
pub fn encode_1d_runs(runs: &[u32]) -> PackedBits {
    let mut out = PackedBits::new();
    let mut color = Color::White;
    for &run in runs {
        tables::encode_run(color, run, &mut out);
        color = color.flip();
    }
    out
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

/// Encode one row two-dimensionally against `ref_runs` (§4.5 MR/MMR mode
/// selection: pass / vertical / horizontal).
pub fn encode_2d_runs(cur_runs: &[u32], ref_runs: &[u32], width: u32) -> PackedBits {
    let cur_changes = changes_from_runs(cur_runs, width);
    let ref_changes = changes_from_runs(ref_runs, width);

    let mut out = PackedBits::new();
    let mut a0: i64 = -1;
    let mut a0_color = Color::White;
    let mut cur_idx = 0usize;

    while a0 < width as i64 {
        let b1_idx = find_b1(&ref_changes, a0, a0_color);
        let b1 = ref_changes[b1_idx] as i64;
        let b2 = ref_changes[(b1_idx + 1).min(ref_changes.len() - 1)] as i64;

        let a1 = cur_changes.get(cur_idx).copied().unwrap_or(width) as i64;

        if b2 < a1 {
            let (value, len) = tables::MODE_PASS;
            out.push_code(value, len);
            a0 = b2;
            // Pass does not flip colour or advance cur_idx: the run
            // continues past b2 in the same colour.
            continue;
        }

        let delta = a1 - b1;
        if delta.abs() <= 3 {
            let (value, len) = match delta {
                0 => tables::MODE_V0,
                1 => tables::MODE_VR1,
                2 => tables::MODE_VR2,
                3 => tables::MODE_VR3,
                -1 => tables::MODE_VL1,
                -2 => tables::MODE_VL2,
                -3 => tables::MODE_VL3,
                _ => unreachable!(),
            };
            out.push_code(value, len);
            a0 = a1;
            a0_color = a0_color.flip();
            cur_idx += 1;
        } else {
            let a2 = cur_changes.get(cur_idx + 1).copied().unwrap_or(width) as i64;
            let (value, len) = tables::MODE_HORIZONTAL;
            out.push_code(value, len);
            let run1 = if a0 < 0 { a1 as u32 } else { (a1 - a0) as u32 };
            let run2 = (a2 - a1) as u32;
            tables::encode_run(a0_color, run1, &mut out);
            tables::encode_run(a0_color.flip(), run2, &mut out);
            a0 = a2;
            cur_idx += 2;
        }
    }
    out
}

/// Stateful page encoder: tracks the reference row, the 1D/2D interleave
/// counter, and emits EOL/RTC/EOFB framing plus minimum-row-bits padding.
pub struct Encoder {
    scheme: CodingScheme,
    width: usize,
    k: u32,
    rows_since_1d: u32,
    ref_runs: Vec<u32>,
    min_bits_per_row: usize,
    consecutive_eol_rows: u32,
}

impl Encoder {
    pub fn new(scheme: CodingScheme, width: usize, vertical_resolution_dpi: u16, min_bits_per_row: usize) -> Self {
        let k = k_factor_for_resolution(vertical_resolution_dpi);
        Self {
            scheme,
            width,
            k,
            rows_since_1d: 0,
            ref_runs: vec![width as u32],
            min_bits_per_row,
            consecutive_eol_rows: 0,
        }
    }

    /// Encode one packed MSB-first row; returns the bitstream for that
    /// row only (without page-level EOFB framing).
    pub fn encode_row(&mut self, row: &[u8]) -> Result<PackedBits, ImageCodingError> {
        if self.width == 0 || self.width > 4096 {
            return Err(ImageCodingError::InvalidWidth { width: self.width, max: 4096 });
        }
        let runs = row_runs(row, self.width);

        let mut body = PackedBits::new();
        match self.scheme {
            CodingScheme::T4_1D => {
                body.push(&encode_1d_runs(&runs));
            }
            CodingScheme::T4_2D => {
                let is_1d = self.rows_since_1d == 0;
                self.rows_since_1d = (self.rows_since_1d + 1) % self.k;
                body.push_bit(is_1d);
                let coded = if is_1d { encode_1d_runs(&runs) } else { encode_2d_runs(&runs, &self.ref_runs, self.width as u32) };
                body.push(&coded);
            }
            CodingScheme::T6 => {
                body.push(&encode_2d_runs(&runs, &self.ref_runs, self.width as u32));
            }
        };

        let bits = self.frame_row(body);
        self.ref_runs = runs;
        self.consecutive_eol_rows = 0;
        Ok(bits)
    }

    /// Prepend EOL (for T4 schemes; T.6 carries no EOLs) and insert fill
    /// bits between the EOL and the row body so a slow-to-decode line
    /// still meets the minimum scan-line time (§4.5).
    fn frame_row(&self, body: PackedBits) -> PackedBits {
        if self.scheme == CodingScheme::T6 {
            return body;
        }
        let (value, len) = tables::EOL;
        let mut out = PackedBits::new();
        out.push_code(value, len);
        let min_body_bits = self.min_bits_per_row.saturating_sub(len as usize);
        if body.bit_len() < min_body_bits {
            for _ in 0..(min_body_bits - body.bit_len()) {
                out.push_bit(false);
            }
        }
        out.push(&body);
        out
    }

    /// End-of-page framing: six EOLs for T.4, EOFB (two EOLs) for T.6, with
    /// the final byte padded with 1 bits by [`PackedBits::into_padded_bytes`].
    pub fn end_of_page(&self) -> PackedBits {
        let count = if self.scheme == CodingScheme::T6 { 2 } else { 6 };
        let mut out = PackedBits::new();
        let (value, len) = tables::EOL;
        for _ in 0..count {
            out.push_code(value, len);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_1d_runs_matches_table_lookup() {
        let bits = encode_1d_runs(&[4, 4, 8]);
        let mut expected = PackedBits::new();
        tables::encode_run(Color::White, 4, &mut expected);
        tables::encode_run(Color::Black, 4, &mut expected);
        tables::encode_run(Color::White, 8, &mut expected);
        assert_eq!(bits, expected);
    }

    #[test]
    fn all_white_row_encodes_as_single_v0_against_all_white_reference() {
        let width = 64u32;
        let cur = vec![width];
        let reference = vec![width];
        let bits = encode_2d_runs(&cur, &reference, width);
        let mut expected = PackedBits::new();
        let (value, len) = tables::MODE_V0;
        expected.push_code(value, len);
        assert_eq!(bits, expected);
    }

    #[test]
    fn end_of_page_uses_eofb_for_t6() {
        let enc = Encoder::new(CodingScheme::T6, 1728, 196, 0);
        assert_eq!(enc.end_of_page().bit_len(), tables::EOL.1 as usize * 2);
    }

    #[test]
    fn end_of_page_uses_six_eols_for_t4() {
        let enc = Encoder::new(CodingScheme::T4_1D, 1728, 98, 0);
        assert_eq!(enc.end_of_page().bit_len(), tables::EOL.1 as usize * 6);
    }

    #[test]
    fn t4_1d_row_starts_with_eol() {
        let mut enc = Encoder::new(CodingScheme::T4_1D, 16, 98, 0);
        let row = vec![0u8; 2];
        let bits = enc.encode_row(&row).unwrap();
        let (value, len) = tables::EOL;
        assert!(bits.starts_with_code(0, value, len));
    }

    #[test]
    fn padding_enforces_minimum_row_bits() {
        let mut enc = Encoder::new(CodingScheme::T4_1D, 16, 98, 40);
        let row = vec![0u8; 2];
        let bits = enc.encode_row(&row).unwrap();
        assert!(bits.bit_len() >= 40);
    }

    #[test]
    fn rejects_zero_width() {
        let mut enc = Encoder::new(CodingScheme::T4_1D, 0, 98, 0);
        assert!(enc.encode_row(&[0u8]).is_err());
    }
}
