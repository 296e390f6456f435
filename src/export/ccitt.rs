//! CCITT fax encoders for bilevel TIFF strips
//!
//! Input rows are packed bits, MSB first, `1` = black, each row padded to a
//! whole byte. The three schemes differ in framing:
//!
//! | scheme | TIFF code | rows |
//! |---|---|---|
//! | Modified Huffman | 2 | 1-D, byte aligned, no EOL |
//! | T.4 | 3 | EOL then 1-D (`T4Options` = 0) |
//! | T.6 | 4 | 2-D against the previous row, EOFB at the end |

/// `(code, bit length)`
type Code = (u16, u8);

const WHITE_TERMINATING: [Code; 64] = [
    (0b00110101, 8), (0b000111, 6), (0b0111, 4), (0b1000, 4),
    (0b1011, 4), (0b1100, 4), (0b1110, 4), (0b1111, 4),
    (0b10011, 5), (0b10100, 5), (0b00111, 5), (0b01000, 5),
    (0b001000, 6), (0b000011, 6), (0b110100, 6), (0b110101, 6),
    (0b101010, 6), (0b101011, 6), (0b0100111, 7), (0b0001100, 7),
    (0b0001000, 7), (0b0010111, 7), (0b0000011, 7), (0b0000100, 7),
    (0b0101000, 7), (0b0101011, 7), (0b0010011, 7), (0b0100100, 7),
    (0b0011000, 7), (0b00000010, 8), (0b00000011, 8), (0b00011010, 8),
    (0b00011011, 8), (0b00010010, 8), (0b00010011, 8), (0b00010100, 8),
    (0b00010101, 8), (0b00010110, 8), (0b00010111, 8), (0b00101000, 8),
    (0b00101001, 8), (0b00101010, 8), (0b00101011, 8), (0b00101100, 8),
    (0b00101101, 8), (0b00000100, 8), (0b00000101, 8), (0b00001010, 8),
    (0b00001011, 8), (0b01010010, 8), (0b01010011, 8), (0b01010100, 8),
    (0b01010101, 8), (0b00100100, 8), (0b00100101, 8), (0b01011000, 8),
    (0b01011001, 8), (0b01011010, 8), (0b01011011, 8), (0b01001010, 8),
    (0b01001011, 8), (0b00110010, 8), (0b00110011, 8), (0b00110100, 8),
];

const BLACK_TERMINATING: [Code; 64] = [
    (0b0000110111, 10), (0b010, 3), (0b11, 2), (0b10, 2),
    (0b011, 3), (0b0011, 4), (0b0010, 4), (0b00011, 5),
    (0b000101, 6), (0b000100, 6), (0b0000100, 7), (0b0000101, 7),
    (0b0000111, 7), (0b00000100, 8), (0b00000111, 8), (0b000011000, 9),
    (0b0000010111, 10), (0b0000011000, 10), (0b0000001000, 10), (0b00001100111, 11),
    (0b00001101000, 11), (0b00001101100, 11), (0b00000110111, 11), (0b00000101000, 11),
    (0b00000010111, 11), (0b00000011000, 11), (0b000011001010, 12), (0b000011001011, 12),
    (0b000011001100, 12), (0b000011001101, 12), (0b000001101000, 12), (0b000001101001, 12),
    (0b000001101010, 12), (0b000001101011, 12), (0b000011010010, 12), (0b000011010011, 12),
    (0b000011010100, 12), (0b000011010101, 12), (0b000011010110, 12), (0b000011010111, 12),
    (0b000001101100, 12), (0b000001101101, 12), (0b000011011010, 12), (0b000011011011, 12),
    (0b000001010100, 12), (0b000001010101, 12), (0b000001010110, 12), (0b000001010111, 12),
    (0b000001100100, 12), (0b000001100101, 12), (0b000001010010, 12), (0b000001010011, 12),
    (0b000000100100, 12), (0b000000110111, 12), (0b000000111000, 12), (0b000000100111, 12),
    (0b000000101000, 12), (0b000001011000, 12), (0b000001011001, 12), (0b000000101011, 12),
    (0b000000101100, 12), (0b000001011010, 12), (0b000001100110, 12), (0b000001100111, 12),
];

/// Makeup codes for 64..=1728, step 64
const WHITE_MAKEUP: [Code; 27] = [
    (0b11011, 5), (0b10010, 5), (0b010111, 6), (0b0110111, 7),
    (0b00110110, 8), (0b00110111, 8), (0b01100100, 8), (0b01100101, 8),
    (0b01101000, 8), (0b01100111, 8), (0b011001100, 9), (0b011001101, 9),
    (0b011010010, 9), (0b011010011, 9), (0b011010100, 9), (0b011010101, 9),
    (0b011010110, 9), (0b011010111, 9), (0b011011000, 9), (0b011011001, 9),
    (0b011011010, 9), (0b011011011, 9), (0b010011000, 9), (0b010011001, 9),
    (0b010011010, 9), (0b011000, 6), (0b010011011, 9),
];

const BLACK_MAKEUP: [Code; 27] = [
    (0b0000001111, 10), (0b000011001000, 12), (0b000011001001, 12), (0b000001011011, 12),
    (0b000000110011, 12), (0b000000110100, 12), (0b000000110101, 12), (0b0000001101100, 13),
    (0b0000001101101, 13), (0b0000001001010, 13), (0b0000001001011, 13), (0b0000001001100, 13),
    (0b0000001001101, 13), (0b0000001110010, 13), (0b0000001110011, 13), (0b0000001110100, 13),
    (0b0000001110101, 13), (0b0000001110110, 13), (0b0000001110111, 13), (0b0000001010010, 13),
    (0b0000001010011, 13), (0b0000001010100, 13), (0b0000001010101, 13), (0b0000001011010, 13),
    (0b0000001011011, 13), (0b0000001100100, 13), (0b0000001100101, 13),
];

/// Shared makeup codes for 1792..=2560, step 64
const EXTENDED_MAKEUP: [Code; 13] = [
    (0b00000001000, 11), (0b00000001100, 11), (0b00000001101, 11), (0b000000010010, 12),
    (0b000000010011, 12), (0b000000010100, 12), (0b000000010101, 12), (0b000000010110, 12),
    (0b000000010111, 12), (0b000000011100, 12), (0b000000011101, 12), (0b000000011110, 12),
    (0b000000011111, 12),
];

const EOL: Code = (0b000000000001, 12);
const PASS: Code = (0b0001, 4);
const HORIZONTAL: Code = (0b001, 3);
/// Vertical modes indexed by `b1 - a1 + 3` (VR3 ..= VL3)
const VERTICAL: [Code; 7] = [
    (0b0000011, 7),
    (0b000011, 6),
    (0b011, 3),
    (0b1, 1),
    (0b010, 3),
    (0b000010, 6),
    (0b0000010, 7),
];

const MAX_MAKEUP: u32 = 2560;

/// MSB-first bit accumulator
#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    fn put(&mut self, (code, len): Code) {
        for i in (0..len).rev() {
            self.acc = (self.acc << 1) | ((code >> i) & 1) as u32;
            self.bits += 1;
            if self.bits == 8 {
                self.out.push(self.acc as u8);
                self.acc = 0;
                self.bits = 0;
            }
        }
    }

    /// Pad with zero bits to the next byte boundary
    fn align(&mut self) {
        if self.bits > 0 {
            self.out.push((self.acc << (8 - self.bits)) as u8);
            self.acc = 0;
            self.bits = 0;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.align();
        self.out
    }

    /// One run length, split into makeup and terminating codes
    fn put_span(&mut self, mut run: u32, black: bool) {
        let (terminating, makeup) = if black {
            (&BLACK_TERMINATING, &BLACK_MAKEUP)
        } else {
            (&WHITE_TERMINATING, &WHITE_MAKEUP)
        };

        while run > MAX_MAKEUP {
            self.put(EXTENDED_MAKEUP[EXTENDED_MAKEUP.len() - 1]);
            run -= MAX_MAKEUP;
        }
        if run >= 64 {
            let index = (run / 64) as usize;
            if index <= makeup.len() {
                self.put(makeup[index - 1]);
            } else {
                self.put(EXTENDED_MAKEUP[index - makeup.len() - 1]);
            }
            run %= 64;
        }
        self.put(terminating[run as usize]);
    }
}

/// One packed row
struct Row<'a> {
    bits: &'a [u8],
    width: u32,
}

impl Row<'_> {
    /// Black at `x`; past the end reads as white
    fn pixel(&self, x: u32) -> bool {
        if x >= self.width {
            return false;
        }
        (self.bits[(x >> 3) as usize] >> (7 - (x & 7))) & 1 == 1
    }

    /// First position at or after `start` whose color differs from `color`
    fn find_diff(&self, start: u32, color: bool) -> u32 {
        let mut x = start;
        while x < self.width && self.pixel(x) == color {
            x += 1;
        }
        x
    }

    fn find_diff_bounded(&self, start: u32, color: bool) -> u32 {
        if start < self.width {
            self.find_diff(start, color)
        } else {
            self.width
        }
    }
}

fn rows(data: &[u8], width: u32, height: u32) -> impl Iterator<Item = Row<'_>> {
    let row_bytes = (width as usize).div_ceil(8);
    (0..height as usize).map(move |y| Row {
        bits: &data[y * row_bytes..(y + 1) * row_bytes],
        width,
    })
}

fn encode_1d(writer: &mut BitWriter, row: &Row<'_>) {
    let mut start = 0;
    loop {
        let end = row.find_diff(start, false);
        writer.put_span(end - start, false);
        start = end;
        if start >= row.width {
            break;
        }
        let end = row.find_diff(start, true);
        writer.put_span(end - start, true);
        start = end;
        if start >= row.width {
            break;
        }
    }
}

fn encode_2d(writer: &mut BitWriter, reference: &Row<'_>, coding: &Row<'_>) {
    let width = coding.width;
    let mut a0 = 0;
    let mut a1 = if coding.pixel(0) { 0 } else { coding.find_diff(0, false) };
    let mut b1 = if reference.pixel(0) { 0 } else { reference.find_diff(0, false) };

    loop {
        let b2 = reference.find_diff_bounded(b1, reference.pixel(b1));
        if b2 >= a1 {
            let d = b1 as i64 - a1 as i64;
            if (-3..=3).contains(&d) {
                writer.put(VERTICAL[(d + 3) as usize]);
                a0 = a1;
            } else {
                let a2 = coding.find_diff_bounded(a1, coding.pixel(a1));
                writer.put(HORIZONTAL);
                let white_first = a0 + a1 == 0 || !coding.pixel(a0);
                writer.put_span(a1 - a0, !white_first);
                writer.put_span(a2 - a1, white_first);
                a0 = a2;
            }
        } else {
            writer.put(PASS);
            a0 = b2;
        }

        if a0 >= width {
            break;
        }
        let color = coding.pixel(a0);
        a1 = coding.find_diff(a0, color);
        b1 = reference.find_diff(a0, !color);
        b1 = reference.find_diff(b1, color);
    }
}

/// Modified Huffman (TIFF compression 2)
pub fn encode_mh(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut writer = BitWriter::default();
    for row in rows(data, width, height) {
        encode_1d(&mut writer, &row);
        writer.align();
    }
    writer.finish()
}

/// T.4 one-dimensional with an EOL before every row (TIFF compression 3)
pub fn encode_t4(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut writer = BitWriter::default();
    for row in rows(data, width, height) {
        writer.put(EOL);
        encode_1d(&mut writer, &row);
    }
    writer.finish()
}

/// T.6 two-dimensional (TIFF compression 4)
pub fn encode_t6(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let white = vec![0u8; (width as usize).div_ceil(8)];
    let mut writer = BitWriter::default();
    let mut reference = Row { bits: &white, width };
    for row in rows(data, width, height) {
        encode_2d(&mut writer, &reference, &row);
        reference = row;
    }
    writer.put(EOL);
    writer.put(EOL);
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tables_are_prefix_sized() {
        for (code, len) in WHITE_TERMINATING
            .iter()
            .chain(&BLACK_TERMINATING)
            .chain(&WHITE_MAKEUP)
            .chain(&BLACK_MAKEUP)
            .chain(&EXTENDED_MAKEUP)
        {
            assert!((*code as u32) < (1u32 << len));
        }
    }

    #[test]
    fn test_mh_white_row() {
        assert_eq!(encode_mh(&[0x00], 8, 1), vec![0x98]);
    }

    #[test]
    fn test_mh_uses_makeup_codes() {
        // White 100 = makeup 64 (11011) + terminating 36 (00010101)
        let row = vec![0u8; 13];
        assert_eq!(encode_mh(&row, 100, 1), vec![0xD8, 0xA8]);
    }

    #[test]
    fn test_mh_black_first_row_starts_with_empty_white() {
        // White 0 (00110101), black 8 (000101)
        assert_eq!(encode_mh(&[0xFF], 8, 1), vec![0x35, 0x14]);
    }

    #[test]
    fn test_t4_prefixes_eol() {
        // EOL + white 8 = 000000000001 10011, padded
        assert_eq!(encode_t4(&[0x00], 8, 1), vec![0x00, 0x19, 0x80]);
    }

    #[test]
    fn test_t6_white_row() {
        // V0, then EOFB
        assert_eq!(encode_t6(&[0x00], 8, 1), vec![0x80, 0x08, 0x00, 0x80]);
    }

    #[test]
    fn test_t6_repeated_row_is_vertical() {
        // Row 0: horizontal (001) white 4 (1011) black 4 (011); row 1: V0 V0
        let data = [0x0F, 0x0F];
        assert_eq!(encode_t6(&data, 8, 2), vec![0x36, 0xF0, 0x01, 0x00, 0x10]);
    }

    /// Packed rows mixing short runs, an all-white row, an all-black row
    /// and a black run touching the right edge
    fn pattern(width: u32, height: u32) -> Vec<u8> {
        let row_bytes = (width as usize).div_ceil(8);
        let mut data = vec![0u8; row_bytes * height as usize];
        for y in 0..height {
            for x in 0..width {
                let black = match y % 5 {
                    0 => false,
                    1 => true,
                    2 => (x / 3 + y) % 2 == 1,
                    3 => x * 7 % 11 < 4 || x + 2 >= width,
                    _ => (x + y) % 97 < 70,
                };
                if black {
                    data[y as usize * row_bytes + (x >> 3) as usize] |= 0x80 >> (x & 7);
                }
            }
        }
        data
    }

    /// Color change positions per row, starting from white
    fn transitions(data: &[u8], width: u32, height: u32) -> Vec<Vec<u16>> {
        rows(data, width, height)
            .map(|row| {
                let mut color = false;
                (0..width)
                    .filter(|x| {
                        let changed = row.pixel(*x) != color;
                        color ^= changed;
                        changed
                    })
                    .map(|x| x as u16)
                    .collect()
            })
            .collect()
    }

    /// The decoder may report the line end itself as a change
    fn trim_line_end(line: &[u16], width: u32) -> Vec<u16> {
        let mut line = line.to_vec();
        while line.last().is_some_and(|x| u32::from(*x) >= width) {
            line.pop();
        }
        line
    }

    const SIZES: [(u32, u32); 4] = [(37, 9), (200, 50), (64, 32), (2700, 5)];

    #[test]
    fn test_t6_decodes_to_source_rows() {
        for (width, height) in SIZES {
            let data = pattern(width, height);
            let encoded = encode_t6(&data, width, height);

            let mut lines = Vec::new();
            fax::decoder::decode_g4(encoded.iter().copied(), width as u16, Some(height as u16), |t| {
                lines.push(trim_line_end(t, width))
            })
            .unwrap();
            assert_eq!(lines, transitions(&data, width, height), "{width}x{height}");
        }
    }

    #[test]
    fn test_t4_decodes_to_source_rows() {
        for (width, height) in SIZES {
            let data = pattern(width, height);
            let encoded = encode_t4(&data, width, height);

            let mut lines = Vec::new();
            fax::decoder::decode_g3(encoded.iter().copied(), |t| lines.push(trim_line_end(t, width)));
            // Without a trailing RTC the final row is not surfaced
            assert!(lines.len() + 1 >= height as usize, "{width}x{height}: {} rows", lines.len());

            let expected = transitions(&data, width, height);
            for (y, line) in lines.iter().enumerate() {
                assert_eq!(line, &expected[y], "{width}x{height} row {y}");
            }
        }
    }

    #[test]
    fn test_mh_decodes_to_source_rows() {
        for (width, height) in SIZES {
            let data = pattern(width, height);
            let row_bytes = (width as usize).div_ceil(8);

            // MH rows are byte aligned, so the strip splits per row; framing
            // each row with fill + EOL (0x00 0x01) makes it a G3 stream
            let mut framed = Vec::new();
            let mut joined = Vec::new();
            for row in data.chunks(row_bytes) {
                let coded = encode_mh(row, width, 1);
                framed.extend_from_slice(&[0x00, 0x01]);
                framed.extend_from_slice(&coded);
                joined.extend_from_slice(&coded);
            }
            framed.extend_from_slice(&[0x00, 0x01]);
            assert_eq!(joined, encode_mh(&data, width, height));

            let mut lines = Vec::new();
            fax::decoder::decode_g3(framed.iter().copied(), |t| lines.push(trim_line_end(t, width)));
            assert_eq!(lines, transitions(&data, width, height), "{width}x{height}");
        }
    }

    #[test]
    fn test_long_runs_use_extended_makeup() {
        let width = 3000;
        let row = vec![0u8; (width as usize).div_ceil(8)];
        let mut writer = BitWriter::default();
        encode_1d(&mut writer, &Row { bits: &row, width });
        let bytes = writer.finish();
        // 2560 (12 bits) + 384 (8 bits) + 56 (8 bits) = 28 bits
        assert_eq!(bytes.len(), 4);
        assert_eq!(bytes[0], 0b00000001);
    }
}
