//! Source encoding detection
//!
//! Feeds arrive as UTF-8, ISO-8859-1 or Windows-1252. Candidates are tried in
//! that order against the first lines of the file.

use encoding_rs::WINDOWS_1252;

use crate::models::SourceEncoding;

/// Lines inspected when choosing an encoding
pub const DEFAULT_SAMPLE_LINES: usize = 200;

/// Bytes at the start of a UTF-8 file written with a byte order mark
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Choose the encoding for `data` by looking at its first `sample_lines` lines
pub fn detect(data: &[u8], sample_lines: usize) -> SourceEncoding {
    let sample = sample(data, sample_lines);

    if std::str::from_utf8(sample).is_ok() {
        return SourceEncoding::Utf8;
    }

    // C1 control bytes are printable characters in Windows-1252 and never
    // appear in real ISO-8859-1 text.
    if !sample.iter().any(|b| (0x80..=0x9F).contains(b)) {
        return SourceEncoding::Latin1;
    }

    SourceEncoding::Windows1252
}

/// Decode the whole of `data` with `encoding`
pub fn decode(data: &[u8], encoding: SourceEncoding) -> String {
    match encoding {
        SourceEncoding::Utf8 => {
            let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
            String::from_utf8_lossy(data).into_owned()
        },
        SourceEncoding::Latin1 => data.iter().map(|&b| b as char).collect(),
        SourceEncoding::Windows1252 => {
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(data);
            text.into_owned()
        },
    }
}

/// Detect and decode in one step
pub fn decode_detected(data: &[u8], sample_lines: usize) -> (String, SourceEncoding) {
    let encoding = detect(data, sample_lines);
    (decode(data, encoding), encoding)
}

fn sample(data: &[u8], lines: usize) -> &[u8] {
    let end = data
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'\n')
        .nth(lines.saturating_sub(1))
        .map(|(i, _)| i + 1)
        .unwrap_or(data.len());
    &data[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_utf8() {
        let data = "P;feed;Spielwürfel\n".as_bytes();
        assert_eq!(detect(data, DEFAULT_SAMPLE_LINES), SourceEncoding::Utf8);
        assert_eq!(decode(data, SourceEncoding::Utf8), "P;feed;Spielwürfel\n");
    }

    #[test]
    fn test_strips_utf8_bom() {
        let data = b"\xEF\xBB\xBFH;feed\n";
        let (text, encoding) = decode_detected(data, DEFAULT_SAMPLE_LINES);
        assert_eq!(encoding, SourceEncoding::Utf8);
        assert_eq!(text, "H;feed\n");
    }

    #[test]
    fn test_detects_latin1() {
        // "Spielwürfel" with ü as 0xFC
        let data = b"P;feed;Spielw\xFCrfel\n";
        let (text, encoding) = decode_detected(data, DEFAULT_SAMPLE_LINES);
        assert_eq!(encoding, SourceEncoding::Latin1);
        assert_eq!(text, "P;feed;Spielwürfel\n");
    }

    #[test]
    fn test_detects_windows_1252() {
        // 0x80 is the euro sign in Windows-1252
        let data = b"P;feed;Preis 5 \x80\n";
        let (text, encoding) = decode_detected(data, DEFAULT_SAMPLE_LINES);
        assert_eq!(encoding, SourceEncoding::Windows1252);
        assert_eq!(text, "P;feed;Preis 5 €\n");
    }

    #[test]
    fn test_only_sample_is_inspected() {
        let mut data = b"H;feed\nP;feed;ok\n".to_vec();
        data.extend_from_slice(b"P;feed;Spielw\xFCrfel\n");
        assert_eq!(detect(&data, 2), SourceEncoding::Utf8);
        assert_eq!(detect(&data, 3), SourceEncoding::Latin1);
    }
}
