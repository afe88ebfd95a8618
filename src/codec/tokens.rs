//! Per-document token stream encodings.
//!
//! Each document picks the cheapest of two codecs: a single i32 when every
//! position holds the same term id, or one value per token at the smallest
//! signed width that holds the document's maximum term id.

use crate::codec::format::{CodecInput, CodecOutput};
use crate::error::{EngineError, Result};
use crate::forward::NO_TERM;

/// Codec tag stored in the tokens-index entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokensCodec {
    AllTokensTheSame,
    ValuePerToken,
}

impl TokensCodec {
    pub fn code(self) -> u8 {
        match self {
            TokensCodec::AllTokensTheSame => 0,
            TokensCodec::ValuePerToken => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TokensCodec::AllTokensTheSame),
            1 => Some(TokensCodec::ValuePerToken),
            _ => None,
        }
    }
}

/// Width parameter for [`TokensCodec::ValuePerToken`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenWidth {
    Byte,
    Short,
    ThreeBytes,
    Int,
}

impl TokenWidth {
    pub fn code(self) -> u8 {
        match self {
            TokenWidth::Byte => 1,
            TokenWidth::Short => 2,
            TokenWidth::ThreeBytes => 3,
            TokenWidth::Int => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(TokenWidth::Byte),
            2 => Some(TokenWidth::Short),
            3 => Some(TokenWidth::ThreeBytes),
            4 => Some(TokenWidth::Int),
            _ => None,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            TokenWidth::Byte => 1,
            TokenWidth::Short => 2,
            TokenWidth::ThreeBytes => 3,
            TokenWidth::Int => 4,
        }
    }

    /// Smallest width whose signed range holds `max`. `NO_TERM` fits every
    /// width through sign extension.
    pub fn for_max(max: i32) -> Self {
        if max <= i8::MAX as i32 {
            TokenWidth::Byte
        } else if max <= i16::MAX as i32 {
            TokenWidth::Short
        } else if max <= 0x00ff_ffff {
            TokenWidth::ThreeBytes
        } else {
            TokenWidth::Int
        }
    }
}

/// Pick the codec and parameter byte for one document's tokens.
pub fn choose(tokens: &[i32]) -> (TokensCodec, u8) {
    let mut max = 0;
    let mut all_the_same = !tokens.is_empty();
    let mut last: Option<i32> = None;
    for &token in tokens {
        max = max.max(token);
        if let Some(prev) = last {
            all_the_same = all_the_same && prev == token;
        }
        last = Some(token);
        if max > i16::MAX as i32 && !all_the_same {
            break; // already at worst case
        }
    }
    if all_the_same {
        (TokensCodec::AllTokensTheSame, 0)
    } else {
        (TokensCodec::ValuePerToken, TokenWidth::for_max(max).code())
    }
}

/// Write one document's payload. A zero-length document writes nothing.
pub fn write_payload(
    out: &mut CodecOutput,
    tokens: &[i32],
    codec: TokensCodec,
    param: u8,
) -> Result<()> {
    if tokens.is_empty() {
        return Ok(());
    }
    match codec {
        TokensCodec::AllTokensTheSame => out.write_i32(tokens[0]),
        TokensCodec::ValuePerToken => {
            let width = TokenWidth::from_code(param)
                .ok_or_else(|| EngineError::format("<tokens>", "unknown token width"))?;
            match width {
                TokenWidth::Byte => {
                    for &token in tokens {
                        out.write_u8(token as u8)?;
                    }
                }
                TokenWidth::Short => {
                    for &token in tokens {
                        out.write_bytes(&(token as i16).to_be_bytes())?;
                    }
                }
                TokenWidth::ThreeBytes => {
                    for &token in tokens {
                        out.write_u8((token >> 16) as u8)?;
                        out.write_u8((token >> 8) as u8)?;
                        out.write_u8(token as u8)?;
                    }
                }
                TokenWidth::Int => {
                    for &token in tokens {
                        out.write_i32(token)?;
                    }
                }
            }
            Ok(())
        }
    }
}

/// Decode positions `[start, end)` of a document into `out`.
///
/// `input` must be positioned at the document's payload offset. Values
/// sign-extend, so `NO_TERM` round-trips through every width.
pub fn read_payload(
    input: &mut CodecInput,
    codec_tag: u8,
    param: u8,
    start: usize,
    end: usize,
    out: &mut Vec<i32>,
) -> Result<()> {
    let codec = TokensCodec::from_code(codec_tag)
        .ok_or_else(|| EngineError::format(input.file_name(), "unknown tokens codec tag"))?;
    match codec {
        TokensCodec::AllTokensTheSame => {
            let value = input.read_i32()?;
            out.extend(std::iter::repeat(value).take(end - start));
        }
        TokensCodec::ValuePerToken => {
            let width = TokenWidth::from_code(param).ok_or_else(|| {
                EngineError::format(input.file_name(), "unknown tokens codec parameter")
            })?;
            let base = input.file_pointer() as u64;
            input.seek(base + (start * width.bytes()) as u64)?;
            for _ in start..end {
                let value = match width {
                    TokenWidth::Byte => input.read_u8()? as i8 as i32,
                    TokenWidth::Short => {
                        let mut buf = [0u8; 2];
                        input.read_bytes(&mut buf)?;
                        i16::from_be_bytes(buf) as i32
                    }
                    TokenWidth::ThreeBytes => {
                        let mut buf = [0u8; 3];
                        input.read_bytes(&mut buf)?;
                        let raw = (i32::from(buf[0]) << 16)
                            | (i32::from(buf[1]) << 8)
                            | i32::from(buf[2]);
                        // sign-extend from bit 23
                        (raw << 8) >> 8
                    }
                    TokenWidth::Int => input.read_i32()?,
                };
                out.push(value);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_all_the_same() {
        assert_eq!(choose(&[7; 1000]).0, TokensCodec::AllTokensTheSame);
        assert_eq!(choose(&[NO_TERM, NO_TERM]).0, TokensCodec::AllTokensTheSame);
    }

    #[test]
    fn test_choose_empty_doc_is_not_all_the_same() {
        let (codec, param) = choose(&[]);
        assert_eq!(codec, TokensCodec::ValuePerToken);
        assert_eq!(param, TokenWidth::Byte.code());
    }

    #[test]
    fn test_choose_widths() {
        assert_eq!(choose(&[3, 1, 3, 2]), (TokensCodec::ValuePerToken, 1));
        assert_eq!(choose(&[1, 300]), (TokensCodec::ValuePerToken, 2));
        assert_eq!(choose(&[1, 40_000]), (TokensCodec::ValuePerToken, 3));
        assert_eq!(choose(&[1, 0x0100_0000]), (TokensCodec::ValuePerToken, 4));
    }

    #[test]
    fn test_choose_no_term_mixed() {
        // A leading gap must not masquerade as an all-the-same doc.
        let (codec, param) = choose(&[NO_TERM, 5]);
        assert_eq!(codec, TokensCodec::ValuePerToken);
        assert_eq!(param, TokenWidth::Byte.code());
    }

    #[test]
    fn test_width_for_max() {
        assert_eq!(TokenWidth::for_max(127), TokenWidth::Byte);
        assert_eq!(TokenWidth::for_max(128), TokenWidth::Short);
        assert_eq!(TokenWidth::for_max(32768), TokenWidth::ThreeBytes);
        assert_eq!(TokenWidth::for_max(0x0100_0000), TokenWidth::Int);
    }

    #[test]
    fn test_payload_roundtrip_every_width() {
        use crate::codec::format::{Directory, SegmentInfo};

        let tmp = tempfile::tempdir().unwrap();
        let dir = Directory::open(tmp.path()).unwrap();
        let segment = SegmentInfo::new("_0", "TestDelegate");

        let cases: Vec<(TokenWidth, Vec<i32>)> = vec![
            (TokenWidth::Byte, vec![0, 127, NO_TERM, 5]),
            (TokenWidth::Short, vec![128, 32767, NO_TERM, 0]),
            (TokenWidth::ThreeBytes, vec![32768, 0x00ff_ffff, NO_TERM, 1]),
            (TokenWidth::Int, vec![0x0100_0000, i32::MAX, NO_TERM, 2]),
        ];
        for (width, tokens) in cases {
            let file = format!("_0.w{}", width.code());
            let mut out = dir.create_output(&file, &segment).unwrap();
            write_payload(&mut out, &tokens, TokensCodec::ValuePerToken, width.code()).unwrap();
            out.finish().unwrap();

            let mut input = dir.open_input(&file, &segment).unwrap();
            let mut decoded = Vec::new();
            read_payload(
                &mut input,
                TokensCodec::ValuePerToken.code(),
                width.code(),
                0,
                tokens.len(),
                &mut decoded,
            )
            .unwrap();
            assert_eq!(decoded, tokens, "width {width:?}");
        }
    }

    #[test]
    fn test_unknown_codec_tag_is_rejected() {
        use crate::codec::format::{Directory, SegmentInfo};

        let tmp = tempfile::tempdir().unwrap();
        let dir = Directory::open(tmp.path()).unwrap();
        let segment = SegmentInfo::new("_0", "TestDelegate");
        let out = dir.create_output("_0.bad", &segment).unwrap();
        out.finish().unwrap();

        let mut input = dir.open_input("_0.bad", &segment).unwrap();
        let mut decoded = Vec::new();
        let err = read_payload(&mut input, 99, 1, 0, 1, &mut decoded).unwrap_err();
        assert!(err.is_segment_fatal());
    }
}
