//! Filename charset conversion for archive member names.
//!
//! Some extracting tools assume member names are stored in a legacy code
//! page rather than UTF-8. The `-t` option converts the logical, UTF-8 name
//! of every member into such a charset before it is written.
//!
//! Conversion is a capability chosen once at startup by [`select`]:
//!
//! - [`Passthrough`] when the target is UTF-8 (or the crate was built
//!   without the `charset` feature)
//! - [`EncodingTranscoder`] backed by `encoding_rs` otherwise
//!
//! # Examples
//!
//! ```
//! let (bytes, non_utf8) = zipdirs::charset::transcode("readme.txt", "utf-8").unwrap();
//! assert_eq!(bytes, b"readme.txt");
//! assert!(!non_utf8);
//! ```

use std::borrow::Cow;
use std::path::PathBuf;

/// Canonical label of the default charset.
pub const UTF8: &str = "utf-8";

/// Error type for charset operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// The requested charset is unknown or cannot be encoded to.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The name contains characters the target charset has no bytes for.
    #[error("cannot represent {name:?} in {charset}")]
    Unrepresentable { name: String, charset: &'static str },

    /// An on-disk name is not valid UTF-8 and has no logical archive path.
    #[error("{} is not a valid UTF-8 path", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Converts logical member names into the bytes stored in the archive.
pub trait Transcoder: Send + Sync {
    /// Name of the target charset.
    fn charset(&self) -> &'static str;

    /// Converts `name` into the target charset.
    ///
    /// Returns the stored bytes and whether they are something other than
    /// UTF-8. The bytes must not be re-read as text; use the original name
    /// for anything printed.
    fn transcode<'a>(&self, name: &'a str) -> Result<(Cow<'a, [u8]>, bool), EncodingError>;

    /// True when names are stored unchanged.
    fn is_identity(&self) -> bool {
        false
    }
}

/// Identity conversion: names are stored as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Transcoder for Passthrough {
    fn charset(&self) -> &'static str {
        UTF8
    }

    fn transcode<'a>(&self, name: &'a str) -> Result<(Cow<'a, [u8]>, bool), EncodingError> {
        Ok((Cow::Borrowed(name.as_bytes()), false))
    }

    fn is_identity(&self) -> bool {
        true
    }
}

/// Conversion into a legacy charset via `encoding_rs`.
#[cfg(feature = "charset")]
#[derive(Debug, Clone, Copy)]
pub struct EncodingTranscoder {
    encoding: &'static encoding_rs::Encoding,
}

#[cfg(feature = "charset")]
impl EncodingTranscoder {
    /// Looks up `label` (e.g. `"shift_jis"`, `"cp1252"`, `"euc-kr"`).
    pub fn new(label: &str) -> Result<Self, EncodingError> {
        let encoding = encoding_rs::Encoding::for_label(normalize_label(label).as_bytes())
            .ok_or_else(|| EncodingError::UnsupportedEncoding(label.to_string()))?;

        // UTF-16 and the replacement encoding have no encoder of their own.
        if encoding.output_encoding() != encoding {
            return Err(EncodingError::UnsupportedEncoding(label.to_string()));
        }

        Ok(Self { encoding })
    }
}

#[cfg(feature = "charset")]
impl Transcoder for EncodingTranscoder {
    fn charset(&self) -> &'static str {
        self.encoding.name()
    }

    fn transcode<'a>(&self, name: &'a str) -> Result<(Cow<'a, [u8]>, bool), EncodingError> {
        let (encoded, _, had_errors) = self.encoding.encode(name);
        if had_errors {
            return Err(EncodingError::Unrepresentable {
                name: name.to_string(),
                charset: self.encoding.name(),
            });
        }
        Ok((encoded, true))
    }
}

/// Picks the transcoder for `charset`.
pub fn select(charset: &str) -> Result<Box<dyn Transcoder>, EncodingError> {
    if is_utf8_label(charset) {
        return Ok(Box::new(Passthrough));
    }

    #[cfg(feature = "charset")]
    {
        Ok(Box::new(EncodingTranscoder::new(charset)?))
    }

    #[cfg(not(feature = "charset"))]
    {
        Err(EncodingError::UnsupportedEncoding(format!(
            "{charset} (built without charset support)"
        )))
    }
}

/// One-shot conversion of `name` into `target_charset`.
pub fn transcode(name: &str, target_charset: &str) -> Result<(Vec<u8>, bool), EncodingError> {
    let transcoder = select(target_charset)?;
    let (bytes, non_utf8) = transcoder.transcode(name)?;
    Ok((bytes.into_owned(), non_utf8))
}

/// Whether `label` names UTF-8.
pub fn is_utf8_label(label: &str) -> bool {
    let normalized = normalize_label(label);
    if matches!(normalized.as_str(), "utf-8" | "utf8") {
        return true;
    }

    #[cfg(feature = "charset")]
    {
        encoding_rs::Encoding::for_label(normalized.as_bytes()) == Some(encoding_rs::UTF_8)
    }

    #[cfg(not(feature = "charset"))]
    {
        false
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}
