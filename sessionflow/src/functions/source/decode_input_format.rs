use std::fmt::{Debug, Formatter};

use crate::api::element::Element;
use crate::api::error::DecodeError;
use crate::api::function::{Context, InputFormat, NamedFunction};

/// Wraps an iterator of raw payloads (message bodies, file lines) and a decoder.
///
/// A payload the decoder rejects surfaces as `Err(DecodeError)`; the stream keeps going.
pub fn decode_source<R, I, F, K, V>(payloads: I, decoder: F) -> DecodeInputFormat<I, F>
where
    I: Iterator<Item = R>,
    F: FnMut(R) -> Result<Element<K, V>, DecodeError>,
{
    DecodeInputFormat::new(payloads, decoder)
}

pub struct DecodeInputFormat<I, F> {
    payloads: I,
    decoder: F,
    decoded: u64,
    failed: u64,
}

impl<I, F> DecodeInputFormat<I, F> {
    pub fn new(payloads: I, decoder: F) -> Self {
        DecodeInputFormat {
            payloads,
            decoder,
            decoded: 0,
            failed: 0,
        }
    }
}

impl<R, I, F, K, V> InputFormat<K, V> for DecodeInputFormat<I, F>
where
    I: Iterator<Item = R>,
    F: FnMut(R) -> Result<Element<K, V>, DecodeError>,
{
    fn open(&mut self, _context: &Context) -> crate::api::Result<()> {
        Ok(())
    }

    fn next_element(&mut self) -> Option<Result<Element<K, V>, DecodeError>> {
        let payload = self.payloads.next()?;
        let element = (self.decoder)(payload);
        match &element {
            Ok(_) => self.decoded += 1,
            Err(_) => self.failed += 1,
        }
        Some(element)
    }

    fn close(&mut self) -> crate::api::Result<()> {
        info!(
            "decode source closed, decoded={}, failed={}",
            self.decoded, self.failed
        );
        Ok(())
    }
}

impl<I, F> NamedFunction for DecodeInputFormat<I, F> {
    fn name(&self) -> &str {
        "DecodeInputFormat"
    }
}

impl<I, F> Debug for DecodeInputFormat<I, F> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeInputFormat")
            .field("decoded", &self.decoded)
            .field("failed", &self.failed)
            .finish()
    }
}
