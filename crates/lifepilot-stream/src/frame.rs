// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-delimited frame decoder for the streaming chat response.
//!
//! The response body is a sequence of `\n`-terminated records. Records of the
//! form `data: <json>` carry a frame; `data: [DONE]` ends the stream. Chunks
//! may split records (and UTF-8 sequences) anywhere, so the decoder buffers
//! raw bytes and only decodes complete records.

use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};
use lifepilot_core::PilotError;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Prefix marking a record that carries a frame.
pub const DATA_PREFIX: &str = "data:";

/// Payload that terminates the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Longest record the decoder buffers before dropping it.
pub const MAX_RECORD_LEN: usize = 1024 * 1024;

/// Outcome of decoding one complete record.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    /// A well-formed frame.
    Frame(T),
    /// Blank line, non-data field, or malformed payload.
    Skip,
    /// The end-of-stream sentinel.
    End,
}

/// Decodes a single record (without its trailing newline).
pub fn decode_record<T: DeserializeOwned>(record: &[u8]) -> Decoded<T> {
    let Ok(line) = std::str::from_utf8(record) else {
        debug!(len = record.len(), "skipping non-UTF-8 record");
        return Decoded::Skip;
    };
    let line = line.strip_suffix('\r').unwrap_or(line);

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Decoded::Skip;
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return Decoded::End;
    }

    match serde_json::from_str(payload) {
        Ok(frame) => Decoded::Frame(frame),
        Err(e) => {
            debug!(error = %e, payload, "dropping malformed frame");
            Decoded::Skip
        }
    }
}

/// Incremental record splitter.
///
/// Feed chunks with [`push`](Self::push) and pull decoded records with
/// [`next_decoded`](Self::next_decoded). Bytes after the last newline stay
/// buffered until more data arrives. A record longer than the limit is
/// dropped and decoding resumes after its newline.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    max_record_len: usize,
    /// Inside an oversized record; bytes are dropped up to the next newline.
    discarding: bool,
    finished: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_record_len(MAX_RECORD_LEN)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_record_len(max_record_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_record_len,
            discarding: false,
            finished: false,
        }
    }

    /// Appends a raw chunk. Ignored once the sentinel has been seen.
    pub fn push(&mut self, chunk: &[u8]) {
        if !self.finished {
            self.buffer.extend_from_slice(chunk);
        }
    }

    /// Decodes the next complete record, or `None` if more bytes are needed.
    ///
    /// After [`Decoded::End`] every call returns `Some(Decoded::End)`.
    pub fn next_decoded<T: DeserializeOwned>(&mut self) -> Option<Decoded<T>> {
        if self.finished {
            return Some(Decoded::End);
        }
        let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
            if self.discarding {
                self.buffer.clear();
            } else if self.buffer.len() > self.max_record_len {
                warn!(
                    len = self.buffer.len(),
                    limit = self.max_record_len,
                    "dropping oversized stream record"
                );
                self.buffer.clear();
                self.discarding = true;
            }
            self.scanned = self.buffer.len();
            return None;
        };
        let newline = self.scanned + offset;
        self.scanned = 0;

        let record: Vec<u8> = self.buffer.drain(..=newline).collect();
        if std::mem::take(&mut self.discarding) {
            return Some(Decoded::Skip);
        }
        if newline > self.max_record_len {
            warn!(len = newline, limit = self.max_record_len, "dropping oversized stream record");
            return Some(Decoded::Skip);
        }
        let decoded = decode_record(&record[..newline]);
        if matches!(decoded, Decoded::End) {
            self.finished = true;
            self.buffer.clear();
        }
        Some(decoded)
    }

    /// True once the sentinel has been decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes of the incomplete trailing record.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

/// A stream of decoded frames.
pub type FrameStream<T> = Pin<Box<dyn Stream<Item = Result<T, PilotError>> + Send>>;

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: FrameDecoder,
    done: bool,
}

/// Drives a [`FrameDecoder`] over a byte stream.
///
/// Yields one item per well-formed frame. Ends quietly on the sentinel. If
/// the body ends first the last item is [`PilotError::TruncatedStream`]; a
/// body read error becomes a transport error. Nothing is yielded after an
/// error.
pub fn decode_frames<S, B, E, T>(body: S) -> FrameStream<T>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: FrameDecoder::new(),
        done: false,
    };

    let frames = stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            while let Some(decoded) = state.decoder.next_decoded::<T>() {
                match decoded {
                    Decoded::Frame(frame) => return Some((Ok(frame), state)),
                    Decoded::Skip => continue,
                    Decoded::End => {
                        debug!("stream sentinel received");
                        state.done = true;
                        return None;
                    }
                }
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.decoder.push(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    let err = PilotError::transport(format!("stream read failed: {e}"), e);
                    return Some((Err(err), state));
                }
                None => {
                    debug!(
                        pending = state.decoder.pending_len(),
                        "body closed before sentinel"
                    );
                    state.done = true;
                    return Some((Err(PilotError::TruncatedStream), state));
                }
            }
        }
    });

    Box::pin(frames)
}

/// Decodes a complete body in one go. Mainly useful for tests and tooling.
pub fn decode_all<T: DeserializeOwned>(body: &[u8]) -> (Vec<T>, bool) {
    let mut decoder = FrameDecoder::new();
    decoder.push(body);
    let mut frames = Vec::new();
    while let Some(decoded) = decoder.next_decoded::<T>() {
        match decoded {
            Decoded::Frame(frame) => frames.push(frame),
            Decoded::Skip => {}
            Decoded::End => break,
        }
    }
    (frames, decoder.is_finished())
}
