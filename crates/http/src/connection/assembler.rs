//! Turns a frame sequence into one immutable [`Request`].
//!
//! ```text
//!                    head, length > 0              length reached
//!  AwaitingHead ─────────────────────▶ AccumulatingBody ─────────────▶ Complete
//!       │ ▲                                                               │
//!       │ └─────────────────────────── end marker: Request ◀──────────────┘
//!       └──────────────────────────────────────────────────────────────▶ Complete
//!                    head, length = 0
//! ```
//!
//! Every other frame is a protocol violation: a second head, a chunk past the
//! declared length, or an end marker before the declared length was reached.

use std::mem;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::connection::ConnectionGuard;
use crate::protocol::{Message, ParseError, PayloadItem, Request, RequestHeader, StreamContext};

/// The observable stage of a [`RequestAssembler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStage {
    AwaitingHead,
    AccumulatingBody,
    Complete,
}

enum State {
    AwaitingHead,
    AccumulatingBody { header: RequestHeader, declared: u64, body: BytesMut },
    Complete { header: RequestHeader, body: Bytes },
}

/// Request assembly for one HTTP/1.1 connection or one HTTP/2 stream.
pub struct RequestAssembler {
    state: State,
    context: StreamContext,
    guard: ConnectionGuard,
}

impl RequestAssembler {
    pub fn new(context: StreamContext, guard: ConnectionGuard) -> Self {
        Self { state: State::AwaitingHead, context, guard }
    }

    pub fn stage(&self) -> AssemblyStage {
        match self.state {
            State::AwaitingHead => AssemblyStage::AwaitingHead,
            State::AccumulatingBody { .. } => AssemblyStage::AccumulatingBody,
            State::Complete { .. } => AssemblyStage::Complete,
        }
    }

    /// Whether no request is partially assembled.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::AwaitingHead)
    }

    /// Feeds the next frame, yielding the request once its end marker arrives.
    ///
    /// After an error the assembler is back in `AwaitingHead`, the caller is
    /// expected to drop the connection or stream.
    pub fn push(&mut self, message: Message<RequestHeader>) -> Result<Option<Request>, ParseError> {
        let state = mem::replace(&mut self.state, State::AwaitingHead);

        match (state, message) {
            (State::AwaitingHead, Message::Header(header)) => {
                let declared = header.payload_size()?.length();
                self.guard.admit_head(declared)?;
                trace!(method = %header.method(), uri = %header.uri(), declared, "request head");

                self.state = if declared == 0 {
                    State::Complete { header, body: Bytes::new() }
                } else {
                    #[allow(clippy::cast_possible_truncation, reason = "bounded by the guard's body limit")]
                    let body = BytesMut::with_capacity(declared as usize);
                    State::AccumulatingBody { header, declared, body }
                };
                Ok(None)
            }

            (State::AccumulatingBody { header, declared, mut body }, Message::Payload(PayloadItem::Chunk(bytes))) => {
                let received = (body.len() + bytes.len()) as u64;
                if received > declared {
                    return Err(ParseError::BodyOverflow { declared, received });
                }
                self.guard.admit_chunk(bytes.len() as u64)?;
                body.extend_from_slice(&bytes);

                self.state = if received == declared {
                    State::Complete { header, body: body.freeze() }
                } else {
                    State::AccumulatingBody { header, declared, body }
                };
                Ok(None)
            }

            (State::AccumulatingBody { declared, body, .. }, Message::Payload(PayloadItem::Eof)) => {
                Err(ParseError::IncompleteBody { declared, received: body.len() as u64 })
            }

            (State::Complete { header, body }, Message::Payload(PayloadItem::Chunk(bytes))) => {
                if bytes.is_empty() {
                    self.state = State::Complete { header, body };
                    return Ok(None);
                }
                let declared = body.len() as u64;
                Err(ParseError::BodyOverflow { declared, received: declared + bytes.len() as u64 })
            }

            (State::Complete { header, body }, Message::Payload(PayloadItem::Eof)) => {
                let mut request = header.body(body);
                request.extensions_mut().insert(self.context);
                Ok(Some(request))
            }

            (State::AwaitingHead, Message::Payload(_)) => Err(ParseError::unexpected_frame("body", "before a request head")),
            (_, Message::Header(_)) => Err(ParseError::unexpected_frame("head", "while a request is in progress")),
        }
    }
}
