//! WebSocket connection engine
//!
//! A [`WebSocket`] owns an already-upgraded byte stream and speaks RFC 6455
//! framing over it. The write half sits behind an async mutex so application
//! sends, automatic pongs and close frames never interleave on the wire. The
//! read half belongs to whichever task is currently in [`WebSocket::receive`];
//! a second concurrent receive is rejected with [`Error::ConcurrentReceive`].
//!
//! Every transport await races the caller's cancellation token and an internal
//! token that fires once, on the transition into `Closed` or `Aborted`.

use crate::config::WebSocketConfig;
use crate::receive_buffer::ReceiveBuffer;
use rawsocket_core::error::{CloseError, ProtocolError};
use rawsocket_core::frame::FrameHeader;
use rawsocket_core::mask;
use rawsocket_core::protocol::constants::{
    CLOSE_STATUS_LEN, MAX_CLOSE_REASON_SIZE, MAX_CONTROL_PAYLOAD_LEN, MIN_HEADER_SIZE,
};
use rawsocket_core::{
    CloseCode, Error, MaskKeySource, MessageKind, Opcode, RandomMaskKeys, ReceiveResult, Result,
    TransportRead, TransportStream, TransportWrite, WebSocketState, ZeroMaskKey,
};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Await `fut` unless `cancel` or `disposed` fires first.
pub(crate) async fn cancellable<T>(
    fut: impl Future<Output = Result<T>>,
    cancel: &CancellationToken,
    disposed: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = disposed.cancelled() => Err(Error::Disposed),
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

/// One WebSocket endpoint, client or server
pub struct WebSocket {
    config: WebSocketConfig,
    reader: Mutex<ReadSide>,
    writer: Mutex<WriteSide>,
    shared: StdMutex<SharedState>,
    disposed: CancellationToken,
}

struct SharedState {
    state: WebSocketState,
    close_status: Option<CloseCode>,
    close_status_description: Option<String>,
}

struct WriteSide {
    stream: Option<Box<dyn TransportWrite>>,
    /// A multi-chunk outbound message is in progress
    message_in_progress: bool,
    mask_keys: Box<dyn MaskKeySource>,
}

struct ReadSide {
    stream: Option<Box<dyn TransportRead>>,
    buffer: ReceiveBuffer,
    current: Option<InboundFrame>,
    /// Opcode of the fragmented message currently open, if any
    fragment_opcode: Option<Opcode>,
    /// Payload bytes of a rejected frame still to be skipped
    discard: u64,
}

#[derive(Debug, Clone, Copy)]
struct InboundFrame {
    header: FrameHeader,
    kind: MessageKind,
    remaining: u64,
    /// Payload bytes already handed out, for mask key rotation
    consumed: u64,
}

impl ReadSide {
    async fn fill(
        &mut self,
        min: usize,
        cancel: &CancellationToken,
        disposed: &CancellationToken,
    ) -> Result<()> {
        let stream = self.stream.as_deref_mut().ok_or(Error::Disposed)?;
        self.buffer.fill(stream, min, cancel, disposed).await
    }

    /// Peek the length byte, wait for the full header, decode and consume it.
    async fn read_header(
        &mut self,
        cancel: &CancellationToken,
        disposed: &CancellationToken,
    ) -> Result<FrameHeader> {
        self.fill(MIN_HEADER_SIZE, cancel, disposed).await?;
        let size = FrameHeader::header_size(self.buffer.as_slice()[1]);
        self.fill(size, cancel, disposed).await?;

        let header = FrameHeader::decode(&self.buffer.as_slice()[..size]);
        self.buffer.consume(size);
        header
    }

    async fn skip_discarded(
        &mut self,
        cancel: &CancellationToken,
        disposed: &CancellationToken,
    ) -> Result<()> {
        while self.discard > 0 {
            self.fill(1, cancel, disposed).await?;
            let n = (self.buffer.len() as u64).min(self.discard);
            self.buffer.consume(n as usize);
            self.discard -= n;
        }
        Ok(())
    }

    /// Take the next `len` buffered bytes, waiting for them if needed.
    async fn take_payload(
        &mut self,
        len: usize,
        cancel: &CancellationToken,
        disposed: &CancellationToken,
    ) -> Result<Vec<u8>> {
        self.fill(len, cancel, disposed).await?;
        let payload = self.buffer.as_slice()[..len].to_vec();
        self.buffer.consume(len);
        Ok(payload)
    }
}

impl WebSocket {
    /// Take ownership of an upgraded stream.
    ///
    /// Mask keys come from [`RandomMaskKeys`], or [`ZeroMaskKey`] when
    /// `config.use_zero_mask` is set.
    pub fn new<S: TransportStream>(stream: S, config: WebSocketConfig) -> Result<Self> {
        let mask_keys: Box<dyn MaskKeySource> = if config.use_zero_mask {
            Box::new(ZeroMaskKey)
        } else {
            Box::new(RandomMaskKeys::new())
        };
        Self::with_mask_key_source(stream, config, mask_keys)
    }

    /// Take ownership of an upgraded stream with a custom mask key source
    pub fn with_mask_key_source<S: TransportStream>(
        stream: S,
        config: WebSocketConfig,
        mask_keys: Box<dyn MaskKeySource>,
    ) -> Result<Self> {
        config.validate()?;
        let (read_half, write_half) = TransportStream::split(Box::new(stream));

        log_debug!(
            mask_output = config.mask_output,
            unmask_input = config.unmask_input,
            receive_buffer_size = config.receive_buffer_size,
            "websocket opened"
        );

        Ok(Self {
            reader: Mutex::new(ReadSide {
                stream: Some(read_half),
                buffer: ReceiveBuffer::new(config.receive_buffer_size),
                current: None,
                fragment_opcode: None,
                discard: 0,
            }),
            writer: Mutex::new(WriteSide {
                stream: Some(write_half),
                message_in_progress: false,
                mask_keys,
            }),
            shared: StdMutex::new(SharedState {
                state: WebSocketState::Open,
                close_status: None,
                close_status_description: None,
            }),
            disposed: CancellationToken::new(),
            config,
        })
    }

    /// Current connection state
    pub fn state(&self) -> WebSocketState {
        self.shared().state
    }

    /// Close status recorded from the first close frame sent or the peer's close frame
    pub fn close_status(&self) -> Option<CloseCode> {
        self.shared().close_status
    }

    /// Close description matching [`WebSocket::close_status`]
    pub fn close_status_description(&self) -> Option<String> {
        self.shared().close_status_description.clone()
    }

    /// Subprotocol negotiated before this engine was constructed
    pub fn subprotocol(&self) -> Option<&str> {
        self.config.subprotocol.as_deref()
    }

    /// Configuration this connection was built with
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Send one chunk of a text or binary message.
    ///
    /// The first chunk of a message goes out with the opcode for `kind`,
    /// later chunks as continuation frames; `end_of_message` sets FIN. A
    /// cancelled or failed send may leave a partial frame on the wire and
    /// does not abort the connection.
    pub async fn send(
        &self,
        data: &[u8],
        kind: MessageKind,
        end_of_message: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if kind == MessageKind::Close {
            return Err(Error::InvalidArgument(
                "close frames are sent with close_output or close".to_string(),
            ));
        }
        const SENDABLE: &[WebSocketState] =
            &[WebSocketState::Open, WebSocketState::CloseReceived];
        self.state().ensure_one_of(SENDABLE, "send")?;

        let mut writer = self.lock_writer(cancel).await?;
        // A close frame may have gone out while we waited for the lock.
        self.state().ensure_one_of(SENDABLE, "send")?;
        let opcode = if writer.message_in_progress {
            Opcode::Continuation
        } else {
            kind.opcode()
        };
        self.write_frame(&mut writer, opcode, end_of_message, data, cancel)
            .await?;
        writer.message_in_progress = !end_of_message;
        Ok(())
    }

    /// Receive the next chunk of a message into `destination`.
    ///
    /// Pings are answered and pongs dropped without returning. A close frame
    /// is reported as a final `MessageKind::Close` result with no bytes copied.
    pub async fn receive(
        &self,
        destination: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<ReceiveResult> {
        self.state().ensure_one_of(
            &[WebSocketState::Open, WebSocketState::CloseSent],
            "receive",
        )?;
        let mut reader = self
            .reader
            .try_lock()
            .map_err(|_| Error::ConcurrentReceive)?;

        let result = self.receive_locked(&mut reader, destination, cancel).await;
        if self.disposed.is_cancelled() {
            reader.stream = None;
        }
        result
    }

    async fn receive_locked(
        &self,
        reader: &mut ReadSide,
        destination: &mut [u8],
        cancel: &CancellationToken,
    ) -> Result<ReceiveResult> {
        let mut frame = match reader.current {
            Some(frame) => frame,
            None => {
                let frame = self.next_frame(reader, cancel).await?;
                reader.current = Some(frame);
                frame
            }
        };

        if frame.kind == MessageKind::Close {
            return self.handle_close(reader, frame, cancel).await;
        }

        if frame.remaining == 0 {
            reader.current = None;
            return Ok(ReceiveResult::data(0, frame.kind, frame.header.fin));
        }

        reader.fill(1, cancel, &self.disposed).await?;
        let remaining = usize::try_from(frame.remaining).unwrap_or(usize::MAX);
        let n = destination.len().min(reader.buffer.len()).min(remaining);

        let chunk = &mut destination[..n];
        chunk.copy_from_slice(&reader.buffer.as_slice()[..n]);
        if let Some(key) = frame.header.mask_key {
            mask::apply_mask(mask::rotate_key(key, frame.consumed), chunk);
        }
        reader.buffer.consume(n);

        frame.remaining -= n as u64;
        frame.consumed += n as u64;
        let end_of_message = if frame.remaining == 0 {
            reader.current = None;
            frame.header.fin
        } else {
            reader.current = Some(frame);
            false
        };

        #[cfg(feature = "metrics")]
        metrics::counter!("rawsocket_bytes_received_total").increment(n as u64);

        Ok(ReceiveResult::data(n, frame.kind, end_of_message))
    }

    /// Read headers until one starts a data or close frame, servicing pings
    /// and pongs along the way.
    async fn next_frame(
        &self,
        reader: &mut ReadSide,
        cancel: &CancellationToken,
    ) -> Result<InboundFrame> {
        loop {
            reader.skip_discarded(cancel, &self.disposed).await?;
            let header = reader.read_header(cancel, &self.disposed).await?;

            log_trace!(
                opcode = %header.opcode,
                fin = header.fin,
                len = header.payload_len,
                masked = header.is_masked(),
                "received frame header"
            );
            #[cfg(feature = "metrics")]
            metrics::counter!("rawsocket_frames_received_total").increment(1);

            let kind = match self.classify(reader, &header) {
                Ok(kind) => kind,
                Err(err) => {
                    log_warn!(error = %err, "rejecting received frame");
                    reader.discard = header.payload_len;
                    return Err(err);
                }
            };

            match kind {
                Some(kind) => {
                    return Ok(InboundFrame {
                        header,
                        kind,
                        remaining: header.payload_len,
                        consumed: 0,
                    })
                }
                None => self.handle_ping_pong(reader, header, cancel).await?,
            }
        }
    }

    /// Validate a freshly read header and resolve the message it belongs to.
    ///
    /// Returns `None` for pings and pongs.
    fn classify(&self, reader: &mut ReadSide, header: &FrameHeader) -> Result<Option<MessageKind>> {
        if header.is_masked() != self.config.unmask_input {
            return Err(ProtocolError::MaskingMismatch {
                expected_masked: self.config.unmask_input,
            }
            .into());
        }

        if header.opcode.is_control() {
            if !header.fin {
                return Err(ProtocolError::FragmentedControlFrame(header.opcode).into());
            }
            if header.payload_len > MAX_CONTROL_PAYLOAD_LEN as u64 {
                return Err(ProtocolError::ControlFrameTooLarge {
                    opcode: header.opcode,
                    len: header.payload_len,
                }
                .into());
            }
        }

        let message_opcode = match header.opcode {
            Opcode::Ping | Opcode::Pong => return Ok(None),
            Opcode::Continuation => reader
                .fragment_opcode
                .ok_or(ProtocolError::UnexpectedContinuation)?,
            opcode => opcode,
        };
        reader.fragment_opcode = if header.fin {
            None
        } else {
            Some(message_opcode)
        };
        Ok(MessageKind::from_opcode(message_opcode))
    }

    async fn handle_ping_pong(
        &self,
        reader: &mut ReadSide,
        header: FrameHeader,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut payload = reader
            .take_payload(header.payload_len as usize, cancel, &self.disposed)
            .await?;

        if header.opcode != Opcode::Ping || self.state() != WebSocketState::Open {
            return Ok(());
        }

        if let Some(key) = header.mask_key {
            mask::apply_mask(key, &mut payload);
        }
        let mut writer = self.lock_writer(cancel).await?;
        if self.state() != WebSocketState::Open {
            return Ok(());
        }
        self.write_frame(&mut writer, Opcode::Pong, true, &payload, cancel)
            .await?;

        #[cfg(feature = "metrics")]
        metrics::counter!("rawsocket_pongs_sent_total").increment(1);

        Ok(())
    }

    async fn handle_close(
        &self,
        reader: &mut ReadSide,
        frame: InboundFrame,
        cancel: &CancellationToken,
    ) -> Result<ReceiveResult> {
        let mut payload = reader
            .take_payload(frame.header.payload_len as usize, cancel, &self.disposed)
            .await?;
        reader.current = None;

        if let Some(key) = frame.header.mask_key {
            mask::apply_mask(key, &mut payload);
        }

        let (status, description) = {
            let mut shared = self.shared();
            if payload.len() >= CLOSE_STATUS_LEN {
                let code = u16::from_be_bytes([payload[0], payload[1]]);
                shared.close_status = Some(CloseCode::from(code));
                shared.close_status_description =
                    Some(String::from_utf8_lossy(&payload[CLOSE_STATUS_LEN..]).into_owned());
            } else if shared.close_status.is_none() {
                shared.close_status = Some(CloseCode::Normal);
                shared.close_status_description = Some(String::new());
            }
            (
                shared.close_status.unwrap_or(CloseCode::Normal),
                shared.close_status_description.clone().unwrap_or_default(),
            )
        };
        log_debug!(status = %status, description = %description, "received close frame");

        if self.transition(WebSocketState::on_close_received)?.is_terminal() {
            reader.stream = None;
        }

        Ok(ReceiveResult::close(status, description))
    }

    /// Send a close frame without waiting for the peer's.
    ///
    /// Moves `Open` to `CloseSent`, or `CloseReceived` to `Closed`. On
    /// reaching `Closed` the write half is shut down and the transport released.
    pub async fn close_output(
        &self,
        status: CloseCode,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if description.len() > MAX_CLOSE_REASON_SIZE {
            return Err(CloseError::ReasonTooLong {
                len: description.len(),
                max: MAX_CLOSE_REASON_SIZE,
            }
            .into());
        }

        let mut writer = self.lock_writer(cancel).await?;
        // Only this method enters CloseSent, and it does so under the write lock.
        self.state().on_close_sent()?;

        let mut payload = Vec::with_capacity(CLOSE_STATUS_LEN + description.len());
        payload.extend_from_slice(&status.code().to_be_bytes());
        payload.extend_from_slice(description.as_bytes());
        self.write_frame(&mut writer, Opcode::Close, true, &payload, cancel)
            .await?;

        {
            let mut shared = self.shared();
            if shared.close_status.is_none() {
                shared.close_status = Some(status);
                shared.close_status_description = Some(description.to_string());
            }
        }
        log_debug!(status = %status, description, "sent close frame");

        if self.transition(WebSocketState::on_close_sent)?.is_terminal() {
            if let Some(mut stream) = writer.stream.take() {
                // `disposed` has already fired, so only the caller can cut this short.
                let released = CancellationToken::new();
                if let Err(_err) = cancellable(stream.shutdown(), cancel, &released).await {
                    log_debug!(error = %_err, "transport shutdown failed");
                }
            }
        }
        Ok(())
    }

    /// Run the full close handshake.
    ///
    /// Sends a close frame unless one was already sent, then receives and
    /// discards data until the peer's close frame arrives, whose status and
    /// description are adopted. Ends in `Closed`.
    ///
    /// The drain goes through [`WebSocket::receive`], so if another task is
    /// receiving at the time this fails with [`Error::ConcurrentReceive`] after
    /// the close frame is sent, leaving the connection in `CloseSent`.
    pub async fn close(
        &self,
        status: CloseCode,
        description: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let state = self.state();
        if state.is_terminal() {
            return Err(Error::InvalidState {
                operation: "close",
                state,
            });
        }

        if matches!(
            state,
            WebSocketState::Open | WebSocketState::CloseReceived
        ) {
            self.close_output(status, description, cancel).await?;
        }

        let mut scratch = vec![0u8; MAX_CONTROL_PAYLOAD_LEN];
        while self.state() == WebSocketState::CloseSent {
            let result = self.receive(&mut scratch, cancel).await?;
            if result.is_close() {
                break;
            }
        }
        Ok(())
    }

    /// Tear the connection down without a close handshake.
    ///
    /// No-op once the connection is `Closed` or `Aborted`.
    pub fn abort(&self) {
        self.terminate(WebSocketState::on_abort);
    }

    /// Release the transport without sending a close frame, ending in `Closed`.
    ///
    /// No-op once the connection is `Closed` or `Aborted`.
    pub fn dispose(&self) {
        self.terminate(WebSocketState::on_dispose);
    }

    /// Write an unsolicited empty pong as a unidirectional heartbeat
    pub async fn send_keep_alive(&self, cancel: &CancellationToken) -> Result<()> {
        self.state()
            .ensure_one_of(&[WebSocketState::Open], "send a keep-alive")?;
        let mut writer = self.lock_writer(cancel).await?;
        self.state()
            .ensure_one_of(&[WebSocketState::Open], "send a keep-alive")?;
        self.write_frame(&mut writer, Opcode::Pong, true, &[], cancel)
            .await
    }

    /// Spawn a task sending keep-alive pongs every `keep_alive_interval`.
    ///
    /// Returns `None` when no interval is configured. The task holds only a
    /// weak reference and stops once the connection leaves `Open` or a
    /// heartbeat fails.
    pub fn spawn_keep_alive(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let interval = self.config.keep_alive_interval?;
        let weak = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let never = CancellationToken::new();
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(ws) = weak.upgrade() else { break };
                if ws.state() != WebSocketState::Open {
                    break;
                }
                if let Err(_err) = ws.send_keep_alive(&never).await {
                    log_debug!(error = %_err, "keep-alive stopped");
                    break;
                }
            }
        }))
    }

    fn shared(&self) -> StdMutexGuard<'_, SharedState> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a close-handshake transition, releasing the transport on
    /// entering a terminal state.
    fn transition(
        &self,
        next: impl FnOnce(WebSocketState) -> Result<WebSocketState>,
    ) -> Result<WebSocketState> {
        let mut shared = self.shared();
        let from = shared.state;
        let to = next(from)?;
        shared.state = to;
        drop(shared);

        log_debug!(from = %from, to = %to, "websocket state transition");
        if to.is_terminal() {
            self.release_transport();
        }
        Ok(to)
    }

    fn terminate(&self, next: impl FnOnce(WebSocketState) -> Option<WebSocketState>) {
        let mut shared = self.shared();
        let from = shared.state;
        let Some(to) = next(from) else { return };
        shared.state = to;
        drop(shared);

        log_debug!(from = %from, to = %to, "websocket state transition");
        self.release_transport();
    }

    /// Wake every pending transport await and drop whichever halves are not
    /// held by an in-flight operation; those drop their own half on return.
    fn release_transport(&self) {
        self.disposed.cancel();
        if let Ok(mut reader) = self.reader.try_lock() {
            reader.stream = None;
        }
        if let Ok(mut writer) = self.writer.try_lock() {
            writer.stream = None;
        }
    }

    async fn lock_writer(&self, cancel: &CancellationToken) -> Result<MutexGuard<'_, WriteSide>> {
        cancellable(
            async { Ok(self.writer.lock().await) },
            cancel,
            &self.disposed,
        )
        .await
    }

    /// Write one complete frame while holding the write lock.
    async fn write_frame(
        &self,
        writer: &mut WriteSide,
        opcode: Opcode,
        fin: bool,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut header = FrameHeader::new(opcode, fin, payload.len() as u64);
        if self.config.mask_output {
            header = header.with_mask(writer.mask_keys.next_mask_key());
        }

        let stream = writer.stream.as_deref_mut().ok_or(Error::Disposed)?;
        let result = self.write_to_stream(stream, &header, payload, cancel).await;
        if self.disposed.is_cancelled() {
            writer.stream = None;
        }
        result?;

        log_trace!(
            opcode = %opcode,
            fin,
            len = payload.len(),
            masked = header.is_masked(),
            "sent frame"
        );
        #[cfg(feature = "metrics")]
        {
            metrics::counter!("rawsocket_frames_sent_total").increment(1);
            metrics::counter!("rawsocket_bytes_sent_total").increment(payload.len() as u64);
        }
        Ok(())
    }

    async fn write_to_stream(
        &self,
        stream: &mut dyn TransportWrite,
        header: &FrameHeader,
        payload: &[u8],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let encoded = header.encode();
        match header.mask_key {
            Some(key) => {
                let frame = mask::merge_and_mask(key, &encoded, payload);
                cancellable(stream.write_all(&frame), cancel, &self.disposed).await?;
            }
            None => {
                cancellable(stream.write_all(&encoded), cancel, &self.disposed).await?;
                if !payload.is_empty() {
                    cancellable(stream.write_all(payload), cancel, &self.disposed).await?;
                }
            }
        }
        cancellable(stream.flush(), cancel, &self.disposed).await
    }
}

impl Drop for WebSocket {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared();
        f.debug_struct("WebSocket")
            .field("state", &shared.state)
            .field("subprotocol", &self.config.subprotocol)
            .field("close_status", &shared.close_status)
            .field("mask_output", &self.config.mask_output)
            .field("unmask_input", &self.config.unmask_input)
            .field("stream", &"<stream>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{WebSocket, WebSocketConfig};
    use bytes::BytesMut;
    use rawsocket_core::frame::FrameHeader;
    use rawsocket_core::{mask, CloseCode, Error, MessageKind, Opcode, WebSocketState};
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use tokio::io::{
        duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf,
    };
    use tokio_util::sync::CancellationToken;

    fn client(stream: DuplexStream) -> WebSocket {
        WebSocket::new(stream, WebSocketConfig::client()).unwrap()
    }

    fn raw_frame(opcode: Opcode, fin: bool, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        FrameHeader::new(opcode, fin, payload.len() as u64).write_to(&mut buf);
        buf.extend_from_slice(payload);
        buf.to_vec()
    }

    /// Duplex stream that records whether its write half was shut down
    struct TrackedStream {
        inner: DuplexStream,
        shut_down: Arc<AtomicBool>,
    }

    impl AsyncRead for TrackedStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for TrackedStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Pin::new(&mut self.inner).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.inner).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.shut_down.store(true, Ordering::SeqCst);
            Pin::new(&mut self.inner).poll_shutdown(cx)
        }
    }

    #[tokio::test]
    async fn test_new_connection_is_open() {
        let (local, _remote) = duplex(1024);
        let config = WebSocketConfig::client().subprotocol("chat");
        let ws = WebSocket::new(local, config).unwrap();

        assert_eq!(ws.state(), WebSocketState::Open);
        assert_eq!(ws.subprotocol(), Some("chat"));
        assert_eq!(ws.close_status(), None);
        assert_eq!(ws.close_status_description(), None);
        assert!(format!("{ws:?}").contains("Open"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let (local, _remote) = duplex(1024);
        let config = WebSocketConfig::client().receive_buffer_size(16);
        assert!(matches!(
            WebSocket::new(local, config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_send_close_kind_is_rejected() {
        let (local, _remote) = duplex(1024);
        let ws = client(local);
        let err = ws
            .send(b"", MessageKind::Close, true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_concurrent_receive_is_rejected() {
        let (local, _remote) = duplex(1024);
        let ws = Arc::new(client(local));
        let cancel = CancellationToken::new();

        let pending = {
            let ws = Arc::clone(&ws);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 16];
                ws.receive(&mut buf, &cancel).await
            })
        };
        tokio::task::yield_now().await;
        while ws.reader.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }

        let mut buf = [0u8; 16];
        let err = ws.receive(&mut buf, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::ConcurrentReceive));

        cancel.cancel();
        assert!(pending.await.unwrap().unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_masking_key_rotates_across_partial_reads() {
        let (local, mut remote) = duplex(1024);
        let ws = WebSocket::new(local, WebSocketConfig::server()).unwrap();

        let payload = b"partial reads keep the mask aligned";
        let key = 0x0102_0304;
        let header = FrameHeader::new(Opcode::Binary, true, payload.len() as u64).with_mask(key);
        let frame = mask::merge_and_mask(key, &header.encode(), payload);
        remote.write_all(&frame).await.unwrap();

        let cancel = CancellationToken::new();
        let mut received = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let result = ws.receive(&mut buf, &cancel).await.unwrap();
            received.extend_from_slice(&buf[..result.count]);
            if result.end_of_message {
                break;
            }
        }
        assert_eq!(&received[..], &payload[..]);
    }

    #[tokio::test]
    async fn test_closing_output_shuts_down_write_half() {
        let (local, mut remote) = duplex(1024);
        let shut_down = Arc::new(AtomicBool::new(false));
        let stream = TrackedStream {
            inner: local,
            shut_down: Arc::clone(&shut_down),
        };
        let ws = WebSocket::new(stream, WebSocketConfig::client()).unwrap();
        let cancel = CancellationToken::new();

        remote
            .write_all(&raw_frame(Opcode::Close, true, &1000u16.to_be_bytes()))
            .await
            .unwrap();
        let mut buf = [0u8; 8];
        assert!(ws.receive(&mut buf, &cancel).await.unwrap().is_close());
        assert!(!shut_down.load(Ordering::SeqCst));

        ws.close_output(CloseCode::Normal, "", &cancel).await.unwrap();
        assert_eq!(ws.state(), WebSocketState::Closed);
        assert!(shut_down.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_rejected_frame_payload_is_skipped() {
        let (local, mut remote) = duplex(1024);
        let ws = client(local);

        let mut wire = raw_frame(Opcode::Continuation, true, b"orphan");
        wire.extend(raw_frame(Opcode::Text, true, b"next"));
        remote.write_all(&wire).await.unwrap();

        let cancel = CancellationToken::new();
        let mut buf = [0u8; 16];
        let err = ws.receive(&mut buf, &cancel).await.unwrap_err();
        assert!(err.is_protocol_violation());

        let result = ws.receive(&mut buf, &cancel).await.unwrap();
        assert_eq!(&buf[..result.count], b"next");
        assert_eq!(result.kind, MessageKind::Text);
        assert!(result.end_of_message);
    }

    #[cfg(feature = "logging")]
    #[tokio::test]
    #[tracing_test::traced_test]
    async fn test_transitions_are_logged() {
        let (local, mut remote) = duplex(1024);
        let ws = client(local);

        remote
            .write_all(&raw_frame(Opcode::Close, true, &1000u16.to_be_bytes()))
            .await
            .unwrap();
        let mut buf = [0u8; 8];
        let result = ws.receive(&mut buf, &CancellationToken::new()).await.unwrap();
        assert!(result.is_close());
        assert_eq!(ws.state(), WebSocketState::CloseReceived);

        ws.abort();
        assert_eq!(ws.state(), WebSocketState::Aborted);

        let mut rest = Vec::new();
        remote.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        assert!(logs_contain("received close frame"));
        assert!(logs_contain("websocket state transition"));
    }
}
