//! Controlling-station (master) session engine.
//!
//! One connection runs three cooperating tasks: a **reader** that owns
//! the inbound half of the socket and the receive sequence number, a
//! **writer** that drains a bounded outbound queue, and a
//! **dispatcher** that feeds decoded units to the user handler. A
//! session-scoped cancellation token tears all of them down together;
//! a supervisor observes the teardown and applies the reconnect rule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use arc_swap::ArcSwapOption;
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::time::{interval, timeout, Duration, Instant};
use tokio_rustls::TlsConnector;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::codec::{Apdu, ApduCodec, DecodedApdu};
use crate::error::{Error, Result};
use crate::handler::{dispatch, ClientHandler, NullHandler};
use crate::options::ClientOption;
use crate::parser::{decode_asdu, CommandKind, CommandResponse};
use crate::types::{
    seq_add, seq_distance, Apci, Asdu, Cp56Time2a, Ioa, UFunction, QCC_GENERAL, QOI_STATION,
};

/// Byte stream under the frame codec: plain TCP or TLS.
trait Transport: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin> Transport for T {}

type FramedSink = SplitSink<Framed<Box<dyn Transport>, ApduCodec>, Apdu>;
type FramedStream = SplitStream<Framed<Box<dyn Transport>, ApduCodec>>;

/// SCO command octet: state in bit 0, select in bit 7.
const fn sco_byte(close: bool, select: bool) -> u8 {
    (close as u8) | if select { 0x80 } else { 0x00 }
}

/// DCO command octet: 1 = open, 2 = close, select in bit 7.
const fn dco_byte(close: bool, select: bool) -> u8 {
    (if close { 0x02 } else { 0x01 }) | if select { 0x80 } else { 0x00 }
}

/// Both 15-bit counters plus window bookkeeping. The reader owns the
/// receive side; submitters bump the send side under the same lock.
#[derive(Debug, Default)]
struct SequenceState {
    /// N(S) of the next I-frame we send.
    send_seq: u16,
    /// Highest N(S) of ours the peer has acknowledged.
    ack_send_seq: u16,
    /// N(S) we expect from the peer next; our N(R).
    recv_seq: u16,
    /// Received I-frames not yet acknowledged by us.
    unacked_recvs: u16,
}

/// Outstanding STARTDT/STOPDT/TESTFR activation.
struct PendingConfirm {
    expect: UFunction,
    tx: oneshot::Sender<()>,
}

/// Outstanding single/double command step.
struct PendingCommand {
    kind: CommandKind,
    tx: oneshot::Sender<Result<()>>,
}

struct Shared {
    option: ClientOption,
    handler: Arc<dyn ClientHandler>,
    seq: AsyncMutex<SequenceState>,
    out_tx: ArcSwapOption<mpsc::Sender<Apdu>>,
    conn_token: StdMutex<Option<CancellationToken>>,
    started: AtomicBool,
    closing: AtomicBool,
    pending_confirm: StdMutex<Option<PendingConfirm>>,
    pending_command: StdMutex<Option<PendingCommand>>,
    /// Serializes command exchanges: one select/execute pair in flight.
    command_gate: AsyncMutex<()>,
}

/// IEC 60870-5-104 controlling station.
///
/// ```rust,ignore
/// let option = ClientOption::new("10.0.0.1:2404")?;
/// let client = Client::with_handler(option, Arc::new(MyHandler));
/// client.connect().await?;
/// client.send_general_interrogation().await?;
/// client.send_single_command(0x6001, true).await?;
/// client.close().await?;
/// ```
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    /// Client without a handler; received data is decoded and dropped.
    pub fn new(option: ClientOption) -> Self {
        Self::with_handler(option, Arc::new(NullHandler))
    }

    /// Client dispatching received units to `handler`.
    pub fn with_handler(option: ClientOption, handler: Arc<dyn ClientHandler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                option,
                handler,
                seq: AsyncMutex::new(SequenceState::default()),
                out_tx: ArcSwapOption::from(None),
                conn_token: StdMutex::new(None),
                started: AtomicBool::new(false),
                closing: AtomicBool::new(false),
                pending_confirm: StdMutex::new(None),
                pending_command: StdMutex::new(None),
                command_gate: AsyncMutex::new(()),
            }),
        }
    }

    /// Dial the server, start the session tasks and perform the
    /// STARTDT handshake.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::config_static("already connected"));
        }
        self.shared.option.validate()?;
        self.shared.closing.store(false, Ordering::SeqCst);
        establish(self.shared.clone()).await
    }

    /// Whether the transport is up. Duplicate close is a no-op.
    pub fn is_connected(&self) -> bool {
        self.shared
            .out_tx
            .load()
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Stop data transfer (best-effort STOPDT) and tear the session
    /// down. Does not reconnect.
    pub async fn close(&self) -> Result<()> {
        if self.shared.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let was_started = self.shared.started.swap(false, Ordering::SeqCst);
        if was_started {
            if let Err(err) = activate(&self.shared, UFunction::StopDtAct).await {
                tracing::warn!(%err, "STOPDT not confirmed");
            }
        }
        let token = self.shared.conn_token.lock().unwrap().take();
        if let Some(token) = token {
            token.cancel();
        }
        if was_started {
            if let Some(hook) = &self.shared.option.on_disconnect {
                hook();
            }
        }
        Ok(())
    }

    /// General interrogation of the whole station (QOI 0x14).
    pub async fn send_general_interrogation(&self) -> Result<()> {
        let asdu = Asdu::interrogation_command(self.shared.option.common_address, QOI_STATION);
        send_asdu(&self.shared, asdu).await
    }

    /// General counter interrogation (QCC 0x45).
    pub async fn send_counter_interrogation(&self) -> Result<()> {
        let asdu =
            Asdu::counter_interrogation_command(self.shared.option.common_address, QCC_GENERAL);
        send_asdu(&self.shared, asdu).await
    }

    /// Synchronize the station clock to the local wall clock.
    pub async fn send_clock_synchronization(&self) -> Result<()> {
        let time = Cp56Time2a::from_datetime(chrono::Utc::now());
        let asdu = Asdu::clock_sync_command(self.shared.option.common_address, time);
        send_asdu(&self.shared, asdu).await
    }

    /// Request a single object by address.
    pub async fn send_read_command(&self, ioa: u32) -> Result<()> {
        let asdu = Asdu::read_command(self.shared.option.common_address, Ioa::new(ioa));
        send_asdu(&self.shared, asdu).await
    }

    /// Heartbeat: TESTFR-act, waiting for the confirmation.
    pub async fn send_test_frame(&self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        activate(&self.shared, UFunction::TestFrAct).await
    }

    /// Switch a single point: select, await confirmation, execute,
    /// await confirmation. At most one command exchange runs at a time.
    pub async fn send_single_command(&self, ioa: u32, close: bool) -> Result<()> {
        let shared = &self.shared;
        let _gate = shared.command_gate.lock().await;
        let coa = shared.option.common_address;
        let address = Ioa::new(ioa);

        command_step(
            shared,
            Asdu::single_command(coa, address, sco_byte(close, true)),
            CommandKind::Single,
        )
        .await?;
        command_step(
            shared,
            Asdu::single_command(coa, address, sco_byte(close, false)),
            CommandKind::Single,
        )
        .await
    }

    /// Switch a double point, select-before-execute as above.
    pub async fn send_double_command(&self, ioa: u32, close: bool) -> Result<()> {
        let shared = &self.shared;
        let _gate = shared.command_gate.lock().await;
        let coa = shared.option.common_address;
        let address = Ioa::new(ioa);

        command_step(
            shared,
            Asdu::double_command(coa, address, dco_byte(close, true)),
            CommandKind::Double,
        )
        .await?;
        command_step(
            shared,
            Asdu::double_command(coa, address, dco_byte(close, false)),
            CommandKind::Double,
        )
        .await
    }
}

/// Open the transport, spawn the session tasks, run STARTDT.
async fn establish(shared: Arc<Shared>) -> Result<()> {
    let transport = dial(&shared.option).await?;
    let framed = Framed::new(transport, ApduCodec::new());
    let (sink, stream) = framed.split();

    // Both counters restart at zero on every connection.
    *shared.seq.lock().await = SequenceState::default();
    shared.started.store(false, Ordering::SeqCst);

    let (out_tx, out_rx) = mpsc::channel(shared.option.send_queue);
    let (dispatch_tx, dispatch_rx) = mpsc::channel(shared.option.send_queue);
    shared.out_tx.store(Some(Arc::new(out_tx)));

    let token = CancellationToken::new();
    *shared.conn_token.lock().unwrap() = Some(token.clone());

    tokio::spawn(write_loop(sink, out_rx, token.clone()));
    tokio::spawn(read_loop(shared.clone(), stream, dispatch_tx, token.clone()));
    tokio::spawn(dispatch_loop(shared.clone(), dispatch_rx, token.clone()));
    tokio::spawn(supervise(shared.clone(), token.clone()));

    match activate(&shared, UFunction::StartDtAct).await {
        Ok(()) => {
            shared.started.store(true, Ordering::SeqCst);
            tracing::info!(endpoint = %shared.option.endpoint(), "session started");
            if let Some(hook) = &shared.option.on_connect {
                hook();
            }
            Ok(())
        }
        Err(err) => {
            token.cancel();
            Err(err)
        }
    }
}

/// TCP connect, optionally wrapped in TLS, both under the connect
/// timeout.
async fn dial(option: &ClientOption) -> Result<Box<dyn Transport>> {
    let endpoint = option.endpoint();
    let stream = timeout(option.connect_timeout, TcpStream::connect(&endpoint))
        .await
        .map_err(|_| Error::ConnectTimeout)??;
    stream.set_nodelay(true).ok();

    if !option.is_secure() {
        return Ok(Box::new(stream));
    }

    let config = option
        .tls
        .clone()
        .ok_or(Error::config_static("secure scheme requires a TLS configuration"))?;
    let server_name = rustls::pki_types::ServerName::try_from(option.host().to_string())
        .map_err(|_| Error::config_static("invalid TLS server name"))?;
    let connector = TlsConnector::from(config);
    let stream = timeout(option.connect_timeout, connector.connect(server_name, stream))
        .await
        .map_err(|_| Error::ConnectTimeout)??;
    Ok(Box::new(stream))
}

/// Queue one frame for the writer.
async fn enqueue(shared: &Shared, apdu: Apdu) -> Result<()> {
    let tx = shared.out_tx.load_full().ok_or(Error::NotConnected)?;
    tx.send(apdu).await.map_err(|_| Error::ChannelClosed)
}

/// Number an I-frame and queue it, holding the sequence lock across the
/// enqueue so N(S) order matches queue order.
async fn send_asdu(shared: &Shared, mut asdu: Asdu) -> Result<()> {
    if !shared.started.load(Ordering::SeqCst) {
        return Err(Error::NotStarted);
    }
    asdu.header.originator = shared.option.originator;

    let mut seq = shared.seq.lock().await;
    if seq_distance(seq.ack_send_seq, seq.send_seq) >= shared.option.k {
        return Err(Error::WindowFull(shared.option.k));
    }
    let apdu = Apdu::i_frame(seq.send_seq, seq.recv_seq, asdu);
    seq.send_seq = seq_add(seq.send_seq, 1);
    // The I-frame's N(R) acknowledges everything received so far.
    seq.unacked_recvs = 0;
    enqueue(shared, apdu).await
}

/// Send a U-frame activation and wait for its confirmation. Only one
/// activation may be outstanding per direction.
async fn activate(shared: &Shared, function: UFunction) -> Result<()> {
    let Some(confirmation) = function.confirmation() else {
        return Err(Error::config_static("not an activation function"));
    };

    let (tx, rx) = oneshot::channel();
    {
        let mut slot = shared.pending_confirm.lock().unwrap();
        if slot.is_some() {
            return Err(Error::ActivationOutstanding);
        }
        *slot = Some(PendingConfirm {
            expect: confirmation,
            tx,
        });
    }

    if let Err(err) = enqueue(shared, Apdu::u_frame(function)).await {
        shared.pending_confirm.lock().unwrap().take();
        return Err(err);
    }

    match timeout(shared.option.confirm_timeout, rx).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(Error::ChannelClosed),
        Err(_) => {
            shared.pending_confirm.lock().unwrap().take();
            Err(Error::ConfirmTimeout)
        }
    }
}

/// One half of a select-before-execute exchange: send the command
/// I-frame and wait for the correlated response.
async fn command_step(shared: &Shared, asdu: Asdu, kind: CommandKind) -> Result<()> {
    let (tx, rx) = oneshot::channel();
    {
        // The gate serializes callers; anything left here is a stale
        // correlation from a torn-down session.
        let mut slot = shared.pending_command.lock().unwrap();
        *slot = Some(PendingCommand { kind, tx });
    }

    if let Err(err) = send_asdu(shared, asdu).await {
        shared.pending_command.lock().unwrap().take();
        return Err(err);
    }

    match timeout(shared.option.confirm_timeout, rx).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(_)) => Err(Error::ChannelClosed),
        Err(_) => {
            shared.pending_command.lock().unwrap().take();
            Err(Error::ConfirmTimeout)
        }
    }
}

/// Release a pending command exchange with the mirrored response.
fn complete_command(shared: &Shared, response: CommandResponse) {
    let pending = {
        let mut slot = shared.pending_command.lock().unwrap();
        match slot.as_ref() {
            Some(pending) if pending.kind == response.kind => slot.take(),
            Some(_) => {
                tracing::warn!(?response, "command response for a different command kind");
                None
            }
            None => {
                tracing::debug!(?response, "unsolicited command response");
                None
            }
        }
    };
    if let Some(pending) = pending {
        let _ = pending.tx.send(response.outcome());
    }
}

/// Writer: drains the outbound queue into the socket in queue order.
async fn write_loop(
    mut sink: FramedSink,
    mut out_rx: mpsc::Receiver<Apdu>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            item = out_rx.recv() => match item {
                Some(apdu) => {
                    tracing::debug!(frame = %apdu, "send");
                    if let Err(err) = sink.send(apdu).await {
                        tracing::error!(%err, "write failed");
                        break;
                    }
                }
                None => break,
            },
        }
    }
    let _ = sink.close().await;
    token.cancel();
}

/// Reader: owns the inbound half and the receive sequence number,
/// answers TESTFR, emits S-frame acknowledgements and drives the idle
/// heartbeat.
async fn read_loop(
    shared: Arc<Shared>,
    mut stream: FramedStream,
    dispatch_tx: mpsc::Sender<DecodedApdu>,
    token: CancellationToken,
) {
    let mut last_recv = Instant::now();
    let mut test_pending: Option<Instant> = None;
    let mut ticker = interval(Duration::from_millis(250));

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let Some(idle) = shared.option.idle_test_interval else { continue };
                if let Some(sent) = test_pending {
                    if sent.elapsed() >= shared.option.confirm_timeout {
                        tracing::error!("test frame unanswered; closing session");
                        break;
                    }
                } else if last_recv.elapsed() >= idle {
                    if enqueue(&shared, Apdu::u_frame(UFunction::TestFrAct)).await.is_err() {
                        break;
                    }
                    test_pending = Some(Instant::now());
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(apdu)) => {
                    last_recv = Instant::now();
                    tracing::debug!(frame = %apdu, "recv");
                    match handle_frame(&shared, apdu, &dispatch_tx, &mut test_pending).await {
                        Ok(()) => {}
                        Err(err) => {
                            tracing::error!(%err, "session error");
                            break;
                        }
                    }
                }
                Some(Err(err)) => {
                    tracing::error!(%err, "read failed");
                    break;
                }
                None => {
                    tracing::info!("connection closed by peer");
                    break;
                }
            },
        }
    }
    token.cancel();
}

/// Process one inbound frame.
async fn handle_frame(
    shared: &Arc<Shared>,
    apdu: Apdu,
    dispatch_tx: &mpsc::Sender<DecodedApdu>,
    test_pending: &mut Option<Instant>,
) -> Result<()> {
    match apdu.apci {
        Apci::IFrame { send_seq, recv_seq } => {
            let mut want_s_frame = {
                let mut seq = shared.seq.lock().await;
                if send_seq != seq.recv_seq {
                    return Err(Error::SequenceMismatch {
                        expected: seq.recv_seq,
                        actual: send_seq,
                    });
                }
                seq.recv_seq = seq_add(seq.recv_seq, 1);
                seq.unacked_recvs += 1;
                acknowledge(&mut seq, recv_seq);
                seq.unacked_recvs >= shared.option.w
            };

            if let Some(asdu) = apdu.asdu {
                match decode_asdu(&asdu) {
                    Ok(decoded) => {
                        if let Some(response) = decoded.cmd_rsp {
                            complete_command(shared, response);
                        }
                        want_s_frame |= decoded.send_s_frame;
                        if decoded.to_be_handled {
                            dispatch_tx
                                .send(DecodedApdu {
                                    apci: apdu.apci,
                                    asdu: decoded,
                                })
                                .await
                                .map_err(|_| Error::ChannelClosed)?;
                        }
                    }
                    Err(err) => tracing::warn!(%err, "discarding malformed ASDU"),
                }
            }

            if want_s_frame {
                let recv_seq = {
                    let mut seq = shared.seq.lock().await;
                    seq.unacked_recvs = 0;
                    seq.recv_seq
                };
                enqueue(shared, Apdu::s_frame(recv_seq)).await?;
            }
            Ok(())
        }

        Apci::SFrame { recv_seq } => {
            let mut seq = shared.seq.lock().await;
            acknowledge(&mut seq, recv_seq);
            Ok(())
        }

        Apci::UFrame { function } => {
            match function {
                UFunction::TestFrAct => {
                    enqueue(shared, Apdu::u_frame(UFunction::TestFrCon)).await?;
                }
                UFunction::StartDtCon | UFunction::StopDtCon | UFunction::TestFrCon => {
                    let completed = {
                        let mut slot = shared.pending_confirm.lock().unwrap();
                        match slot.as_ref() {
                            Some(pending) if pending.expect == function => slot.take(),
                            _ => None,
                        }
                    };
                    match completed {
                        Some(pending) => {
                            let _ = pending.tx.send(());
                        }
                        None if function == UFunction::TestFrCon => {
                            // Answer to the reader's own idle heartbeat.
                            *test_pending = None;
                        }
                        None => {
                            tracing::debug!(
                                function = function.control_byte(),
                                "unsolicited confirmation"
                            );
                        }
                    }
                }
                UFunction::StartDtAct | UFunction::StopDtAct => {
                    // Activations belong to the controlled station; a
                    // master only ever receives them from a misbehaving
                    // peer.
                    tracing::debug!("ignoring peer activation");
                }
            }
            Ok(())
        }
    }
}

/// Accept a peer acknowledgement if it lies within the send window.
fn acknowledge(seq: &mut SequenceState, acked: u16) {
    if seq_distance(seq.ack_send_seq, acked) <= seq_distance(seq.ack_send_seq, seq.send_seq) {
        seq.ack_send_seq = acked;
    } else {
        tracing::warn!(acked, "acknowledgement outside the send window");
    }
}

/// Dispatcher: hands decoded units to the user handler; handler faults
/// are logged and never abort the session.
async fn dispatch_loop(
    shared: Arc<Shared>,
    mut dispatch_rx: mpsc::Receiver<DecodedApdu>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            item = dispatch_rx.recv() => match item {
                Some(decoded) => {
                    let type_id = decoded.asdu.header.type_id;
                    if let Err(err) = dispatch(shared.handler.as_ref(), &decoded) {
                        tracing::warn!(%type_id, %err, "handler failed");
                    }
                }
                None => break,
            },
        }
    }
}

/// Waits for the session token, cleans up, and applies the reconnect
/// rule when the loss was not an intentional close.
async fn supervise(shared: Arc<Shared>, token: CancellationToken) {
    token.cancelled().await;

    shared.out_tx.store(None);
    let was_started = shared.started.swap(false, Ordering::SeqCst);
    if let Some(pending) = shared.pending_command.lock().unwrap().take() {
        let _ = pending.tx.send(Err(Error::ChannelClosed));
    }
    shared.pending_confirm.lock().unwrap().take();

    if !was_started {
        return;
    }
    tracing::info!("session ended");
    if let Some(hook) = &shared.option.on_disconnect {
        hook();
    }
    if shared.closing.load(Ordering::SeqCst) {
        return;
    }

    let retries = shared.option.reconnect_retries;
    for attempt in 1..=retries {
        tokio::time::sleep(shared.option.reconnect_interval).await;
        if shared.closing.load(Ordering::SeqCst) {
            return;
        }
        match reconnect(shared.clone()).await {
            Ok(()) => {
                tracing::info!(attempt, "reconnected");
                return;
            }
            Err(err) => tracing::warn!(attempt, %err, "reconnect failed"),
        }
    }
}

/// Boxed re-entry into [`establish`]: the supervisor and the session
/// setup are mutually recursive futures.
fn reconnect(shared: Arc<Shared>) -> BoxFuture<'static, Result<()>> {
    Box::pin(establish(shared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream as TokioTcpStream};

    const STARTDT_ACT: [u8; 6] = [0x68, 0x04, 0x07, 0x00, 0x00, 0x00];
    const STARTDT_CON: [u8; 6] = [0x68, 0x04, 0x0B, 0x00, 0x00, 0x00];
    const STOPDT_ACT: [u8; 6] = [0x68, 0x04, 0x13, 0x00, 0x00, 0x00];
    const STOPDT_CON: [u8; 6] = [0x68, 0x04, 0x23, 0x00, 0x00, 0x00];
    const TESTFR_ACT: [u8; 6] = [0x68, 0x04, 0x43, 0x00, 0x00, 0x00];
    const TESTFR_CON: [u8; 6] = [0x68, 0x04, 0x83, 0x00, 0x00, 0x00];

    async fn read_frame(sock: &mut TokioTcpStream) -> Vec<u8> {
        let mut head = [0u8; 2];
        sock.read_exact(&mut head).await.unwrap();
        let mut body = vec![0u8; head[1] as usize];
        sock.read_exact(&mut body).await.unwrap();
        let mut frame = head.to_vec();
        frame.extend(body);
        frame
    }

    async fn listener() -> (TcpListener, ClientOption) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let option = ClientOption::new(&addr.to_string())
            .unwrap()
            .confirm_timeout(Duration::from_secs(2))
            .idle_test_interval(None);
        (listener, option)
    }

    async fn accept_started(listener: &TcpListener) -> TokioTcpStream {
        let (mut sock, _) = listener.accept().await.unwrap();
        assert_eq!(read_frame(&mut sock).await, STARTDT_ACT);
        sock.write_all(&STARTDT_CON).await.unwrap();
        sock
    }

    /// Wrap an ASDU in an I-frame the way a controlled station would.
    fn server_i_frame(send_seq: u16, recv_seq: u16, asdu_bytes: &[u8]) -> Vec<u8> {
        let mut frame = Apci::i_frame(send_seq, recv_seq)
            .encode_header(asdu_bytes.len())
            .to_vec();
        frame.extend_from_slice(asdu_bytes);
        frame
    }

    #[tokio::test]
    async fn test_connect_startdt_close_stopdt() {
        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;
            assert_eq!(read_frame(&mut sock).await, STOPDT_ACT);
            sock.write_all(&STOPDT_CON).await.unwrap();
        });

        let client = Client::new(option);
        assert!(!client.is_connected());
        client.connect().await.unwrap();
        assert!(client.is_connected());

        client.close().await.unwrap();
        server.await.unwrap();

        // Duplicate close is a no-op.
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_before_start_fails() {
        let (_listener, option) = listener().await;
        let client = Client::new(option);
        assert!(matches!(
            client.send_general_interrogation().await,
            Err(Error::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_general_interrogation_sequencing() {
        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;
            let first = read_frame(&mut sock).await;
            assert_eq!(
                first,
                [0x68, 0x0E, 0x00, 0x00, 0x00, 0x00, 0x64, 0x01, 0x06, 0x00, 0x01, 0x00, 0x00,
                 0x00, 0x00, 0x14]
            );
            let second = read_frame(&mut sock).await;
            // N(S) advanced to 1.
            assert_eq!(&second[2..6], &[0x02, 0x00, 0x00, 0x00]);
            assert_eq!(second[6], 0x65);
        });

        let client = Client::new(option);
        client.connect().await.unwrap();
        client.send_general_interrogation().await.unwrap();
        client.send_counter_interrogation().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_testfr_act_is_answered() {
        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;
            sock.write_all(&TESTFR_ACT).await.unwrap();
            assert_eq!(read_frame(&mut sock).await, TESTFR_CON);
        });

        let client = Client::new(option);
        client.connect().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_test_frame_waits_for_confirmation() {
        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;
            assert_eq!(read_frame(&mut sock).await, TESTFR_ACT);
            sock.write_all(&TESTFR_CON).await.unwrap();
        });

        let client = Client::new(option);
        client.connect().await.unwrap();
        client.send_test_frame().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_single_command_select_before_execute() {
        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;

            // Select: SCO 0x81 (close, select), COT activation.
            let select = read_frame(&mut sock).await;
            assert_eq!(select[6], 45);
            assert_eq!(select[8] & 0x3F, 6);
            assert_eq!(*select.last().unwrap(), 0x81);

            // Mirror the activation confirm.
            let confirm = [0x2D, 0x01, 0x07, 0x00, 0x01, 0x00, 0x01, 0x60, 0x00, 0x81];
            sock.write_all(&server_i_frame(0, 1, &confirm)).await.unwrap();

            // Execute: SCO 0x01 (close, execute).
            let execute = read_frame(&mut sock).await;
            assert_eq!(*execute.last().unwrap(), 0x01);
            let confirm = [0x2D, 0x01, 0x07, 0x00, 0x01, 0x00, 0x01, 0x60, 0x00, 0x01];
            sock.write_all(&server_i_frame(1, 2, &confirm)).await.unwrap();
        });

        let client = Client::new(option);
        client.connect().await.unwrap();
        client.send_single_command(0x6001, true).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_single_command_termination_error() {
        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;
            let _select = read_frame(&mut sock).await;
            // Activation termination instead of a confirm.
            let termination = [0x2D, 0x01, 0x0A, 0x00, 0x01, 0x00, 0x01, 0x60, 0x00, 0x81];
            sock.write_all(&server_i_frame(0, 1, &termination)).await.unwrap();
            // Keep the socket alive until the client has the response.
            let _ = read_frame(&mut sock).await;
        });

        let client = Client::new(option);
        client.connect().await.unwrap();
        assert!(matches!(
            client.send_single_command(0x6001, false).await,
            Err(Error::SingleCommandTermination)
        ));
        // The termination schedules an S-frame acknowledgement, which
        // also keeps the server task's final read satisfied.
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_double_command_bytes() {
        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;

            let select = read_frame(&mut sock).await;
            assert_eq!(select[6], 46);
            assert_eq!(*select.last().unwrap(), 0x82); // select close
            let confirm = [0x2E, 0x01, 0x07, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x82];
            sock.write_all(&server_i_frame(0, 1, &confirm)).await.unwrap();

            let execute = read_frame(&mut sock).await;
            assert_eq!(*execute.last().unwrap(), 0x02); // execute close
            let confirm = [0x2E, 0x01, 0x07, 0x00, 0x01, 0x00, 0x02, 0x00, 0x00, 0x02];
            sock.write_all(&server_i_frame(1, 2, &confirm)).await.unwrap();
        });

        let client = Client::new(option);
        client.connect().await.unwrap();
        client.send_double_command(2, true).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_spontaneous_data_reaches_handler() {
        #[derive(Default)]
        struct Capture {
            seen: Mutex<Vec<(u32, Option<f64>)>>,
        }
        impl ClientHandler for Capture {
            fn unhandled(&self, apdu: &DecodedApdu) -> Result<()> {
                let mut seen = self.seen.lock().unwrap();
                for element in &apdu.asdu.elements {
                    seen.push((element.address, element.value));
                }
                Ok(())
            }
        }

        let (listener, option) = listener().await;
        let server = tokio::spawn(async move {
            let mut sock = accept_started(&listener).await;
            // M_SP_NA_1, spontaneous, IOA 1001 = on.
            let data = [0x01, 0x01, 0x03, 0x00, 0x01, 0x00, 0xE9, 0x03, 0x00, 0x01];
            sock.write_all(&server_i_frame(0, 0, &data)).await.unwrap();
            // Spontaneous data forces an S-frame with N(R)=1.
            let ack = read_frame(&mut sock).await;
            assert_eq!(ack, [0x68, 0x04, 0x01, 0x00, 0x02, 0x00]);
        });

        let capture = Arc::new(Capture::default());
        let client = Client::with_handler(option, capture.clone());
        client.connect().await.unwrap();
        server.await.unwrap();

        // The dispatcher runs concurrently; poll briefly.
        for _ in 0..50 {
            if !capture.seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(capture.seen.lock().unwrap().as_slice(), &[(1001, Some(1.0))]);
    }

    #[tokio::test]
    async fn test_command_bytes_table() {
        assert_eq!(sco_byte(false, true), 0x80);
        assert_eq!(sco_byte(true, true), 0x81);
        assert_eq!(sco_byte(false, false), 0x00);
        assert_eq!(sco_byte(true, false), 0x01);

        assert_eq!(dco_byte(false, true), 0x81);
        assert_eq!(dco_byte(true, true), 0x82);
        assert_eq!(dco_byte(false, false), 0x01);
        assert_eq!(dco_byte(true, false), 0x02);
    }

    #[tokio::test]
    async fn test_sequence_wrap() {
        let mut seq = SequenceState {
            send_seq: 32767,
            ack_send_seq: 32767,
            recv_seq: 32767,
            unacked_recvs: 0,
        };
        seq.send_seq = seq_add(seq.send_seq, 1);
        seq.recv_seq = seq_add(seq.recv_seq, 1);
        assert_eq!(seq.send_seq, 0);
        assert_eq!(seq.recv_seq, 0);

        acknowledge(&mut seq, 0);
        assert_eq!(seq.ack_send_seq, 0);
    }
}
