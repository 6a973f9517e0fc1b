//! The handshake driver.
//!
//! Owns the [`ConnectionState`] and walks the flights: generate a flight,
//! send it, wait for the peer's answer while resending on timeout, parse,
//! repeat until the last flight.
//!
//! ```text
//!                      +-----------+
//!            +-------> | Preparing |
//!            |         +-----------+
//!            |               |
//!            |               v
//!            |         +-----------+ last send flight +----------+
//!   next     |         |  Sending  | ---------------> | Finished |
//!   flight   |         +-----------+                  +----------+
//!            |            |     ^                          ^
//!            |            v     | timeout / retransmit     | last receive flight
//!            |         +-----------+                       |
//!            +-------- |  Waiting  | ----------------------+
//!                      +-----------+
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::HandshakeCache;
use crate::config::Config;
use crate::context::Context;
use crate::flight::{Flight, FlightConn, FlightFailure};
use crate::record::{Content, Packet};
use crate::state::ConnectionState;
use crate::timer::Backoff;
use crate::Error;

// Longest single block on the arrival listener, so that a cancelled
// context is noticed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandshakeState {
    Preparing,
    Sending,
    Waiting,
    Finished,
}

/// Drives one side of the handshake.
pub struct Handshaker {
    cfg: Arc<Config>,
    cache: Arc<HandshakeCache>,
    state: ConnectionState,

    current: Flight,
    handshake_state: HandshakeState,

    /// The packets of the current flight, resent as they are.
    packets: Vec<Packet>,

    backoff: Backoff,
    /// When the current flight is due for a resend.
    resend_at: Option<Instant>,
}

impl Handshaker {
    /// `cache` is shared with the receive path, which pushes the peer's
    /// handshake messages into it.
    pub fn new(cfg: Arc<Config>, cache: Arc<HandshakeCache>, is_client: bool) -> Self {
        let backoff = Backoff::new(cfg.flight_start_rto(), cfg.flight_retries(), cfg.rng_seed());

        Handshaker {
            cfg,
            cache,
            state: ConnectionState::new(is_client),
            current: Flight::initial(is_client),
            handshake_state: HandshakeState::Preparing,
            packets: Vec::new(),
            backoff,
            resend_at: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Give up the driver and keep the negotiated state.
    pub fn into_state(self) -> ConnectionState {
        self.state
    }

    /// The flight the driver is currently in.
    pub fn flight(&self) -> Flight {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.handshake_state == HandshakeState::Finished
    }

    /// Run the handshake to completion.
    ///
    /// Bounded by the configured handshake timeout and by `ctx`. Fatal
    /// alerts are sent to the peer before the error is returned.
    pub fn run(&mut self, ctx: &Context, conn: &mut dyn FlightConn) -> Result<(), Error> {
        let ctx = ctx.child_with_timeout(self.cfg.handshake_timeout());

        loop {
            trace!("{:?} in {:?}", self.current, self.handshake_state);

            self.handshake_state = match self.handshake_state {
                HandshakeState::Preparing => self.prepare(&ctx, conn)?,
                HandshakeState::Sending => self.send(&ctx, conn)?,
                HandshakeState::Waiting => self.wait(&ctx, conn)?,
                HandshakeState::Finished => {
                    debug!("Handshake finished in {:?}", self.current);
                    return Ok(());
                }
            };
        }
    }

    /// Keep answering retransmissions of the peer's final flight until
    /// `ctx` ends or the transport goes away.
    ///
    /// Our last flight may have been lost, in which case the peer resends
    /// its own and waits for ours again.
    pub fn linger(&mut self, ctx: &Context, conn: &mut dyn FlightConn) -> Result<(), Error> {
        if !self.is_finished() {
            return Err(Error::HandshakeInProgress);
        }

        loop {
            if ctx.check().is_err() {
                return Ok(());
            }

            let timeout = ctx.remaining().map_or(POLL_INTERVAL, |r| r.min(POLL_INTERVAL));
            let arrival = match conn.recv_handshake().wait(timeout) {
                Ok(Some(arrival)) => arrival,
                Ok(None) => continue,
                Err(Error::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e),
            };

            if !self.current.is_last_send_flight() {
                continue;
            }

            let parsed = self
                .current
                .parse(ctx, conn, &mut self.state, &self.cache, &self.cfg);
            let resend = arrival.is_retransmit || matches!(parsed, Ok(Some(_)));
            drop(arrival);

            if let Err(failure) = parsed {
                return Err(self.fail(conn, failure));
            }

            if resend {
                debug!("Peer resent its final flight, resend {:?}", self.current);
                conn.write_packets(ctx, &self.packets, &self.state)?;
            }
        }
    }

    fn prepare(
        &mut self,
        ctx: &Context,
        conn: &mut dyn FlightConn,
    ) -> Result<HandshakeState, Error> {
        debug!("Begin {:?}", self.current);
        self.backoff.reset();
        self.resend_at = None;

        let mut packets =
            match self
                .current
                .generate(ctx, conn, &mut self.state, &self.cache, &self.cfg)
            {
                Ok(packets) => packets,
                Err(failure) => return Err(self.fail(conn, failure)),
            };

        let initial_epoch = self.cfg.initial_epoch();
        let mut next_epoch = initial_epoch;

        for packet in &mut packets {
            packet.record.header.epoch += initial_epoch;
            next_epoch = next_epoch.max(packet.record.header.epoch);

            if let Content::Handshake(handshake) = &mut packet.record.content {
                let sequence = self.state.handshake_send_sequence;
                handshake.header.message_seq = sequence;
                self.state.handshake_send_sequence = sequence.wrapping_add(1);

                // Our own messages are part of the transcript too.
                self.cache.push(
                    handshake.to_bytes(),
                    packet.record.header.epoch,
                    sequence,
                    handshake.header.msg_type,
                    self.state.is_client,
                );
            }
        }

        if next_epoch != initial_epoch {
            trace!("Local epoch {}", next_epoch);
            self.state.set_local_epoch(next_epoch);
            conn.set_local_epoch(next_epoch);
        }

        self.packets = packets;
        Ok(HandshakeState::Sending)
    }

    fn send(&mut self, ctx: &Context, conn: &mut dyn FlightConn) -> Result<HandshakeState, Error> {
        if let Err(e) = ctx.check() {
            return Err(self.fail(conn, e.into()));
        }
        conn.write_packets(ctx, &self.packets, &self.state)?;

        if self.current.is_last_send_flight() {
            return Ok(HandshakeState::Finished);
        }

        self.resend_at = Some(Instant::now() + self.backoff.rto());
        Ok(HandshakeState::Waiting)
    }

    fn wait(&mut self, ctx: &Context, conn: &mut dyn FlightConn) -> Result<HandshakeState, Error> {
        loop {
            if let Err(e) = ctx.check() {
                return Err(self.fail(conn, e.into()));
            }

            let now = Instant::now();
            let resend_at = *self.resend_at.get_or_insert(now + self.backoff.rto());

            if now >= resend_at {
                if !self.backoff.attempt() {
                    warn!("No answer to {:?}, giving up", self.current);
                    return Err(Error::Timeout("flight retransmissions exhausted"));
                }
                debug!(
                    "Resend {:?}, next in {:.3}s",
                    self.current,
                    self.backoff.rto().as_secs_f32()
                );
                return Ok(HandshakeState::Sending);
            }

            let mut timeout = (resend_at - now).min(POLL_INTERVAL);
            if let Some(remaining) = ctx.remaining() {
                timeout = timeout.min(remaining);
            }

            let Some(arrival) = conn.recv_handshake().wait(timeout)? else {
                continue;
            };

            if arrival.is_retransmit {
                // The peer did not get our flight.
                debug!("Peer retransmitted, resend {:?}", self.current);
                return Ok(HandshakeState::Sending);
            }

            let parsed = self
                .current
                .parse(ctx, conn, &mut self.state, &self.cache, &self.cfg);
            // Acknowledge only after the cache has been looked at.
            drop(arrival);

            let next = match parsed {
                Ok(Some(next)) => next,
                Ok(None) => continue,
                Err(failure) => return Err(self.fail(conn, failure)),
            };

            if next.is_last_recv_flight() && next == self.current {
                return Ok(HandshakeState::Finished);
            }

            trace!("{:?} -> {:?}", self.current, next);
            self.current = next;
            return Ok(HandshakeState::Preparing);
        }
    }

    /// Send the failure's alert and turn it into the handshake error.
    fn fail(&self, conn: &mut dyn FlightConn, failure: FlightFailure) -> Error {
        debug!("{:?} failed: {}", self.current, failure);

        if let Some(alert) = &failure.alert {
            if let Err(e) = conn.notify(alert.level, alert.description) {
                warn!("Failed to send {:?} alert: {}", alert.description, e);
            }
        }

        failure.into_error()
    }
}

impl std::fmt::Debug for Handshaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handshaker")
            .field("current", &self.current)
            .field("handshake_state", &self.handshake_state)
            .field("state", &self.state)
            .finish()
    }
}
