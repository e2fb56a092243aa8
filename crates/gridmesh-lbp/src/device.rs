//! Joining-device bootstrap state machine.
//!
//! ```text
//! Idle → ParameterRequest → AwaitChallenge → RespondChallenge
//!      → AwaitAccept → Joined
//! ```
//!
//! The machine advances only on decoded frames and timer expiries.
//! `ParameterRequest` means the join request went out and the first
//! authentication message is awaited; `AwaitChallenge` means the proof
//! response went out and the protected challenge is awaited;
//! `RespondChallenge` is where that challenge's proofs and parameters
//! are validated — a bad proof dies here; `AwaitAccept` waits for the
//! final accept. Duplicate challenges are answered by resending the
//! original response without reprocessing, per the authentication
//! protocol's retransmission rule.
//!
//! A timeout aborts the attempt, zeroes the session secrets, and
//! retries up to the configured bound before reporting a terminal
//! result. The same machine also serves an already-joined device for
//! rekey exchanges and configuration pushes.

use tracing::{debug, info, warn};
use zeroize::Zeroize;

use gridmesh_crypto::block::BlockCipher;
use gridmesh_crypto::psk_kdf::{derive_psk_keys, derive_session_keys, PskKeys, SessionKeys};
use gridmesh_crypto::SecurityContext;
use gridmesh_mac::{ExtendedAddress, Transport};

use crate::eap::{self, Challenge, ChannelResult, EapCode, NetworkAccessId};
use crate::error::LbpError;
use crate::event::{DeviceOutput, JoinResult, RejectReason};
use crate::message::{LbpFrame, MessageType};
use crate::params::{self, ConfigParam, ParamResult};
use crate::pib::Pib;

/// Bootstrap progress of the joining device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Idle,
    ParameterRequest,
    AwaitChallenge,
    RespondChallenge,
    AwaitAccept,
    Joined,
}

impl JoinState {
    fn name(self) -> &'static str {
        match self {
            JoinState::Idle => "IDLE",
            JoinState::ParameterRequest => "PARAMETER_REQUEST",
            JoinState::AwaitChallenge => "AWAIT_CHALLENGE",
            JoinState::RespondChallenge => "RESPOND_CHALLENGE",
            JoinState::AwaitAccept => "AWAIT_ACCEPT",
            JoinState::Joined => "JOINED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Medium announced in outgoing bootstrap frames.
    pub media_type: Transport,
    pub disable_backup: bool,
    /// Full bootstrap attempts before reporting a timeout.
    pub max_retries: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            media_type: Transport::PowerLine,
            disable_backup: false,
            max_retries: 3,
        }
    }
}

/// Secrets and exchange state for one bootstrap attempt. Dropped (and
/// its keys zeroed) the moment the attempt ends, however it ends.
struct Session {
    psk_keys: PskKeys,
    session_keys: Option<SessionKeys>,
    rand_p: Option<Challenge>,
    rand_s: Option<Challenge>,
    id_s: Option<NetworkAccessId>,
    /// Last response sent, kept to answer duplicate requests.
    last_response: Option<Vec<u8>>,
}

/// The joining-device half of the bootstrap protocol.
pub struct Device<C: BlockCipher> {
    cipher: C,
    config: DeviceConfig,
    eui64: ExtendedAddress,
    pib: Pib,
    state: JoinState,
    rekeying: bool,
    retries: u8,
    deadline_ms: Option<u64>,
    session: Option<Session>,
    joining_short_id: Option<u16>,
    /// Keys received but not yet activated, by key slot.
    pending_gmk: [Option<[u8; 16]>; 2],
    pending_active_key: Option<u8>,
}

impl<C: BlockCipher> Device<C> {
    pub fn new(cipher: C, eui64: ExtendedAddress, pib: Pib, config: DeviceConfig) -> Self {
        Self {
            cipher,
            config,
            eui64,
            pib,
            state: JoinState::Idle,
            rekeying: false,
            retries: 0,
            deadline_ms: None,
            session: None,
            joining_short_id: None,
            pending_gmk: [None, None],
            pending_active_key: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> JoinState {
        self.state
    }

    #[must_use]
    pub fn pib(&self) -> &Pib {
        &self.pib
    }

    pub fn pib_mut(&mut self) -> &mut Pib {
        &mut self.pib
    }

    fn set_state(&mut self, state: JoinState) {
        debug!(from = self.state.name(), to = state.name(), "bootstrap state");
        self.state = state;
    }

    /// Begin a bootstrap attempt. Emits the join request and arms the
    /// response timer.
    pub fn start_join(&mut self, now_ms: u64) -> Vec<DeviceOutput> {
        self.clear_session();
        self.retries = 0;
        self.begin_attempt(now_ms)
    }

    fn begin_attempt(&mut self, now_ms: u64) -> Vec<DeviceOutput> {
        self.session = Some(Session {
            psk_keys: derive_psk_keys(&self.cipher, self.pib.psk()),
            session_keys: None,
            rand_p: None,
            rand_s: None,
            id_s: None,
            last_response: None,
        });
        self.set_state(JoinState::ParameterRequest);

        let frame = self.joining_frame(Vec::new());
        let deadline_ms = now_ms + self.pib.msg_timeout_ms();
        self.deadline_ms = Some(deadline_ms);
        info!(eui64 = %self.eui64, "join request sent");
        vec![
            DeviceOutput::Send(frame.encode()),
            DeviceOutput::StartTimer { deadline_ms },
        ]
    }

    fn joining_frame(&self, payload: Vec<u8>) -> LbpFrame {
        let (media, backup) = if self.rekeying {
            // Rekey traffic pins the media fields to zero.
            (Transport::PowerLine, false)
        } else {
            (self.config.media_type, self.config.disable_backup)
        };
        LbpFrame::new(MessageType::Joining, media, backup, self.eui64, payload)
    }

    /// Feed a received bootstrap NSDU into the machine.
    pub fn handle_frame(
        &mut self,
        ctx: &mut SecurityContext<C>,
        nsdu: &[u8],
        now_ms: u64,
    ) -> Result<Vec<DeviceOutput>, LbpError> {
        let frame = LbpFrame::decode(nsdu)?;
        if frame.eui64 != self.eui64 {
            debug!(eui64 = %frame.eui64, "bootstrap frame for another device dropped");
            return Ok(Vec::new());
        }

        match frame.msg_type {
            MessageType::Challenge => self.on_challenge(&frame.payload, now_ms),
            MessageType::Accepted => self.on_accepted(ctx, &frame.payload, now_ms),
            MessageType::Decline => Ok(self.on_decline()),
            MessageType::KickToDevice => Ok(self.on_kick()),
            MessageType::Joining | MessageType::KickFromDevice => {
                warn!(state = self.state.name(), "device-direction message dropped");
                Ok(Vec::new())
            }
        }
    }

    fn on_challenge(
        &mut self,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Vec<DeviceOutput>, LbpError> {
        let envelope = eap::decode(payload)?;
        if envelope.code != EapCode::Request {
            warn!("challenge without a request code dropped");
            return Ok(Vec::new());
        }

        match envelope.t_subfield {
            eap::T0 => self.on_first_message(envelope.identifier, envelope.data, now_ms),
            eap::T2 => self.on_third_message(envelope.identifier, payload, now_ms),
            _ => {
                warn!(t = envelope.t_subfield, "unexpected challenge subtype dropped");
                Ok(Vec::new())
            }
        }
    }

    /// First authentication message: the coordinator's challenge and
    /// identity. Answered with our challenge and proof.
    fn on_first_message(
        &mut self,
        identifier: u8,
        data: &[u8],
        now_ms: u64,
    ) -> Result<Vec<DeviceOutput>, LbpError> {
        match self.state {
            JoinState::ParameterRequest
            | JoinState::AwaitChallenge
            | JoinState::AwaitAccept => {}
            JoinState::Joined => {
                // Rekey: the coordinator re-runs the exchange under a
                // fresh session.
                self.rekeying = true;
                self.session = Some(Session {
                    psk_keys: derive_psk_keys(&self.cipher, self.pib.psk()),
                    session_keys: None,
                    rand_p: None,
                    rand_s: None,
                    id_s: None,
                    last_response: None,
                });
                let deadline_ms = now_ms + self.pib.msg_timeout_ms();
                self.deadline_ms = Some(deadline_ms);
            }
            JoinState::Idle | JoinState::RespondChallenge => {
                return Err(LbpError::OutOfSequence {
                    state: self.state.name(),
                });
            }
        }

        let (rand_s, id_s) = eap::decode_message1(data)?;

        let session = self.session.as_mut().ok_or(LbpError::OutOfSequence {
            state: self.state.name(),
        })?;

        // A valid duplicate gets the original response resent without
        // reprocessing.
        let repetition =
            session.rand_s == Some(rand_s) && session.id_s.as_ref() == Some(&id_s);
        if repetition {
            if let Some(response) = session.last_response.clone() {
                debug!("duplicate challenge, resending response");
                return Ok(vec![DeviceOutput::Send(response)]);
            }
        }

        let rand_p = self
            .pib
            .random_challenge()
            .map(Challenge)
            .unwrap_or_else(Challenge::generate);
        session.rand_s = Some(rand_s);
        session.id_s = Some(id_s);
        session.rand_p = Some(rand_p);
        session.session_keys = Some(derive_session_keys(
            &self.cipher,
            &session.psk_keys.kdk,
            &rand_p.0,
        ));

        let message2 = eap::encode_message2(
            &self.cipher,
            &session.psk_keys.ak,
            identifier,
            &rand_s,
            &rand_p,
            session.id_s.as_ref().expect("just stored"),
            &self.pib.id_p(),
        );
        let frame = self.joining_frame(message2);
        let encoded = frame.encode();
        if let Some(session) = self.session.as_mut() {
            session.last_response = Some(encoded.clone());
        }

        self.set_state(JoinState::AwaitChallenge);
        let deadline_ms = now_ms + self.pib.msg_timeout_ms();
        self.deadline_ms = Some(deadline_ms);
        Ok(vec![
            DeviceOutput::Send(encoded),
            DeviceOutput::StartTimer { deadline_ms },
        ])
    }

    /// Third authentication message: the protected challenge carrying
    /// the join parameters. Proof validation happens here.
    fn on_third_message(
        &mut self,
        identifier: u8,
        message: &[u8],
        now_ms: u64,
    ) -> Result<Vec<DeviceOutput>, LbpError> {
        match self.state {
            JoinState::AwaitChallenge | JoinState::AwaitAccept => {}
            _ => {
                return Err(LbpError::OutOfSequence {
                    state: self.state.name(),
                });
            }
        }
        self.set_state(JoinState::RespondChallenge);

        let (decoded, rand_s) = {
            let session = self.session.as_ref().ok_or(LbpError::OutOfSequence {
                state: self.state.name(),
            })?;
            let (Some(keys), Some(rand_p), Some(id_s), Some(rand_s)) = (
                session.session_keys.as_ref(),
                session.rand_p.as_ref(),
                session.id_s.as_ref(),
                session.rand_s,
            ) else {
                return Err(LbpError::OutOfSequence {
                    state: self.state.name(),
                });
            };

            let decoded = match eap::decode_message3(
                &self.cipher,
                &session.psk_keys.ak,
                &keys.tek,
                id_s,
                rand_p,
                message,
            ) {
                Ok(decoded) => decoded,
                Err(err) => {
                    // Unverifiable challenge: drop and let the timer
                    // handle a silent or hostile coordinator.
                    warn!(%err, "protected challenge failed validation");
                    self.set_state(JoinState::AwaitChallenge);
                    return Ok(Vec::new());
                }
            };
            (decoded, rand_s)
        };

        if decoded.rand_s != rand_s || decoded.result != ChannelResult::DoneSuccess {
            warn!("protected challenge mismatch, waiting for timeout");
            self.set_state(JoinState::AwaitChallenge);
            return Ok(Vec::new());
        }

        // Apply the configuration parameters, collecting the result TLV.
        let (channel_result, result_param) = self.apply_parameters(&decoded.data);

        let session = self.session.as_ref().ok_or(LbpError::OutOfSequence {
            state: self.state.name(),
        })?;
        let keys = session.session_keys.as_ref().ok_or(LbpError::OutOfSequence {
            state: self.state.name(),
        })?;
        let message4 = eap::encode_message4(
            &self.cipher,
            &keys.tek,
            identifier,
            &rand_s,
            decoded.nonce + 1,
            channel_result,
            &params::encode_channel(&[result_param]),
        );
        let frame = self.joining_frame(message4);
        let encoded = frame.encode();
        if let Some(session) = self.session.as_mut() {
            session.last_response = Some(encoded.clone());
        }

        self.set_state(JoinState::AwaitAccept);
        let deadline_ms = now_ms + self.pib.msg_timeout_ms();
        self.deadline_ms = Some(deadline_ms);
        Ok(vec![
            DeviceOutput::Send(encoded),
            DeviceOutput::StartTimer { deadline_ms },
        ])
    }

    /// Stage the received parameters; nothing commits until the accept.
    fn apply_parameters(&mut self, data: &[u8]) -> (ChannelResult, ConfigParam) {
        let failure = |result: ParamResult, param_id: u8| {
            (
                ChannelResult::DoneFailure,
                ConfigParam::Result { result, param_id },
            )
        };

        let parsed = match params::decode_channel(data) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%err, "unusable configuration parameters");
                return failure(ParamResult::UnknownId, 0);
            }
        };

        let mut got_short = false;
        let mut got_gmk = false;
        let mut got_activation = false;
        let mut staged_gmk = [None, None];
        let mut staged_active = None;

        for param in &parsed {
            match param {
                ConfigParam::ShortAddr(addr) => {
                    self.joining_short_id = Some(*addr);
                    got_short = true;
                }
                ConfigParam::Gmk { key_id, key } => {
                    if *key_id > 1 {
                        return failure(ParamResult::InvalidValue, 0x27);
                    }
                    staged_gmk[usize::from(*key_id)] = Some(*key);
                    got_gmk = true;
                }
                ConfigParam::GmkActivation { key_id } => {
                    if *key_id > 1 {
                        return failure(ParamResult::InvalidValue, 0x2B);
                    }
                    staged_active = Some(*key_id);
                    got_activation = true;
                }
                ConfigParam::GmkRemoval { key_id } => {
                    if *key_id <= 1 {
                        self.pending_gmk[usize::from(*key_id)] = None;
                    }
                }
                ConfigParam::Result { .. } => {}
            }
        }

        if self.state != JoinState::Joined && !self.rekeying {
            // An initial join must deliver address, key, and activation.
            if !got_short {
                return failure(ParamResult::MissingRequired, 0x1D);
            }
            if !got_gmk {
                return failure(ParamResult::MissingRequired, 0x27);
            }
            if !got_activation {
                return failure(ParamResult::MissingRequired, 0x2B);
            }
        }

        if let Some(active) = staged_active {
            let known = staged_gmk[usize::from(active)].is_some()
                || self.pending_gmk[usize::from(active)].is_some();
            if !known {
                return failure(ParamResult::InvalidValue, 0x2B);
            }
        }

        for (slot, staged) in self.pending_gmk.iter_mut().zip(staged_gmk) {
            if let Some(key) = staged {
                *slot = Some(key);
            }
        }
        if let Some(active) = staged_active {
            self.pending_active_key = Some(active);
        }

        (
            ChannelResult::DoneSuccess,
            ConfigParam::Result {
                result: ParamResult::Success,
                param_id: 0,
            },
        )
    }

    fn on_accepted(
        &mut self,
        ctx: &mut SecurityContext<C>,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Vec<DeviceOutput>, LbpError> {
        if payload.is_empty() {
            return Err(LbpError::TooShort { min: 4, actual: 0 });
        }

        // Even first octet: embedded EAP message. Odd: bare
        // configuration push.
        if payload[0] & 0x01 == 0 {
            if self.state != JoinState::AwaitAccept {
                warn!(state = self.state.name(), "unexpected accept dropped");
                return Ok(Vec::new());
            }
            self.on_accepted_eap(ctx, payload, now_ms)
        } else {
            if self.state != JoinState::Joined {
                warn!(state = self.state.name(), "configuration push before join dropped");
                return Ok(Vec::new());
            }
            self.on_configuration_push(ctx, payload, now_ms)
        }
    }

    fn on_accepted_eap(
        &mut self,
        ctx: &mut SecurityContext<C>,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Vec<DeviceOutput>, LbpError> {
        let envelope = eap::decode(payload)?;
        match envelope.code {
            EapCode::Success => {
                let Some(active) = self.pending_active_key else {
                    return Err(LbpError::Malformed("accept without an activated key"));
                };
                let Some(gmk) = self.pending_gmk[usize::from(active)] else {
                    return Err(LbpError::Malformed("activated key was never delivered"));
                };

                ctx.install_key(gmk, active, now_ms);
                let was_rekey = self.rekeying;
                self.rekeying = false;
                self.deadline_ms = None;
                self.clear_session();
                self.set_state(JoinState::Joined);

                let mut outputs = vec![DeviceOutput::CancelTimer];
                if was_rekey {
                    info!(key_id = active, "rekey complete");
                } else {
                    let short_id = self.joining_short_id.unwrap_or(0xFFFF);
                    let _ = self
                        .pib
                        .set(crate::pib::Attribute::ShortId, 0, &short_id.to_be_bytes());
                    info!(short_id, "join complete");
                    outputs.push(DeviceOutput::Result(JoinResult::Joined { short_id, gmk }));
                }
                Ok(outputs)
            }
            EapCode::Failure => {
                info!("join refused by coordinator");
                Ok(self.fail(RejectReason::NotPermitted))
            }
            _ => Err(LbpError::Malformed("accept with a non-terminal EAP code")),
        }
    }

    /// Bare configuration TLVs pushed after join (key distribution,
    /// activation, removal). Answered with a result report.
    fn on_configuration_push(
        &mut self,
        ctx: &mut SecurityContext<C>,
        payload: &[u8],
        now_ms: u64,
    ) -> Result<Vec<DeviceOutput>, LbpError> {
        let result = match params::decode_bare(payload) {
            Ok(parsed) => {
                let mut result = ConfigParam::Result {
                    result: ParamResult::Success,
                    param_id: 0,
                };
                for param in &parsed {
                    match param {
                        ConfigParam::Gmk { key_id, key } if *key_id <= 1 => {
                            self.pending_gmk[usize::from(*key_id)] = Some(*key);
                        }
                        ConfigParam::GmkActivation { key_id } if *key_id <= 1 => {
                            if let Some(gmk) = self.pending_gmk[usize::from(*key_id)] {
                                ctx.install_key(gmk, *key_id, now_ms);
                                info!(key_id, "group key activated");
                            } else {
                                result = ConfigParam::Result {
                                    result: ParamResult::InvalidValue,
                                    param_id: 0x2B,
                                };
                            }
                        }
                        ConfigParam::GmkRemoval { key_id } if *key_id <= 1 => {
                            if let Some(slot) = self.pending_gmk.get_mut(usize::from(*key_id)) {
                                if let Some(key) = slot.as_mut() {
                                    key.zeroize();
                                }
                                *slot = None;
                            }
                        }
                        _ => {
                            result = ConfigParam::Result {
                                result: ParamResult::UnknownId,
                                param_id: 0,
                            };
                        }
                    }
                }
                result
            }
            Err(err) => {
                warn!(%err, "unusable configuration push");
                ConfigParam::Result {
                    result: ParamResult::InvalidValue,
                    param_id: 0,
                }
            }
        };

        let frame = self.joining_frame(params::encode_bare(&[result]));
        Ok(vec![DeviceOutput::Send(frame.encode())])
    }

    fn on_decline(&mut self) -> Vec<DeviceOutput> {
        match self.state {
            JoinState::Idle | JoinState::Joined => Vec::new(),
            _ => {
                info!("join declined");
                self.fail(RejectReason::Declined)
            }
        }
    }

    fn on_kick(&mut self) -> Vec<DeviceOutput> {
        if self.state != JoinState::Joined {
            return Vec::new();
        }
        info!("kicked from the mesh");
        self.clear_session();
        self.pending_gmk = [None, None];
        self.pending_active_key = None;
        self.set_state(JoinState::Idle);
        vec![DeviceOutput::Kicked]
    }

    /// Timer expiry. Retries the whole bootstrap up to the configured
    /// bound, then reports a terminal timeout.
    pub fn handle_timer(&mut self, now_ms: u64) -> Vec<DeviceOutput> {
        let Some(deadline) = self.deadline_ms else {
            return Vec::new();
        };
        if now_ms < deadline {
            return Vec::new();
        }
        self.deadline_ms = None;

        if self.rekeying {
            // The rekey exchange died; the old key stays in service.
            warn!("rekey exchange timed out");
            self.rekeying = false;
            self.clear_session();
            self.set_state(JoinState::Joined);
            return Vec::new();
        }

        match self.state {
            JoinState::Idle | JoinState::Joined => Vec::new(),
            _ => {
                self.clear_session();
                if self.retries + 1 < self.config.max_retries {
                    self.retries += 1;
                    warn!(attempt = self.retries + 1, "bootstrap timed out, retrying");
                    self.begin_attempt(now_ms)
                } else {
                    warn!("bootstrap timed out, giving up");
                    self.set_state(JoinState::Idle);
                    vec![DeviceOutput::Result(JoinResult::TimedOut)]
                }
            }
        }
    }

    /// Voluntarily leave the mesh.
    pub fn leave(&mut self) -> Vec<DeviceOutput> {
        if self.state != JoinState::Joined {
            return Vec::new();
        }
        let frame = LbpFrame::new(
            MessageType::KickFromDevice,
            Transport::PowerLine,
            false,
            self.eui64,
            Vec::new(),
        );
        self.pending_gmk = [None, None];
        self.pending_active_key = None;
        self.set_state(JoinState::Idle);
        vec![DeviceOutput::Send(frame.encode())]
    }

    /// Abandon any in-flight attempt immediately. Session secrets are
    /// zeroed and no timer or retry will fire afterwards.
    pub fn abandon(&mut self) {
        self.clear_session();
        self.deadline_ms = None;
        self.retries = 0;
        self.rekeying = false;
        if self.state != JoinState::Joined {
            self.set_state(JoinState::Idle);
        }
    }

    fn fail(&mut self, reason: RejectReason) -> Vec<DeviceOutput> {
        self.clear_session();
        self.deadline_ms = None;
        self.set_state(JoinState::Idle);
        vec![
            DeviceOutput::CancelTimer,
            DeviceOutput::Result(JoinResult::Rejected(reason)),
        ]
    }

    /// Drop the session; PSK-derived secrets zero themselves on drop.
    fn clear_session(&mut self) {
        self.session = None;
    }
}
