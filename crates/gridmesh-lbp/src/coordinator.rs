//! Coordinator-side bootstrap: admission, key distribution, rekey.
//!
//! ```text
//! Idle → ReceivedJoinRequest → ValidateProof → Accept | Reject → Idle
//! ```
//!
//! One session slot per joining device, bounded by the configured
//! pool. `ReceivedJoinRequest` covers a join request that passed the
//! admission policy and was answered with the first challenge;
//! `ValidateProof` covers the window where the device's proofs are
//! checked — its challenge response on entry, its protected answer on
//! exit. Either proof failing rejects the device with a decline;
//! success accepts it with the group key and short address already
//! delivered through the protected channel.
//!
//! Rekey runs in two phases, as a distribution exchange per joined
//! device (a fresh authentication carrying only the new key in the
//! spare slot) followed by a broadcast activation push. Frames in
//! flight under the old key id stay decodable for the security
//! context's overlap window.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use gridmesh_crypto::block::BlockCipher;
use gridmesh_crypto::psk_kdf::{derive_psk_keys, derive_session_keys, PskKeys, SessionKeys};
use gridmesh_crypto::SecurityContext;
use gridmesh_mac::{ExtendedAddress, Transport};

use crate::eap::{self, Challenge, ChannelResult, EapCode};
use crate::error::LbpError;
use crate::event::{CoordinatorOutput, RejectReason};
use crate::message::{LbpFrame, MessageType};
use crate::params::{self, ConfigParam};
use crate::pib::{DeviceBand, Pib};

/// Progress of one admission session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Join request admitted, first challenge sent.
    ReceivedJoinRequest,
    /// Proof exchange underway: challenge response verified, protected
    /// answer awaited.
    ValidateProof,
}

/// Lets the adaptation layer veto an otherwise-valid join or choose
/// the short address handed out.
pub trait AdmitPolicy {
    fn admit(&mut self, eui64: &ExtendedAddress) -> AdmitDecision;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitDecision {
    Accept { short_id: u16 },
    Reject,
}

/// Hands out short addresses sequentially.
#[derive(Debug, Default)]
pub struct SequentialAdmit {
    last: u16,
}

impl AdmitPolicy for SequentialAdmit {
    fn admit(&mut self, _eui64: &ExtendedAddress) -> AdmitDecision {
        self.last += 1;
        AdmitDecision::Accept {
            short_id: self.last,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Concurrent admission sessions.
    pub max_sessions: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { max_sessions: 16 }
    }
}

/// One joining device's session material.
struct Slot {
    eui64: ExtendedAddress,
    state: SessionState,
    rand_s: Challenge,
    psk_keys: PskKeys,
    session_keys: Option<SessionKeys>,
    sent_nonce: u32,
    assigned_short_id: u16,
    deadline_ms: u64,
    /// Distribution exchange of a rekey rather than a fresh join.
    rekey: bool,
}

/// The coordinator half of the bootstrap protocol.
pub struct Coordinator<C: BlockCipher, P: AdmitPolicy> {
    cipher: C,
    config: CoordinatorConfig,
    pib: Pib,
    policy: P,
    slots: Vec<Slot>,
    joined: HashMap<[u8; 8], u16>,
    eap_identifier: u8,
    current_key_id: u8,
    rekey_phase: bool,
}

impl<C: BlockCipher, P: AdmitPolicy> Coordinator<C, P> {
    pub fn new(cipher: C, pib: Pib, policy: P, config: CoordinatorConfig) -> Self {
        Self {
            cipher,
            config,
            pib,
            policy,
            slots: Vec::new(),
            joined: HashMap::new(),
            eap_identifier: 0,
            current_key_id: 0,
            rekey_phase: false,
        }
    }

    #[must_use]
    pub fn pib(&self) -> &Pib {
        &self.pib
    }

    pub fn pib_mut(&mut self) -> &mut Pib {
        &mut self.pib
    }

    /// Key id in service for newly admitted devices.
    #[must_use]
    pub fn current_key_id(&self) -> u8 {
        self.current_key_id
    }

    /// Whether a rekey distribution phase is underway.
    #[must_use]
    pub fn rekey_in_progress(&self) -> bool {
        self.rekey_phase
    }

    /// Devices currently joined, as (EUI-64, short address) pairs.
    pub fn joined_devices(&self) -> impl Iterator<Item = (ExtendedAddress, u16)> + '_ {
        self.joined
            .iter()
            .map(|(eui, &short)| (ExtendedAddress::new(*eui), short))
    }

    fn next_identifier(&mut self) -> u8 {
        let id = self.eap_identifier;
        self.eap_identifier = self.eap_identifier.wrapping_add(1);
        id
    }

    fn slot_index(&self, eui64: &ExtendedAddress) -> Option<usize> {
        self.slots.iter().position(|slot| slot.eui64 == *eui64)
    }

    fn release_slot(&mut self, index: usize) {
        // Dropping the slot zeroes its derived keys.
        self.slots.swap_remove(index);
    }

    /// Feed a received bootstrap NSDU into the machine.
    pub fn handle_frame(
        &mut self,
        nsdu: &[u8],
        now_ms: u64,
    ) -> Result<Vec<CoordinatorOutput>, LbpError> {
        let frame = LbpFrame::decode(nsdu)?;
        match frame.msg_type {
            MessageType::Joining if frame.payload.is_empty() => {
                Ok(self.on_join_request(&frame, now_ms))
            }
            MessageType::Joining if frame.payload[0] & 0x01 != 0 => {
                // Parameter-result answer to a configuration push.
                match params::decode_bare(&frame.payload) {
                    Ok(results) => debug!(eui64 = %frame.eui64, ?results, "configuration result"),
                    Err(err) => warn!(eui64 = %frame.eui64, %err, "unreadable configuration result"),
                }
                Ok(Vec::new())
            }
            MessageType::Joining => self.on_eap_response(&frame, now_ms),
            MessageType::KickFromDevice => Ok(self.on_device_leave(&frame.eui64)),
            MessageType::Accepted
            | MessageType::Challenge
            | MessageType::Decline
            | MessageType::KickToDevice => {
                warn!("coordinator-direction message dropped");
                Ok(Vec::new())
            }
        }
    }

    /// A fresh join request: consult the admission policy and open a
    /// session with the first challenge.
    fn on_join_request(&mut self, frame: &LbpFrame, now_ms: u64) -> Vec<CoordinatorOutput> {
        // A device restarting its bootstrap abandons any old session.
        if let Some(index) = self.slot_index(&frame.eui64) {
            self.release_slot(index);
        }

        let short_id = match self.policy.admit(&frame.eui64) {
            AdmitDecision::Accept { short_id } => short_id,
            AdmitDecision::Reject => {
                info!(eui64 = %frame.eui64, "join vetoed by admission policy");
                return self.decline(frame, RejectReason::NotPermitted);
            }
        };

        if self.slots.len() >= self.config.max_sessions {
            warn!(eui64 = %frame.eui64, "no free session slot");
            return self.decline(frame, RejectReason::NotPermitted);
        }

        let rand_s = Challenge::generate();
        let identifier = self.next_identifier();
        let message1 = eap::encode_message1(identifier, &rand_s, &self.pib.id_s());

        self.slots.push(Slot {
            eui64: frame.eui64,
            state: SessionState::ReceivedJoinRequest,
            rand_s,
            psk_keys: derive_psk_keys(&self.cipher, self.pib.psk()),
            session_keys: None,
            sent_nonce: 0,
            assigned_short_id: short_id,
            deadline_ms: now_ms + self.pib.msg_timeout_ms(),
            rekey: false,
        });

        info!(eui64 = %frame.eui64, short_id, "join request admitted");
        vec![CoordinatorOutput::Send {
            eui64: frame.eui64,
            nsdu: self.challenge_frame(frame, message1).encode(),
        }]
    }

    fn challenge_frame(&self, from: &LbpFrame, payload: Vec<u8>) -> LbpFrame {
        LbpFrame::new(
            MessageType::Challenge,
            from.media_type,
            from.disable_backup,
            from.eui64,
            payload,
        )
    }

    fn on_eap_response(
        &mut self,
        frame: &LbpFrame,
        now_ms: u64,
    ) -> Result<Vec<CoordinatorOutput>, LbpError> {
        let envelope = eap::decode(&frame.payload)?;
        if envelope.code != EapCode::Response {
            warn!("non-response authentication message dropped");
            return Ok(Vec::new());
        }

        let Some(index) = self.slot_index(&frame.eui64) else {
            warn!(eui64 = %frame.eui64, "authentication response without a session");
            return Ok(Vec::new());
        };

        match envelope.t_subfield {
            eap::T1 => Ok(self.on_challenge_response(index, frame, envelope.data, now_ms)),
            eap::T3 => Ok(self.on_protected_answer(index, frame)),
            _ => {
                warn!(t = envelope.t_subfield, "unexpected response subtype dropped");
                Ok(Vec::new())
            }
        }
    }

    /// The device's challenge response: verify its proof and send the
    /// protected parameters. Entry into `ValidateProof`.
    fn on_challenge_response(
        &mut self,
        index: usize,
        frame: &LbpFrame,
        data: &[u8],
        now_ms: u64,
    ) -> Vec<CoordinatorOutput> {
        if self.slots[index].state != SessionState::ReceivedJoinRequest {
            warn!(eui64 = %frame.eui64, "duplicate challenge response dropped");
            return Vec::new();
        }

        let arib = self.pib.band() == DeviceBand::Arib;
        let id_s = self.pib.id_s();
        let decoded = {
            let slot = &self.slots[index];
            eap::decode_message2(&self.cipher, &slot.psk_keys.ak, arib, &id_s, data)
                .and_then(|(rand_s, rand_p)| {
                    if rand_s == slot.rand_s {
                        Ok(rand_p)
                    } else {
                        Err(LbpError::ChallengeMismatch)
                    }
                })
        };

        let rand_p = match decoded {
            Ok(rand_p) => rand_p,
            Err(err) => {
                // Wrong PSK or a stale challenge: the proof does not
                // verify and the device is rejected.
                info!(eui64 = %frame.eui64, %err, "proof validation failed");
                self.release_slot(index);
                return self.decline(frame, RejectReason::NotPermitted);
            }
        };

        let session_keys = derive_session_keys(
            &self.cipher,
            &self.slots[index].psk_keys.kdk,
            &rand_p.0,
        );

        let rekey = self.slots[index].rekey;
        let config_params = if rekey {
            vec![ConfigParam::Gmk {
                key_id: self.spare_key_id(),
                key: *self.pib.rekey_gmk(),
            }]
        } else {
            vec![
                ConfigParam::ShortAddr(self.slots[index].assigned_short_id),
                ConfigParam::Gmk {
                    key_id: self.current_key_id,
                    key: *self.pib.gmk(usize::from(self.current_key_id)),
                },
                ConfigParam::GmkActivation {
                    key_id: self.current_key_id,
                },
            ]
        };

        let identifier = self.next_identifier();
        let nonce = self.slots[index].sent_nonce;
        let message3 = eap::encode_message3(
            &self.cipher,
            &self.slots[index].psk_keys.ak,
            &session_keys.tek,
            identifier,
            &self.slots[index].rand_s,
            &rand_p,
            &id_s,
            nonce,
            ChannelResult::DoneSuccess,
            &params::encode_channel(&config_params),
        );

        let slot = &mut self.slots[index];
        slot.session_keys = Some(session_keys);
        slot.state = SessionState::ValidateProof;
        slot.deadline_ms = now_ms + self.pib.msg_timeout_ms();

        debug!(eui64 = %frame.eui64, "protected parameters sent");
        vec![CoordinatorOutput::Send {
            eui64: frame.eui64,
            nsdu: self.challenge_frame(frame, message3).encode(),
        }]
    }

    /// The device's protected answer: the final proof. Exit from
    /// `ValidateProof` into Accept or Reject.
    fn on_protected_answer(&mut self, index: usize, frame: &LbpFrame) -> Vec<CoordinatorOutput> {
        if self.slots[index].state != SessionState::ValidateProof {
            warn!(eui64 = %frame.eui64, "unexpected protected answer dropped");
            return Vec::new();
        }

        if self.slots[index].session_keys.is_none() {
            self.release_slot(index);
            return self.decline(frame, RejectReason::NotPermitted);
        }

        let verdict = {
            let slot = &self.slots[index];
            let keys = slot
                .session_keys
                .as_ref()
                .expect("session key presence checked above");
            eap::decode_message4(&self.cipher, &keys.tek, &frame.payload).and_then(|answer| {
                if answer.rand_s != slot.rand_s {
                    Err(LbpError::ChallengeMismatch)
                } else if answer.nonce != slot.sent_nonce + 1 {
                    Err(LbpError::Malformed("channel nonce did not advance"))
                } else if answer.result != ChannelResult::DoneSuccess {
                    Err(LbpError::Malformed("device reported parameter failure"))
                } else {
                    Ok(())
                }
            })
        };

        let rekey = self.slots[index].rekey;
        let short_id = self.slots[index].assigned_short_id;
        let eui64 = frame.eui64;
        match verdict {
            Ok(()) => {
                self.release_slot(index);
                let identifier = self.next_identifier();
                let accepted = LbpFrame::new(
                    MessageType::Accepted,
                    frame.media_type,
                    frame.disable_backup,
                    eui64,
                    eap::encode_success(identifier),
                );

                let mut outputs = vec![CoordinatorOutput::Send {
                    eui64,
                    nsdu: accepted.encode(),
                }];
                if !rekey {
                    self.joined.insert(eui64.to_bytes(), short_id);
                    outputs.push(CoordinatorOutput::DeviceJoined { eui64, short_id });
                    info!(eui64 = %eui64, short_id, "device joined");
                } else {
                    info!(eui64 = %eui64, "rekey distribution acknowledged");
                }
                outputs
            }
            Err(err) => {
                info!(eui64 = %eui64, %err, "final proof validation failed");
                self.release_slot(index);
                self.decline(frame, RejectReason::NotPermitted)
            }
        }
    }

    fn decline(&mut self, frame: &LbpFrame, reason: RejectReason) -> Vec<CoordinatorOutput> {
        let identifier = self.next_identifier();
        let decline = LbpFrame::new(
            MessageType::Decline,
            frame.media_type,
            frame.disable_backup,
            frame.eui64,
            eap::encode_failure(identifier),
        );
        vec![
            CoordinatorOutput::Send {
                eui64: frame.eui64,
                nsdu: decline.encode(),
            },
            CoordinatorOutput::DeviceRejected {
                eui64: frame.eui64,
                reason,
            },
        ]
    }

    fn on_device_leave(&mut self, eui64: &ExtendedAddress) -> Vec<CoordinatorOutput> {
        if let Some(index) = self.slot_index(eui64) {
            self.release_slot(index);
        }
        if self.joined.remove(&eui64.to_bytes()).is_some() {
            info!(eui64 = %eui64, "device left the mesh");
            vec![CoordinatorOutput::DeviceLeft { eui64: *eui64 }]
        } else {
            Vec::new()
        }
    }

    /// Remove a device from the mesh.
    pub fn kick(&mut self, eui64: &ExtendedAddress) -> Vec<CoordinatorOutput> {
        if self.joined.remove(&eui64.to_bytes()).is_none() {
            return Vec::new();
        }
        let frame = LbpFrame::new(
            MessageType::KickToDevice,
            Transport::PowerLine,
            false,
            *eui64,
            Vec::new(),
        );
        info!(eui64 = %eui64, "device kicked");
        vec![
            CoordinatorOutput::Send {
                eui64: *eui64,
                nsdu: frame.encode(),
            },
            CoordinatorOutput::DeviceLeft { eui64: *eui64 },
        ]
    }

    /// Expire overdue sessions. Their secrets are zeroed; the devices
    /// will time out and retry on their side.
    pub fn check_timeouts(&mut self, now_ms: u64) {
        self.slots.retain(|slot| {
            let keep = now_ms < slot.deadline_ms;
            if !keep {
                warn!(eui64 = %slot.eui64, "admission session timed out");
            }
            keep
        });
    }

    fn spare_key_id(&self) -> u8 {
        if self.current_key_id == 0 {
            1
        } else {
            0
        }
    }

    /// Phase one of a rekey: run a distribution exchange with every
    /// joined device, carrying the new group key in the spare slot.
    pub fn start_rekey(&mut self, now_ms: u64) -> Vec<CoordinatorOutput> {
        self.rekey_phase = true;
        let devices: Vec<ExtendedAddress> = self
            .joined
            .keys()
            .map(|eui| ExtendedAddress::new(*eui))
            .collect();

        let mut outputs = Vec::with_capacity(devices.len());
        for eui64 in devices {
            if self.slots.len() >= self.config.max_sessions {
                warn!(eui64 = %eui64, "rekey deferred, session pool exhausted");
                continue;
            }
            if let Some(index) = self.slot_index(&eui64) {
                self.release_slot(index);
            }

            let rand_s = Challenge::generate();
            let identifier = self.next_identifier();
            let message1 = eap::encode_message1(identifier, &rand_s, &self.pib.id_s());
            let short_id = self.joined[&eui64.to_bytes()];

            self.slots.push(Slot {
                eui64,
                state: SessionState::ReceivedJoinRequest,
                rand_s,
                psk_keys: derive_psk_keys(&self.cipher, self.pib.psk()),
                session_keys: None,
                sent_nonce: 0,
                assigned_short_id: short_id,
                deadline_ms: now_ms + self.pib.msg_timeout_ms(),
                rekey: true,
            });

            // Rekey frames pin the media fields to zero.
            let frame = LbpFrame::new(
                MessageType::Challenge,
                Transport::PowerLine,
                false,
                eui64,
                message1,
            );
            outputs.push(CoordinatorOutput::Send {
                eui64,
                nsdu: frame.encode(),
            });
        }
        info!(devices = outputs.len(), "rekey distribution started");
        outputs
    }

    /// Phase two of a rekey: push the activation to every joined
    /// device and swap our own context to the new key. The superseded
    /// key id stays decodable for the context's overlap window.
    pub fn activate_rekey(
        &mut self,
        ctx: &mut SecurityContext<C>,
        now_ms: u64,
    ) -> Vec<CoordinatorOutput> {
        let new_key_id = self.spare_key_id();
        let push = params::encode_bare(&[ConfigParam::GmkActivation { key_id: new_key_id }]);

        let mut outputs = Vec::with_capacity(self.joined.len());
        for eui in self.joined.keys() {
            let eui64 = ExtendedAddress::new(*eui);
            let frame = LbpFrame::new(
                MessageType::Accepted,
                Transport::PowerLine,
                false,
                eui64,
                push.clone(),
            );
            outputs.push(CoordinatorOutput::Send {
                eui64,
                nsdu: frame.encode(),
            });
        }

        let new_gmk = *self.pib.rekey_gmk();
        ctx.install_key(new_gmk, new_key_id, now_ms);
        let _ = self
            .pib
            .set(crate::pib::Attribute::Gmk, u16::from(new_key_id), &new_gmk);
        self.current_key_id = new_key_id;
        self.rekey_phase = false;
        info!(key_id = new_key_id, "rekey activated");
        outputs
    }
}
