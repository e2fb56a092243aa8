//! Configuration-parameter TLVs carried in the protected channel.
//!
//! Each parameter is `id(1) || len(1) || value`. The channel payload
//! opens with the configuration extension marker (0x02) when TLVs
//! follow. Parameter ids are odd on purpose: the first octet of an
//! Accepted payload distinguishes an embedded EAP message (even code)
//! from a bare configuration push (odd TLV id).

use crate::error::LbpError;

/// Extension-field marker for configuration parameters.
pub const EXT_TYPE_CONFIG: u8 = 0x02;

const PARAM_SHORT_ADDR: u8 = 0x1D;
const PARAM_GMK: u8 = 0x27;
const PARAM_GMK_ACTIVATION: u8 = 0x2B;
const PARAM_GMK_REMOVAL: u8 = 0x2F;
const PARAM_RESULT: u8 = 0x31;

/// Outcome code carried in a `Result` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParamResult {
    Success = 0x00,
    MissingRequired = 0x01,
    InvalidValue = 0x02,
    UnknownId = 0x03,
}

impl ParamResult {
    pub fn from_u8(v: u8) -> Result<Self, LbpError> {
        match v {
            0x00 => Ok(ParamResult::Success),
            0x01 => Ok(ParamResult::MissingRequired),
            0x02 => Ok(ParamResult::InvalidValue),
            0x03 => Ok(ParamResult::UnknownId),
            _ => Err(LbpError::Malformed("unknown parameter result code")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigParam {
    /// The short address assigned to the joining device.
    ShortAddr(u16),
    /// A group key installed into the named key slot.
    Gmk { key_id: u8, key: [u8; 16] },
    /// Which key slot becomes active for outgoing traffic.
    GmkActivation { key_id: u8 },
    /// A key slot to delete.
    GmkRemoval { key_id: u8 },
    /// Outcome report: result code plus the offending parameter id.
    Result { result: ParamResult, param_id: u8 },
}

/// Encode TLVs prefixed with the configuration extension marker.
#[must_use]
pub fn encode_channel(params: &[ConfigParam]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + params.len() * 19);
    out.push(EXT_TYPE_CONFIG);
    for param in params {
        encode_param(param, &mut out);
    }
    out
}

fn encode_param(param: &ConfigParam, out: &mut Vec<u8>) {
    match param {
        ConfigParam::ShortAddr(addr) => {
            out.push(PARAM_SHORT_ADDR);
            out.push(2);
            out.extend_from_slice(&addr.to_be_bytes());
        }
        ConfigParam::Gmk { key_id, key } => {
            out.push(PARAM_GMK);
            out.push(17);
            out.push(*key_id);
            out.extend_from_slice(key);
        }
        ConfigParam::GmkActivation { key_id } => {
            out.push(PARAM_GMK_ACTIVATION);
            out.push(1);
            out.push(*key_id);
        }
        ConfigParam::GmkRemoval { key_id } => {
            out.push(PARAM_GMK_REMOVAL);
            out.push(1);
            out.push(*key_id);
        }
        ConfigParam::Result { result, param_id } => {
            out.push(PARAM_RESULT);
            out.push(2);
            out.push(*result as u8);
            out.push(*param_id);
        }
    }
}

/// Encode bare TLVs with no extension marker (configuration pushes in
/// Accepted frames and their Joining answers).
#[must_use]
pub fn encode_bare(params: &[ConfigParam]) -> Vec<u8> {
    let mut out = Vec::with_capacity(params.len() * 19);
    for param in params {
        encode_param(param, &mut out);
    }
    out
}

/// Decode a protected-channel payload: extension marker then TLVs.
pub fn decode_channel(data: &[u8]) -> Result<Vec<ConfigParam>, LbpError> {
    if data.first() != Some(&EXT_TYPE_CONFIG) {
        return Err(LbpError::Malformed("missing configuration extension marker"));
    }
    decode_bare(&data[1..])
}

/// Decode a bare TLV list.
pub fn decode_bare(data: &[u8]) -> Result<Vec<ConfigParam>, LbpError> {
    let mut params = Vec::new();
    let mut offset = 0usize;

    while offset < data.len() {
        if data.len() < offset + 2 {
            return Err(LbpError::Malformed("truncated parameter header"));
        }
        let id = data[offset];
        let len = usize::from(data[offset + 1]);
        offset += 2;
        if data.len() < offset + len {
            return Err(LbpError::Malformed("parameter value overruns payload"));
        }
        let value = &data[offset..offset + len];
        offset += len;

        params.push(decode_param(id, value)?);
    }
    Ok(params)
}

fn decode_param(id: u8, value: &[u8]) -> Result<ConfigParam, LbpError> {
    match id {
        PARAM_SHORT_ADDR => {
            if value.len() != 2 {
                return Err(LbpError::Malformed("short address length"));
            }
            Ok(ConfigParam::ShortAddr(u16::from_be_bytes([
                value[0], value[1],
            ])))
        }
        PARAM_GMK => {
            if value.len() != 17 {
                return Err(LbpError::Malformed("group key length"));
            }
            let mut key = [0u8; 16];
            key.copy_from_slice(&value[1..]);
            Ok(ConfigParam::Gmk {
                key_id: value[0],
                key,
            })
        }
        PARAM_GMK_ACTIVATION => {
            if value.len() != 1 {
                return Err(LbpError::Malformed("activation length"));
            }
            Ok(ConfigParam::GmkActivation { key_id: value[0] })
        }
        PARAM_GMK_REMOVAL => {
            if value.len() != 1 {
                return Err(LbpError::Malformed("removal length"));
            }
            Ok(ConfigParam::GmkRemoval { key_id: value[0] })
        }
        PARAM_RESULT => {
            if value.len() != 2 {
                return Err(LbpError::Malformed("result length"));
            }
            Ok(ConfigParam::Result {
                result: ParamResult::from_u8(value[0])?,
                param_id: value[1],
            })
        }
        _ => Err(LbpError::Malformed("unknown parameter id")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_parameter_set_roundtrip() {
        let params = vec![
            ConfigParam::ShortAddr(0x0005),
            ConfigParam::Gmk {
                key_id: 0,
                key: [0xAF; 16],
            },
            ConfigParam::GmkActivation { key_id: 0 },
        ];
        let raw = encode_channel(&params);
        assert_eq!(raw[0], EXT_TYPE_CONFIG);
        assert_eq!(decode_channel(&raw).unwrap(), params);
    }

    #[test]
    fn test_result_roundtrip() {
        let params = vec![ConfigParam::Result {
            result: ParamResult::MissingRequired,
            param_id: 0x27,
        }];
        let raw = encode_channel(&params);
        assert_eq!(decode_channel(&raw).unwrap(), params);
    }

    #[test]
    fn test_bare_activation_push() {
        let params = vec![ConfigParam::GmkActivation { key_id: 1 }];
        let raw = encode_bare(&params);
        assert_eq!(raw, vec![0x2B, 0x01, 0x01]);
        // Odd first octet: distinguishable from an embedded EAP code.
        assert_eq!(raw[0] & 0x01, 0x01);
        assert_eq!(decode_bare(&raw).unwrap(), params);
    }

    #[test]
    fn test_missing_marker_rejected() {
        assert!(decode_channel(&[0x1D, 0x02, 0x00, 0x05]).is_err());
    }

    #[test]
    fn test_overrun_value_rejected() {
        // GMK claims 17 value octets but only 4 follow.
        let raw = [EXT_TYPE_CONFIG, PARAM_GMK, 17, 1, 2, 3, 4];
        assert!(matches!(
            decode_channel(&raw),
            Err(LbpError::Malformed("parameter value overruns payload"))
        ));
    }

    #[test]
    fn test_bad_length_rejected() {
        let raw = [EXT_TYPE_CONFIG, PARAM_SHORT_ADDR, 1, 0x05];
        assert!(matches!(
            decode_channel(&raw),
            Err(LbpError::Malformed("short address length"))
        ));
    }

    #[test]
    fn test_unknown_id_rejected() {
        let raw = [EXT_TYPE_CONFIG, 0x77, 1, 0x00];
        assert!(decode_channel(&raw).is_err());
    }
}
