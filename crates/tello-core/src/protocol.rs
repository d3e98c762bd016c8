//! # Control Protocol
//!
//! The binary protocol the Tello speaks on its control port (UDP 8889).
//!
//! ## Frame layout
//!
//! ```text
//! 0      1..3          3      4      5..7        7..9       9..n-2    n-2..n
//! 0xCC | len<<3 (LE) | crc8 | type | msg id LE | seq LE   | payload | crc16 LE
//! ```
//!
//! The session starts with a plain-text handshake: `conn_req:` followed by the
//! local video port, answered by a datagram beginning with `conn_ack:`.

use crate::error::{Error, Result};
use crate::photo::{FileAnnouncement, FileChunk};
use crc::{Algorithm, Crc};
use serde::{Deserialize, Serialize};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Packet start marker.
pub const START_BYTE: u8 = 0xCC;

/// Header (9) plus trailing CRC-16 (2).
pub const MIN_PACKET_LEN: usize = 11;

/// Default drone control address.
pub const DEFAULT_DRONE_ADDR: &str = "192.168.10.1:8889";

/// Default local control port.
pub const DEFAULT_CONTROL_PORT: u16 = 8890;

/// Default local port the drone streams video to.
pub const DEFAULT_VIDEO_PORT: u16 = 6038;

const CONN_REQ: &[u8] = b"conn_req:";
const CONN_ACK: &[u8] = b"conn_ack:";

/// Message identifiers.
pub mod msg {
    pub const SET_VIDEO_BITRATE: u16 = 0x0020;
    pub const WIFI_STRENGTH: u16 = 0x001A;
    pub const START_VIDEO: u16 = 0x0025;
    pub const TAKE_PICTURE: u16 = 0x0030;
    pub const LIGHT_STRENGTH: u16 = 0x0035;
    pub const STICK: u16 = 0x0050;
    pub const TAKE_OFF: u16 = 0x0054;
    pub const LAND: u16 = 0x0055;
    pub const FLIGHT_STATUS: u16 = 0x0056;
    pub const FLIP: u16 = 0x005C;
    pub const THROW_TAKE_OFF: u16 = 0x005D;
    pub const PALM_LAND: u16 = 0x005E;
    pub const FILE_SIZE: u16 = 0x0062;
    pub const FILE_DATA: u16 = 0x0063;
    pub const FILE_DONE: u16 = 0x0064;
    pub const BOUNCE: u16 = 0x1053;
}

/// Packet type bytes used by the commands this console sends.
pub mod packet_type {
    pub const SET_INFO: u8 = 0x68;
    pub const DATA: u8 = 0x60;
    /// File transfer replies.
    pub const ACK: u8 = 0x50;
    /// Throw take-off and file done.
    pub const GET_INFO: u8 = 0x48;
    pub const FLIP: u8 = 0x70;
}

// Tello runs both CRCs reflected with non-standard seeds. The `init` values
// below are the seeds expressed in the unreflected (Rocksoft) convention.
const CRC8_TELLO: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x31,
    init: 0xee,
    refin: true,
    refout: true,
    xorout: 0x00,
    check: 0xfb,
    residue: 0x00,
};

const CRC16_TELLO: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0x496c,
    refin: true,
    refout: true,
    xorout: 0x0000,
    check: 0x7109,
    residue: 0x0000,
};

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC8_TELLO);
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC16_TELLO);

/// CRC-8 over a packet header.
pub fn crc8(bytes: &[u8]) -> u8 {
    CRC8.checksum(bytes)
}

/// CRC-16 over a packet body.
pub fn crc16(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Build the connection request advertising the local video port.
pub fn connect_request(video_port: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(CONN_REQ.len() + 2);
    buf.extend_from_slice(CONN_REQ);
    buf.extend_from_slice(&video_port.to_le_bytes());
    buf
}

/// Whether a datagram is the drone's answer to [`connect_request`].
pub fn is_connect_ack(datagram: &[u8]) -> bool {
    datagram.starts_with(CONN_ACK)
}

/// Strip the 2-byte sequence prefix from a video datagram.
///
/// Returns `None` for datagrams that carry no video bytes.
pub fn video_payload(datagram: &[u8]) -> Option<&[u8]> {
    match datagram.get(2..) {
        Some(rest) if !rest.is_empty() => Some(rest),
        _ => None,
    }
}

/// Whether a video payload opens with an H.264 sequence parameter set.
///
/// The drone repeats the SPS on every start-video request, and a decoder can
/// pick the stream up again from there.
pub fn starts_sequence(frame: &[u8]) -> bool {
    matches!(frame, [0, 0, 0, 1, nal, ..] if nal & 0x1F == 7)
}

// =============================================================================
// PACKET
// =============================================================================

/// A framed control packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: u8,
    pub message_id: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Create a packet.
    pub fn new(packet_type: u8, message_id: u16, payload: Vec<u8>) -> Self {
        Self {
            packet_type,
            message_id,
            sequence: 0,
            payload,
        }
    }

    /// Set the sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    /// Serialize to wire bytes, computing both CRCs.
    pub fn encode(&self) -> Vec<u8> {
        let len = MIN_PACKET_LEN + self.payload.len();
        let mut buf = Vec::with_capacity(len);

        buf.push(START_BYTE);
        buf.extend_from_slice(&((len as u16) << 3).to_le_bytes());
        buf.push(crc8(&buf[..3]));
        buf.push(self.packet_type);
        buf.extend_from_slice(&self.message_id.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        let crc = crc16(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());

        buf
    }

    /// Parse wire bytes, verifying framing and both CRCs.
    ///
    /// Bytes past the declared length are ignored.
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        if datagram.len() < MIN_PACKET_LEN {
            return Err(Error::TooShort(datagram.len()));
        }
        if datagram[0] != START_BYTE {
            return Err(Error::BadStart(datagram[0]));
        }

        let declared = (u16::from_le_bytes([datagram[1], datagram[2]]) >> 3) as usize;
        if declared < MIN_PACKET_LEN || declared > datagram.len() {
            return Err(Error::LengthMismatch {
                declared,
                actual: datagram.len(),
            });
        }
        let frame = &datagram[..declared];

        let header_crc = crc8(&frame[..3]);
        if header_crc != frame[3] {
            return Err(Error::HeaderCrc {
                expected: header_crc,
                actual: frame[3],
            });
        }

        let body_crc = crc16(&frame[..declared - 2]);
        let sent_crc = u16::from_le_bytes([frame[declared - 2], frame[declared - 1]]);
        if body_crc != sent_crc {
            return Err(Error::PacketCrc {
                expected: body_crc,
                actual: sent_crc,
            });
        }

        Ok(Self {
            packet_type: frame[4],
            message_id: u16::from_le_bytes([frame[5], frame[6]]),
            sequence: u16::from_le_bytes([frame[7], frame[8]]),
            payload: frame[9..declared - 2].to_vec(),
        })
    }
}

// =============================================================================
// OUTBOUND COMMANDS
// =============================================================================

/// Flip direction, as encoded in the flip payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlipDirection {
    Forward = 0,
    Left = 1,
    Back = 2,
    Right = 3,
}

/// Video encoder bitrate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoBitrate {
    Auto = 0,
    Mbps1 = 1,
    #[default]
    Mbps1_5 = 2,
    Mbps2 = 3,
    Mbps3 = 4,
    Mbps4 = 5,
}

impl TryFrom<u8> for VideoBitrate {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Auto),
            1 => Ok(Self::Mbps1),
            2 => Ok(Self::Mbps1_5),
            3 => Ok(Self::Mbps2),
            4 => Ok(Self::Mbps3),
            5 => Ok(Self::Mbps4),
            other => Err(Error::InvalidBitrate(other)),
        }
    }
}

/// One-shot commands sent on the control link.
///
/// Continuous movement is not a command: it travels in the stick packet the
/// link sends on a fixed period (see [`crate::sticks::StickState`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    TakeOff,
    ThrowTakeOff,
    Land,
    PalmLand,
    Flip(FlipDirection),
    /// `true` starts bounce mode, `false` stops it.
    Bounce(bool),
    StartVideo,
    SetVideoBitrate(VideoBitrate),
    TakePicture,
    /// Accept an announced file.
    FileSizeAck,
    /// Confirm a piece of file data; `done` on the last one.
    FilePieceAck { done: bool, file_id: u16, piece: u32 },
    /// Close a completed file transfer.
    FileDone { file_id: u16, size: u32 },
}

impl Command {
    /// Build the packet for this command.
    pub fn to_packet(self, sequence: u16) -> Packet {
        use packet_type::{ACK, DATA, FLIP, GET_INFO, SET_INFO};

        let packet = match self {
            Self::TakeOff => Packet::new(SET_INFO, msg::TAKE_OFF, Vec::new()),
            Self::ThrowTakeOff => Packet::new(GET_INFO, msg::THROW_TAKE_OFF, Vec::new()),
            Self::Land => Packet::new(SET_INFO, msg::LAND, vec![0x00]),
            Self::PalmLand => Packet::new(SET_INFO, msg::PALM_LAND, vec![0x00]),
            Self::Flip(dir) => Packet::new(FLIP, msg::FLIP, vec![dir as u8]),
            Self::Bounce(on) => Packet::new(SET_INFO, msg::BOUNCE, vec![if on { 0x30 } else { 0x31 }]),
            Self::StartVideo => Packet::new(DATA, msg::START_VIDEO, Vec::new()),
            Self::SetVideoBitrate(rate) => Packet::new(SET_INFO, msg::SET_VIDEO_BITRATE, vec![rate as u8]),
            Self::TakePicture => Packet::new(SET_INFO, msg::TAKE_PICTURE, Vec::new()),
            Self::FileSizeAck => Packet::new(ACK, msg::FILE_SIZE, vec![0x00]),
            Self::FilePieceAck { done, file_id, piece } => {
                let mut payload = Vec::with_capacity(7);
                payload.push(u8::from(done));
                payload.extend_from_slice(&file_id.to_le_bytes());
                payload.extend_from_slice(&piece.to_le_bytes());
                Packet::new(ACK, msg::FILE_DATA, payload)
            }
            Self::FileDone { file_id, size } => {
                let mut payload = Vec::with_capacity(6);
                payload.extend_from_slice(&file_id.to_le_bytes());
                payload.extend_from_slice(&size.to_le_bytes());
                Packet::new(GET_INFO, msg::FILE_DONE, payload)
            }
        };
        packet.with_sequence(sequence)
    }
}

// =============================================================================
// INBOUND TELEMETRY
// =============================================================================

fn bit(byte: u8, n: u8) -> bool {
    (byte >> n) & 0x1 == 1
}

fn i16_at(buf: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([buf[at], buf[at + 1]])
}

/// Flight status report (message 0x0056).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightData {
    /// Height above take-off point in decimetres.
    pub height: i16,
    pub north_speed: i16,
    pub east_speed: i16,
    pub ground_speed: i16,
    pub fly_time: i16,

    pub imu_state: bool,
    pub pressure_state: bool,
    pub down_visual_state: bool,
    pub power_state: bool,
    pub battery_state: bool,
    pub gravity_state: bool,
    pub wind_state: bool,

    pub imu_calibration_state: u8,
    pub battery_percentage: u8,
    /// Seconds of flight left.
    pub drone_fly_time_left: i16,
    pub drone_battery_left: i16,

    pub em_sky: bool,
    pub em_ground: bool,
    pub em_open: bool,
    pub drone_hover: bool,
    pub outage_recording: bool,
    pub battery_low: bool,
    pub battery_lower: bool,
    pub factory_mode: bool,

    pub fly_mode: u8,
    pub throw_fly_timer: u8,
    pub camera_state: u8,
    pub electrical_machinery_state: u8,

    pub front_in: bool,
    pub front_out: bool,
    pub front_lsc: bool,

    pub over_temp: bool,
}

impl FlightData {
    /// Payload size of a flight status message.
    pub const LEN: usize = 24;

    /// Parse a flight status payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::LEN {
            return Err(Error::ShortPayload {
                message: "flight status",
                needed: Self::LEN,
                actual: payload.len(),
            });
        }

        let sensors = payload[10];
        let state = payload[17];
        let front = payload[22];

        Ok(Self {
            height: i16_at(payload, 0),
            north_speed: i16_at(payload, 2),
            east_speed: i16_at(payload, 4),
            ground_speed: i16_at(payload, 6),
            fly_time: i16_at(payload, 8),

            imu_state: bit(sensors, 0),
            pressure_state: bit(sensors, 1),
            down_visual_state: bit(sensors, 2),
            power_state: bit(sensors, 3),
            battery_state: bit(sensors, 4),
            gravity_state: bit(sensors, 5),
            wind_state: bit(sensors, 7),

            imu_calibration_state: payload[11],
            battery_percentage: payload[12],
            drone_fly_time_left: i16_at(payload, 13),
            drone_battery_left: i16_at(payload, 15),

            em_sky: bit(state, 0),
            em_ground: bit(state, 1),
            em_open: bit(state, 2),
            drone_hover: bit(state, 3),
            outage_recording: bit(state, 4),
            battery_low: bit(state, 5),
            battery_lower: bit(state, 6),
            factory_mode: bit(state, 7),

            fly_mode: payload[18],
            throw_fly_timer: payload[19],
            camera_state: payload[20],
            electrical_machinery_state: payload[21],

            front_in: bit(front, 0),
            front_out: bit(front, 1),
            front_lsc: bit(front, 2),

            over_temp: bit(payload[23], 0),
        })
    }

    /// Horizontal speed from the north and east components.
    pub fn derived_speed(&self) -> f64 {
        let n = i64::from(self.north_speed);
        let e = i64::from(self.east_speed);
        ((n * n + e * e) as f64).sqrt()
    }
}

/// WiFi link quality report (message 0x001A).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiData {
    pub strength: u8,
    pub interference: u8,
}

impl WifiData {
    /// Parse a wifi strength payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        match payload {
            [strength, interference, ..] => Ok(Self {
                strength: *strength,
                interference: *interference,
            }),
            _ => Err(Error::ShortPayload {
                message: "wifi strength",
                needed: 2,
                actual: payload.len(),
            }),
        }
    }
}

/// Something the drone told us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DroneEvent {
    Connected,
    FlightData(FlightData),
    Wifi(WifiData),
    LightStrength(u8),
    TakeOffAck,
    ThrowTakeOffAck,
    LandAck,
    PalmLandAck,
    BounceAck,
    FlipAck,
    VideoBitrateAck,
    TakePictureAck,
    FileSize(FileAnnouncement),
    FileChunk(FileChunk),
    FileDoneAck,
    /// A well-formed packet this console does not interpret.
    Unknown(u16),
}

impl DroneEvent {
    /// Decode one datagram received on the control port.
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        if is_connect_ack(datagram) {
            return Ok(Self::Connected);
        }

        let packet = Packet::decode(datagram)?;
        let event = match packet.message_id {
            msg::FLIGHT_STATUS => Self::FlightData(FlightData::parse(&packet.payload)?),
            msg::WIFI_STRENGTH => Self::Wifi(WifiData::parse(&packet.payload)?),
            msg::LIGHT_STRENGTH => match packet.payload.first() {
                Some(level) => Self::LightStrength(*level),
                None => {
                    return Err(Error::ShortPayload {
                        message: "light strength",
                        needed: 1,
                        actual: 0,
                    });
                }
            },
            msg::TAKE_OFF => Self::TakeOffAck,
            msg::THROW_TAKE_OFF => Self::ThrowTakeOffAck,
            msg::LAND => Self::LandAck,
            msg::PALM_LAND => Self::PalmLandAck,
            msg::BOUNCE => Self::BounceAck,
            msg::FLIP => Self::FlipAck,
            msg::SET_VIDEO_BITRATE => Self::VideoBitrateAck,
            msg::TAKE_PICTURE => Self::TakePictureAck,
            msg::FILE_SIZE => Self::FileSize(FileAnnouncement::parse(&packet.payload)?),
            msg::FILE_DATA => Self::FileChunk(FileChunk::parse(&packet.payload)?),
            msg::FILE_DONE => Self::FileDoneAck,
            other => Self::Unknown(other),
        };
        Ok(event)
    }
}

// =============================================================================
// TESTS
// =============================================================================
