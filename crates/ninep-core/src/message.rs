//! The 9P2000 message codec — every `Request`/`Response` variant and the
//! outer frame `{size[4] type[1] tag[2] body}` that carries it.
//!
//! `decode_message` is deliberately non-consuming on failure: a
//! [`FrameDecodeError::ShortBuffer`] means "come back with more bytes",
//! never "this input was rejected". The distinction between
//! [`FrameDecodeError::BodyMalformed`] (tag recovered, reply `Rerror`
//! and keep going) and [`FrameDecodeError::HeaderMalformed`] (tear the
//! connection down) is the load-bearing part of this module — see §7 of
//! the design notes for the policy this encodes.

use bytes::BufMut;

use crate::data::{read_str, sizeof_str, write_str};
use crate::error::{DecodeError, EncodeError};
use crate::fid::{read_fid, write_fid, Fid};
use crate::qid::{Qid, QID_SIZE};
use crate::stat::Stat;
use crate::tag::{Tag, NOTAG};

// ── Message type bytes ───────────────────────────────────────────────────────

pub const TVERSION: u8 = 100;
pub const RVERSION: u8 = 101;
pub const TAUTH: u8 = 102;
pub const RAUTH: u8 = 103;
pub const TATTACH: u8 = 104;
pub const RATTACH: u8 = 105;
// 106 is unused in 9P2000 — there is no Terror, only Rerror.
pub const RERROR: u8 = 107;
pub const TFLUSH: u8 = 108;
pub const RFLUSH: u8 = 109;
pub const TWALK: u8 = 110;
pub const RWALK: u8 = 111;
pub const TOPEN: u8 = 112;
pub const ROPEN: u8 = 113;
pub const TCREATE: u8 = 114;
pub const RCREATE: u8 = 115;
pub const TREAD: u8 = 116;
pub const RREAD: u8 = 117;
pub const TWRITE: u8 = 118;
pub const RWRITE: u8 = 119;
pub const TCLUNK: u8 = 120;
pub const RCLUNK: u8 = 121;
pub const TREMOVE: u8 = 122;
pub const RREMOVE: u8 = 123;
pub const TSTAT: u8 = 124;
pub const RSTAT: u8 = 125;
pub const TWSTAT: u8 = 126;
pub const RWSTAT: u8 = 127;

/// A 9P2000 request message is even-numbered by convention; a response
/// is the matching request's type byte plus one.
pub fn is_request_type(type_byte: u8) -> bool {
    type_byte % 2 == 0
}

/// Maximum number of path elements in a single `Twalk`. Not stated in
/// this engine's own wire invariants, but a 9P2000 implementation that
/// accepts more than this from a peer is accepting an unbounded
/// allocation; 16 is the value the rest of the 9P world settled on.
pub const MAX_WALK_ELEMENTS: usize = 16;

// ── Request / Response ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Version { msize: u32, version: String },
    Auth { afid: Fid, uname: String, aname: String },
    Flush { oldtag: Tag },
    Attach { fid: Fid, afid: Fid, uname: String, aname: String },
    Walk { fid: Fid, newfid: Fid, wname: Vec<String> },
    Open { fid: Fid, mode: u8 },
    Create { fid: Fid, name: String, perm: u32, mode: u8 },
    Read { fid: Fid, offset: u64, count: u32 },
    Write { fid: Fid, offset: u64, data: Vec<u8> },
    Clunk { fid: Fid },
    Remove { fid: Fid },
    Stat { fid: Fid },
    Wstat { fid: Fid, stat: Stat },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Version { msize: u32, version: String },
    Auth { aqid: Qid },
    /// The base 9P2000 codec never emits the `errno` extension field —
    /// see the design notes' open question on 9P2000.u/.L error codes.
    Err { ename: String },
    Flush,
    Attach { qid: Qid },
    Walk { wqid: Vec<Qid> },
    Open { qid: Qid, iounit: u32 },
    Create { qid: Qid, iounit: u32 },
    Read { data: Vec<u8> },
    Write { count: u32 },
    Clunk,
    Remove,
    Stat { stat: Stat },
    Wstat,
}

/// Either half of a request/response pair, tagged with its message type
/// byte for framing purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    pub fn type_byte(&self) -> u8 {
        match self {
            Message::Request(r) => match r {
                Request::Version { .. } => TVERSION,
                Request::Auth { .. } => TAUTH,
                Request::Flush { .. } => TFLUSH,
                Request::Attach { .. } => TATTACH,
                Request::Walk { .. } => TWALK,
                Request::Open { .. } => TOPEN,
                Request::Create { .. } => TCREATE,
                Request::Read { .. } => TREAD,
                Request::Write { .. } => TWRITE,
                Request::Clunk { .. } => TCLUNK,
                Request::Remove { .. } => TREMOVE,
                Request::Stat { .. } => TSTAT,
                Request::Wstat { .. } => TWSTAT,
            },
            Message::Response(r) => match r {
                Response::Version { .. } => RVERSION,
                Response::Auth { .. } => RAUTH,
                Response::Err { .. } => RERROR,
                Response::Flush => RFLUSH,
                Response::Attach { .. } => RATTACH,
                Response::Walk { .. } => RWALK,
                Response::Open { .. } => ROPEN,
                Response::Create { .. } => RCREATE,
                Response::Read { .. } => RREAD,
                Response::Write { .. } => RWRITE,
                Response::Clunk => RCLUNK,
                Response::Remove => RREMOVE,
                Response::Stat { .. } => RSTAT,
                Response::Wstat => RWSTAT,
            },
        }
    }

    /// Byte length of the body alone (not the 7-byte size/type/tag header).
    pub fn body_len(&self) -> usize {
        match self {
            Message::Request(r) => match r {
                Request::Version { version, .. } => 4 + sizeof_str(version),
                Request::Auth { uname, aname, .. } => 4 + sizeof_str(uname) + sizeof_str(aname),
                Request::Flush { .. } => 2,
                Request::Attach { uname, aname, .. } => {
                    4 + 4 + sizeof_str(uname) + sizeof_str(aname)
                }
                Request::Walk { wname, .. } => {
                    4 + 4 + 2 + wname.iter().map(|s| sizeof_str(s)).sum::<usize>()
                }
                Request::Open { .. } => 4 + 1,
                Request::Create { name, .. } => 4 + sizeof_str(name) + 4 + 1,
                Request::Read { .. } => 4 + 8 + 4,
                Request::Write { data, .. } => 4 + 8 + 4 + data.len(),
                Request::Clunk { .. } => 4,
                Request::Remove { .. } => 4,
                Request::Stat { .. } => 4,
                Request::Wstat { stat, .. } => 4 + stat.sizeof(),
            },
            Message::Response(r) => match r {
                Response::Version { version, .. } => 4 + sizeof_str(version),
                Response::Auth { .. } => QID_SIZE,
                Response::Err { ename } => sizeof_str(ename),
                Response::Flush => 0,
                Response::Attach { .. } => QID_SIZE,
                Response::Walk { wqid } => 2 + wqid.len() * QID_SIZE,
                Response::Open { .. } => QID_SIZE + 4,
                Response::Create { .. } => QID_SIZE + 4,
                Response::Read { data } => 4 + data.len(),
                Response::Write { .. } => 4,
                Response::Clunk => 0,
                Response::Remove => 0,
                Response::Stat { stat } => stat.sizeof(),
                Response::Wstat => 0,
            },
        }
    }

    fn write_body(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        match self {
            Message::Request(r) => write_request_body(r, buf),
            Message::Response(r) => write_response_body(r, buf),
        }
    }
}

fn write_request_body(r: &Request, buf: &mut impl BufMut) -> Result<(), EncodeError> {
    match r {
        Request::Version { msize, version } => {
            buf.put_u32_le(*msize);
            write_str(version, buf)?;
        }
        Request::Auth { afid, uname, aname } => {
            write_fid(*afid, buf);
            write_str(uname, buf)?;
            write_str(aname, buf)?;
        }
        Request::Flush { oldtag } => {
            buf.put_u16_le(*oldtag);
        }
        Request::Attach { fid, afid, uname, aname } => {
            write_fid(*fid, buf);
            write_fid(*afid, buf);
            write_str(uname, buf)?;
            write_str(aname, buf)?;
        }
        Request::Walk { fid, newfid, wname } => {
            if wname.len() > u16::MAX as usize {
                return Err(EncodeError::TooManyWalkElements(wname.len()));
            }
            write_fid(*fid, buf);
            write_fid(*newfid, buf);
            buf.put_u16_le(wname.len() as u16);
            for name in wname {
                write_str(name, buf)?;
            }
        }
        Request::Open { fid, mode } => {
            write_fid(*fid, buf);
            buf.put_u8(*mode);
        }
        Request::Create { fid, name, perm, mode } => {
            write_fid(*fid, buf);
            write_str(name, buf)?;
            buf.put_u32_le(*perm);
            buf.put_u8(*mode);
        }
        Request::Read { fid, offset, count } => {
            write_fid(*fid, buf);
            buf.put_u64_le(*offset);
            buf.put_u32_le(*count);
        }
        Request::Write { fid, offset, data } => {
            if data.len() > u32::MAX as usize {
                return Err(EncodeError::PayloadTooLarge(data.len()));
            }
            write_fid(*fid, buf);
            buf.put_u64_le(*offset);
            buf.put_u32_le(data.len() as u32);
            buf.put_slice(data);
        }
        Request::Clunk { fid } | Request::Remove { fid } | Request::Stat { fid } => {
            write_fid(*fid, buf);
        }
        Request::Wstat { fid, stat } => {
            write_fid(*fid, buf);
            stat.write(buf)?;
        }
    }
    Ok(())
}

fn write_response_body(r: &Response, buf: &mut impl BufMut) -> Result<(), EncodeError> {
    match r {
        Response::Version { msize, version } => {
            buf.put_u32_le(*msize);
            write_str(version, buf)?;
        }
        Response::Auth { aqid } => {
            aqid.write(buf);
        }
        Response::Err { ename } => {
            write_str(ename, buf)?;
        }
        Response::Flush => {}
        Response::Attach { qid } => {
            qid.write(buf);
        }
        Response::Walk { wqid } => {
            if wqid.len() > u16::MAX as usize {
                return Err(EncodeError::TooManyWalkElements(wqid.len()));
            }
            buf.put_u16_le(wqid.len() as u16);
            for qid in wqid {
                qid.write(buf);
            }
        }
        Response::Open { qid, iounit } => {
            qid.write(buf);
            buf.put_u32_le(*iounit);
        }
        Response::Create { qid, iounit } => {
            qid.write(buf);
            buf.put_u32_le(*iounit);
        }
        Response::Read { data } => {
            if data.len() > u32::MAX as usize {
                return Err(EncodeError::PayloadTooLarge(data.len()));
            }
            buf.put_u32_le(data.len() as u32);
            buf.put_slice(data);
        }
        Response::Write { count } => {
            buf.put_u32_le(*count);
        }
        Response::Clunk | Response::Remove | Response::Wstat => {}
        Response::Stat { stat } => {
            stat.write(buf)?;
        }
    }
    Ok(())
}

fn decode_body(type_byte: u8, tag: Tag, body: &[u8]) -> Result<Message, DecodeError> {
    let (message, trailing) = decode_body_prefix(type_byte, body)?;
    if !trailing.is_empty() {
        return Err(DecodeError::malformed(
            "frame",
            format!(
                "tag {tag}: {} trailing bytes after decoding message type 0x{type_byte:02x}",
                trailing.len()
            ),
        ));
    }
    Ok(message)
}

fn decode_body_prefix(type_byte: u8, body: &[u8]) -> Result<(Message, &[u8]), DecodeError> {
    macro_rules! need {
        ($n:expr) => {
            if body.len() < $n {
                return Err(DecodeError::ShortBuffer { needed: $n, have: body.len() });
            }
        };
    }

    Ok(match type_byte {
        TVERSION | RVERSION => {
            need!(4);
            let msize = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let (version, rest) = read_str(&body[4..])?;
            let msg = if type_byte == TVERSION {
                Message::Request(Request::Version { msize, version })
            } else {
                Message::Response(Response::Version { msize, version })
            };
            (msg, rest)
        }
        TAUTH => {
            need!(4);
            let afid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let (uname, rest) = read_str(&body[4..])?;
            let (aname, rest) = read_str(rest)?;
            (Message::Request(Request::Auth { afid, uname, aname }), rest)
        }
        RAUTH => {
            let (aqid, rest) = Qid::read(body)?;
            (Message::Response(Response::Auth { aqid }), rest)
        }
        RERROR => {
            let (ename, rest) = read_str(body)?;
            (Message::Response(Response::Err { ename }), rest)
        }
        TFLUSH => {
            need!(2);
            let oldtag = u16::from_le_bytes(body[0..2].try_into().unwrap());
            (Message::Request(Request::Flush { oldtag }), &body[2..])
        }
        RFLUSH => (Message::Response(Response::Flush), body),
        TATTACH => {
            need!(8);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let afid = u32::from_le_bytes(body[4..8].try_into().unwrap());
            let (uname, rest) = read_str(&body[8..])?;
            let (aname, rest) = read_str(rest)?;
            (Message::Request(Request::Attach { fid, afid, uname, aname }), rest)
        }
        RATTACH => {
            let (qid, rest) = Qid::read(body)?;
            (Message::Response(Response::Attach { qid }), rest)
        }
        TWALK => {
            need!(10);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let newfid = u32::from_le_bytes(body[4..8].try_into().unwrap());
            let nwname = u16::from_le_bytes(body[8..10].try_into().unwrap()) as usize;
            if nwname > MAX_WALK_ELEMENTS {
                return Err(DecodeError::malformed(
                    "Twalk",
                    format!("nwname {nwname} exceeds maximum {MAX_WALK_ELEMENTS}"),
                ));
            }
            let mut rest = &body[10..];
            let mut wname = Vec::with_capacity(nwname);
            for _ in 0..nwname {
                let (name, tail) = read_str(rest)?;
                wname.push(name);
                rest = tail;
            }
            (Message::Request(Request::Walk { fid, newfid, wname }), rest)
        }
        RWALK => {
            need!(2);
            let nwqid = u16::from_le_bytes(body[0..2].try_into().unwrap()) as usize;
            if nwqid > MAX_WALK_ELEMENTS {
                return Err(DecodeError::malformed(
                    "Rwalk",
                    format!("nwqid {nwqid} exceeds maximum {MAX_WALK_ELEMENTS}"),
                ));
            }
            let mut rest = &body[2..];
            let mut wqid = Vec::with_capacity(nwqid);
            for _ in 0..nwqid {
                let (qid, tail) = Qid::read(rest)?;
                wqid.push(qid);
                rest = tail;
            }
            (Message::Response(Response::Walk { wqid }), rest)
        }
        TOPEN => {
            need!(5);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let mode = body[4];
            (Message::Request(Request::Open { fid, mode }), &body[5..])
        }
        ROPEN => {
            let (qid, rest) = Qid::read(body)?;
            if rest.len() < 4 {
                return Err(DecodeError::ShortBuffer { needed: 4, have: rest.len() });
            }
            let iounit = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            (Message::Response(Response::Open { qid, iounit }), &rest[4..])
        }
        TCREATE => {
            need!(4);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let (name, rest) = read_str(&body[4..])?;
            if rest.len() < 5 {
                return Err(DecodeError::ShortBuffer { needed: 5, have: rest.len() });
            }
            let perm = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            let mode = rest[4];
            (Message::Request(Request::Create { fid, name, perm, mode }), &rest[5..])
        }
        RCREATE => {
            let (qid, rest) = Qid::read(body)?;
            if rest.len() < 4 {
                return Err(DecodeError::ShortBuffer { needed: 4, have: rest.len() });
            }
            let iounit = u32::from_le_bytes(rest[0..4].try_into().unwrap());
            (Message::Response(Response::Create { qid, iounit }), &rest[4..])
        }
        TREAD => {
            need!(16);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let offset = u64::from_le_bytes(body[4..12].try_into().unwrap());
            let count = u32::from_le_bytes(body[12..16].try_into().unwrap());
            (Message::Request(Request::Read { fid, offset, count }), &body[16..])
        }
        RREAD => {
            need!(4);
            let count = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
            let total = 4 + count;
            if body.len() < total {
                return Err(DecodeError::ShortBuffer { needed: total, have: body.len() });
            }
            let data = body[4..total].to_vec();
            (Message::Response(Response::Read { data }), &body[total..])
        }
        TWRITE => {
            need!(16);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let offset = u64::from_le_bytes(body[4..12].try_into().unwrap());
            let count = u32::from_le_bytes(body[12..16].try_into().unwrap()) as usize;
            let total = 16 + count;
            if body.len() < total {
                return Err(DecodeError::ShortBuffer { needed: total, have: body.len() });
            }
            let data = body[16..total].to_vec();
            (Message::Request(Request::Write { fid, offset, data }), &body[total..])
        }
        RWRITE => {
            need!(4);
            let count = u32::from_le_bytes(body[0..4].try_into().unwrap());
            (Message::Response(Response::Write { count }), &body[4..])
        }
        TCLUNK => {
            need!(4);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            (Message::Request(Request::Clunk { fid }), &body[4..])
        }
        RCLUNK => (Message::Response(Response::Clunk), body),
        TREMOVE => {
            need!(4);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            (Message::Request(Request::Remove { fid }), &body[4..])
        }
        RREMOVE => (Message::Response(Response::Remove), body),
        TSTAT => {
            need!(4);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            (Message::Request(Request::Stat { fid }), &body[4..])
        }
        RSTAT => {
            let (stat, rest) = Stat::read(body)?;
            (Message::Response(Response::Stat { stat }), rest)
        }
        TWSTAT => {
            need!(4);
            let fid = u32::from_le_bytes(body[0..4].try_into().unwrap());
            let (stat, rest) = Stat::read(&body[4..])?;
            (Message::Request(Request::Wstat { fid, stat }), rest)
        }
        RWSTAT => (Message::Response(Response::Wstat), body),
        other => return Err(DecodeError::UnknownType(other)),
    })
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// Byte length of the frame header: size[4] type[1] tag[2].
pub const FRAME_HEADER_LEN: usize = 4 + 1 + 2;

/// A complete, typed 9P2000 frame: the transaction tag plus the parsed
/// request or response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: Tag,
    pub message: Message,
}

impl Frame {
    pub fn new(tag: Tag, message: Message) -> Self {
        Frame { tag, message }
    }

    /// Total wire size, including the 7-byte header.
    pub fn sizeof(&self) -> usize {
        FRAME_HEADER_LEN + self.message.body_len()
    }
}

/// Outcome of attempting to decode one frame out of a buffer that may
/// hold more or fewer bytes than a single frame.
#[derive(Debug)]
pub enum FrameDecodeError {
    /// Not enough bytes buffered yet; read more and retry. Never fatal.
    ShortBuffer { needed: usize, have: usize },
    /// The header (size/type/tag) was intact — `tag` is trustworthy —
    /// but the body failed to parse. `consumed` bytes must still be
    /// dropped from the buffer; the caller should reply `Rerror` to
    /// `tag` and keep the connection open.
    BodyMalformed { tag: Tag, consumed: usize, reason: DecodeError },
    /// The header itself could not be trusted (fewer than 7 bytes, or a
    /// declared size smaller than the header itself). No tag can be
    /// recovered; the connection must be torn down.
    HeaderMalformed(String),
}

impl std::fmt::Display for FrameDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameDecodeError::ShortBuffer { needed, have } => {
                write!(f, "short buffer: need {needed}, have {have}")
            }
            FrameDecodeError::BodyMalformed { tag, reason, .. } => {
                write!(f, "tag {tag}: malformed body: {reason}")
            }
            FrameDecodeError::HeaderMalformed(reason) => write!(f, "malformed header: {reason}"),
        }
    }
}

impl std::error::Error for FrameDecodeError {}

/// Encode `frame` as a complete `{size, type, tag, body}` wire frame.
/// Returns the number of bytes written, which always equals
/// `frame.sizeof()`.
pub fn encode_message(frame: &Frame, buf: &mut impl BufMut) -> Result<usize, EncodeError> {
    let total = frame.sizeof();
    if total > u32::MAX as usize {
        return Err(EncodeError::MessageTooLarge(total));
    }
    buf.put_u32_le(total as u32);
    buf.put_u8(frame.message.type_byte());
    buf.put_u16_le(frame.tag);
    frame.message.write_body(buf)?;
    Ok(total)
}

/// Decode one complete frame from the front of `buf`.
///
/// `buf` may contain more bytes than a single frame (the caller — the
/// buffered packet reader — is responsible for handing over exactly as
/// many bytes as the declared size once that much is available); this
/// function only ever looks at the first `size` bytes it finds.
pub fn decode_message(buf: &[u8]) -> Result<(Frame, usize), FrameDecodeError> {
    if buf.len() < 4 {
        return Err(FrameDecodeError::ShortBuffer { needed: 4, have: buf.len() });
    }
    let size = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
    if size < FRAME_HEADER_LEN {
        return Err(FrameDecodeError::HeaderMalformed(format!(
            "declared size {size} is smaller than the {FRAME_HEADER_LEN}-byte frame header"
        )));
    }
    if buf.len() < size {
        return Err(FrameDecodeError::ShortBuffer { needed: size, have: buf.len() });
    }

    let type_byte = buf[4];
    let tag = u16::from_le_bytes(buf[5..7].try_into().unwrap());
    let body = &buf[FRAME_HEADER_LEN..size];

    match decode_body(type_byte, tag, body) {
        Ok(message) => Ok((Frame { tag, message }, size)),
        Err(DecodeError::UnknownType(t)) => Err(FrameDecodeError::BodyMalformed {
            tag,
            consumed: size,
            reason: DecodeError::UnknownType(t),
        }),
        Err(reason) => Err(FrameDecodeError::BodyMalformed { tag, consumed: size, reason }),
    }
}
