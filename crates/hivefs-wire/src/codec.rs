// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode HiveFS wire frames without std dependencies.
// Author: Lukas Bower

//! Encode/decode helpers for HiveFS invocation frames.
//!
//! A frame is a `u32` little-endian total size, one message-type byte, a
//! `u16` tag, then the operation fields. Strings carry a `u16` length
//! prefix, byte buffers a `u32` prefix. Paths travel in canonical string
//! form and are validated on both sides of the wire.

use alloc::borrow::ToOwned;
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::str;

use crate::types::*;

/// Message opcodes. Requests are even, their replies odd, errors apart.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageType {
    TIsDirectory = 10,
    RIsDirectory = 11,
    TList = 12,
    RList = 13,
    TCreateFile = 14,
    RCreateFile = 15,
    TCreateDirectory = 16,
    RCreateDirectory = 17,
    TDeleteEntry = 18,
    RDeleteEntry = 19,
    TGetStorage = 20,
    RGetStorage = 21,
    TRegister = 22,
    RRegister = 23,
    TSize = 30,
    RSize = 31,
    TRead = 32,
    RRead = 33,
    TWrite = 34,
    RWrite = 35,
    TCreate = 40,
    RCreate = 41,
    TRemove = 42,
    RRemove = 43,
    RError = 7,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match value {
            10 => TIsDirectory,
            11 => RIsDirectory,
            12 => TList,
            13 => RList,
            14 => TCreateFile,
            15 => RCreateFile,
            16 => TCreateDirectory,
            17 => RCreateDirectory,
            18 => TDeleteEntry,
            19 => RDeleteEntry,
            20 => TGetStorage,
            21 => RGetStorage,
            22 => TRegister,
            23 => RRegister,
            30 => TSize,
            31 => RSize,
            32 => TRead,
            33 => RRead,
            34 => TWrite,
            35 => RWrite,
            40 => TCreate,
            41 => RCreate,
            42 => TRemove,
            43 => RRemove,
            7 => RError,
            other => return Err(WireError::Unsupported(other)),
        })
    }
}

/// Encode a request into its wire representation.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, WireError> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&request.tag.to_le_bytes());
    let ty = match &request.body {
        RequestBody::IsDirectory { path } => {
            put_path(&mut payload, path)?;
            MessageType::TIsDirectory
        }
        RequestBody::List { path } => {
            put_path(&mut payload, path)?;
            MessageType::TList
        }
        RequestBody::CreateFile { path } => {
            put_path(&mut payload, path)?;
            MessageType::TCreateFile
        }
        RequestBody::CreateDirectory { path } => {
            put_path(&mut payload, path)?;
            MessageType::TCreateDirectory
        }
        RequestBody::DeleteEntry { path } => {
            put_path(&mut payload, path)?;
            MessageType::TDeleteEntry
        }
        RequestBody::GetStorage { path } => {
            put_path(&mut payload, path)?;
            MessageType::TGetStorage
        }
        RequestBody::Register {
            storage,
            command,
            files,
        } => {
            put_stub(&mut payload, storage)?;
            put_stub(&mut payload, command)?;
            let count: u32 = files.len().try_into().map_err(|_| WireError::InvalidPath)?;
            payload.extend_from_slice(&count.to_le_bytes());
            for file in files {
                put_path(&mut payload, file)?;
            }
            MessageType::TRegister
        }
        RequestBody::Size { path } => {
            put_path(&mut payload, path)?;
            MessageType::TSize
        }
        RequestBody::Read {
            path,
            offset,
            length,
        } => {
            put_path(&mut payload, path)?;
            payload.extend_from_slice(&offset.to_le_bytes());
            payload.extend_from_slice(&length.to_le_bytes());
            MessageType::TRead
        }
        RequestBody::Write { path, offset, data } => {
            put_path(&mut payload, path)?;
            payload.extend_from_slice(&offset.to_le_bytes());
            put_bytes(&mut payload, data)?;
            MessageType::TWrite
        }
        RequestBody::Create { path } => {
            put_path(&mut payload, path)?;
            MessageType::TCreate
        }
        RequestBody::Remove { path } => {
            put_path(&mut payload, path)?;
            MessageType::TRemove
        }
    };
    finish(ty, payload)
}

/// Encode a reply into its wire representation.
pub fn encode_response(response: &Response) -> Result<Vec<u8>, WireError> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&response.tag.to_le_bytes());
    let ty = match &response.body {
        ResponseBody::IsDirectory { value } => {
            payload.push(u8::from(*value));
            MessageType::RIsDirectory
        }
        ResponseBody::List { names } => {
            let count: u32 = names.len().try_into().map_err(|_| WireError::InvalidPath)?;
            payload.extend_from_slice(&count.to_le_bytes());
            for name in names {
                put_string(&mut payload, name)?;
            }
            MessageType::RList
        }
        ResponseBody::CreateFile { created } => {
            payload.push(u8::from(*created));
            MessageType::RCreateFile
        }
        ResponseBody::CreateDirectory { created } => {
            payload.push(u8::from(*created));
            MessageType::RCreateDirectory
        }
        ResponseBody::DeleteEntry { deleted } => {
            payload.push(u8::from(*deleted));
            MessageType::RDeleteEntry
        }
        ResponseBody::GetStorage { stub } => {
            put_stub(&mut payload, stub)?;
            MessageType::RGetStorage
        }
        ResponseBody::Register { evict } => {
            let count: u32 = evict.len().try_into().map_err(|_| WireError::InvalidPath)?;
            payload.extend_from_slice(&count.to_le_bytes());
            for path in evict {
                put_path(&mut payload, path)?;
            }
            MessageType::RRegister
        }
        ResponseBody::Size { size } => {
            payload.extend_from_slice(&size.to_le_bytes());
            MessageType::RSize
        }
        ResponseBody::Read { data } => {
            put_bytes(&mut payload, data)?;
            MessageType::RRead
        }
        ResponseBody::Write => MessageType::RWrite,
        ResponseBody::Create { created } => {
            payload.push(u8::from(*created));
            MessageType::RCreate
        }
        ResponseBody::Remove { deleted } => {
            payload.push(u8::from(*deleted));
            MessageType::RRemove
        }
        ResponseBody::Error { kind, message } => {
            put_string(&mut payload, &kind.to_string())?;
            put_string(&mut payload, message)?;
            MessageType::RError
        }
    };
    finish(ty, payload)
}

/// Decode a request from its wire representation.
pub fn decode_request(bytes: &[u8]) -> Result<Request, WireError> {
    let (ty, payload) = decode_message(bytes)?;
    let mut cursor = Cursor::new(payload);
    let tag = read_u16(&mut cursor)?;
    let body = match ty {
        MessageType::TIsDirectory => RequestBody::IsDirectory {
            path: read_path(&mut cursor)?,
        },
        MessageType::TList => RequestBody::List {
            path: read_path(&mut cursor)?,
        },
        MessageType::TCreateFile => RequestBody::CreateFile {
            path: read_path(&mut cursor)?,
        },
        MessageType::TCreateDirectory => RequestBody::CreateDirectory {
            path: read_path(&mut cursor)?,
        },
        MessageType::TDeleteEntry => RequestBody::DeleteEntry {
            path: read_path(&mut cursor)?,
        },
        MessageType::TGetStorage => RequestBody::GetStorage {
            path: read_path(&mut cursor)?,
        },
        MessageType::TRegister => {
            let storage = read_stub(&mut cursor)?;
            let command = read_stub(&mut cursor)?;
            let count = read_u32(&mut cursor)? as usize;
            let mut files = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                files.push(read_path(&mut cursor)?);
            }
            RequestBody::Register {
                storage,
                command,
                files,
            }
        }
        MessageType::TSize => RequestBody::Size {
            path: read_path(&mut cursor)?,
        },
        MessageType::TRead => {
            let path = read_path(&mut cursor)?;
            let offset = read_i64(&mut cursor)?;
            let length = read_i32(&mut cursor)?;
            RequestBody::Read {
                path,
                offset,
                length,
            }
        }
        MessageType::TWrite => {
            let path = read_path(&mut cursor)?;
            let offset = read_i64(&mut cursor)?;
            let data = read_bytes(&mut cursor)?;
            RequestBody::Write { path, offset, data }
        }
        MessageType::TCreate => RequestBody::Create {
            path: read_path(&mut cursor)?,
        },
        MessageType::TRemove => RequestBody::Remove {
            path: read_path(&mut cursor)?,
        },
        other => return Err(WireError::Unsupported(other as u8)),
    };
    Ok(Request { tag, body })
}

/// Decode a reply from its wire representation.
pub fn decode_response(bytes: &[u8]) -> Result<Response, WireError> {
    let (ty, payload) = decode_message(bytes)?;
    let mut cursor = Cursor::new(payload);
    let tag = read_u16(&mut cursor)?;
    let body = match ty {
        MessageType::RIsDirectory => ResponseBody::IsDirectory {
            value: read_bool(&mut cursor)?,
        },
        MessageType::RList => {
            let count = read_u32(&mut cursor)? as usize;
            let mut names = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                names.push(read_string(&mut cursor)?);
            }
            ResponseBody::List { names }
        }
        MessageType::RCreateFile => ResponseBody::CreateFile {
            created: read_bool(&mut cursor)?,
        },
        MessageType::RCreateDirectory => ResponseBody::CreateDirectory {
            created: read_bool(&mut cursor)?,
        },
        MessageType::RDeleteEntry => ResponseBody::DeleteEntry {
            deleted: read_bool(&mut cursor)?,
        },
        MessageType::RGetStorage => ResponseBody::GetStorage {
            stub: read_stub(&mut cursor)?,
        },
        MessageType::RRegister => {
            let count = read_u32(&mut cursor)? as usize;
            let mut evict = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                evict.push(read_path(&mut cursor)?);
            }
            ResponseBody::Register { evict }
        }
        MessageType::RSize => ResponseBody::Size {
            size: read_i64(&mut cursor)?,
        },
        MessageType::RRead => ResponseBody::Read {
            data: read_bytes(&mut cursor)?,
        },
        MessageType::RWrite => ResponseBody::Write,
        MessageType::RCreate => ResponseBody::Create {
            created: read_bool(&mut cursor)?,
        },
        MessageType::RRemove => ResponseBody::Remove {
            deleted: read_bool(&mut cursor)?,
        },
        MessageType::RError => {
            let kind_str = read_string(&mut cursor)?;
            let message = read_string(&mut cursor)?;
            let kind = ErrorKind::parse(&kind_str).ok_or(WireError::UnknownErrorKind)?;
            ResponseBody::Error { kind, message }
        }
        other => return Err(WireError::Unsupported(other as u8)),
    };
    Ok(Response { tag, body })
}

fn finish(ty: MessageType, payload: Vec<u8>) -> Result<Vec<u8>, WireError> {
    let size = payload.len() + 5;
    if size > MAX_FRAME as usize {
        return Err(WireError::Oversize(size));
    }
    let mut buffer = Vec::with_capacity(size);
    buffer.extend_from_slice(&(size as u32).to_le_bytes());
    buffer.push(ty as u8);
    buffer.extend_from_slice(&payload);
    Ok(buffer)
}

fn decode_message(bytes: &[u8]) -> Result<(MessageType, &[u8]), WireError> {
    if bytes.len() < 5 {
        return Err(WireError::Truncated);
    }
    let declared = u32::from_le_bytes(bytes[..4].try_into().expect("slice length checked"));
    if declared > MAX_FRAME {
        return Err(WireError::Oversize(declared as usize));
    }
    if declared as usize != bytes.len() {
        return Err(WireError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    let ty = MessageType::try_from(bytes[4])?;
    Ok((ty, &bytes[5..]))
}

fn read_u8(cursor: &mut Cursor<'_>) -> Result<u8, WireError> {
    let mut buf = [0u8; 1];
    cursor.read_exact(&mut buf).ok_or(WireError::Truncated)?;
    Ok(buf[0])
}

fn read_bool(cursor: &mut Cursor<'_>) -> Result<bool, WireError> {
    Ok(read_u8(cursor)? != 0)
}

fn read_u16(cursor: &mut Cursor<'_>) -> Result<u16, WireError> {
    let mut buf = [0u8; 2];
    cursor.read_exact(&mut buf).ok_or(WireError::Truncated)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(cursor: &mut Cursor<'_>) -> Result<u32, WireError> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf).ok_or(WireError::Truncated)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32(cursor: &mut Cursor<'_>) -> Result<i32, WireError> {
    let mut buf = [0u8; 4];
    cursor.read_exact(&mut buf).ok_or(WireError::Truncated)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_i64(cursor: &mut Cursor<'_>) -> Result<i64, WireError> {
    let mut buf = [0u8; 8];
    cursor.read_exact(&mut buf).ok_or(WireError::Truncated)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_string(cursor: &mut Cursor<'_>) -> Result<String, WireError> {
    let len = read_u16(cursor)? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).ok_or(WireError::Truncated)?;
    let text = str::from_utf8(&buf).map_err(|_| WireError::InvalidUtf8)?;
    Ok(text.to_owned())
}

fn read_path(cursor: &mut Cursor<'_>) -> Result<String, WireError> {
    let path = read_string(cursor)?;
    validate_path(&path)?;
    Ok(path)
}

fn read_bytes(cursor: &mut Cursor<'_>) -> Result<Vec<u8>, WireError> {
    let len = read_u32(cursor)? as usize;
    // Bound the allocation by what the frame can actually hold.
    if len > cursor.remaining() {
        return Err(WireError::Truncated);
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).ok_or(WireError::Truncated)?;
    Ok(buf)
}

fn read_stub(cursor: &mut Cursor<'_>) -> Result<StubRef, WireError> {
    let iface = Iface::from_raw(read_u8(cursor)?)?;
    let addr = read_string(cursor)?;
    validate_addr(&addr)?;
    Ok(StubRef { iface, addr })
}

fn put_string(buffer: &mut Vec<u8>, value: &str) -> Result<(), WireError> {
    let len: u16 = value
        .len()
        .try_into()
        .map_err(|_| WireError::Oversize(value.len()))?;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(value.as_bytes());
    Ok(())
}

fn put_path(buffer: &mut Vec<u8>, path: &str) -> Result<(), WireError> {
    validate_path(path)?;
    put_string(buffer, path)
}

fn put_bytes(buffer: &mut Vec<u8>, data: &[u8]) -> Result<(), WireError> {
    let len: u32 = data
        .len()
        .try_into()
        .map_err(|_| WireError::Oversize(data.len()))?;
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(data);
    Ok(())
}

fn put_stub(buffer: &mut Vec<u8>, stub: &StubRef) -> Result<(), WireError> {
    validate_addr(&stub.addr)?;
    buffer.push(stub.iface as u8);
    put_string(buffer, &stub.addr)
}

/// Canonical form: `/` alone, or `/`-joined non-empty components with no
/// colon, no doubled slash, no trailing slash, no surrounding whitespace.
fn validate_path(path: &str) -> Result<(), WireError> {
    if path == "/" {
        return Ok(());
    }
    if !path.starts_with('/') || path.contains(':') || path.ends_with('/') {
        return Err(WireError::InvalidPath);
    }
    for component in path[1..].split('/') {
        if component.is_empty() || component != component.trim() {
            return Err(WireError::InvalidPath);
        }
    }
    Ok(())
}

fn validate_addr(addr: &str) -> Result<(), WireError> {
    let (host, port) = addr.rsplit_once(':').ok_or(WireError::InvalidAddress)?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(WireError::InvalidAddress);
    }
    Ok(())
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Option<()> {
        let end = self.pos.checked_add(out.len())?;
        if end > self.buf.len() {
            return None;
        }
        out.copy_from_slice(&self.buf[self.pos..end]);
        self.pos = end;
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn reject_non_canonical_paths_during_encoding() {
        let req = Request {
            tag: 1,
            body: RequestBody::Create {
                path: "/a//b".to_string(),
            },
        };
        assert_eq!(encode_request(&req), Err(WireError::InvalidPath));
    }

    #[test]
    fn reject_relative_paths_during_decoding() {
        let req = Request {
            tag: 1,
            body: RequestBody::Size {
                path: "/ok".to_string(),
            },
        };
        let mut frame = encode_request(&req).expect("encode frame");
        // The path field starts after size, type and tag; overwrite the
        // leading slash so decode-side validation must catch it.
        frame[9] = b'x';
        assert_eq!(decode_request(&frame), Err(WireError::InvalidPath));
    }

    #[test]
    fn detect_truncated_frames() {
        let req = Request {
            tag: 9,
            body: RequestBody::List {
                path: "/".to_string(),
            },
        };
        let mut frame = encode_request(&req).expect("encode frame");
        frame.truncate(4);
        assert_eq!(decode_request(&frame), Err(WireError::Truncated));
    }

    #[test]
    fn detect_length_mismatch() {
        let req = Request {
            tag: 9,
            body: RequestBody::List {
                path: "/".to_string(),
            },
        };
        let mut frame = encode_request(&req).expect("encode frame");
        frame.push(0);
        assert!(matches!(
            decode_request(&frame),
            Err(WireError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn error_reply_round_trips_its_kind() {
        let response = Response {
            tag: 3,
            body: ResponseBody::Error {
                kind: ErrorKind::OutOfBounds,
                message: "range".to_string(),
            },
        };
        let frame = encode_response(&response).expect("encode frame");
        assert_eq!(decode_response(&frame).expect("decode frame"), response);
    }

    #[test]
    fn reject_unknown_error_kind() {
        let response = Response {
            tag: 3,
            body: ResponseBody::Error {
                kind: ErrorKind::NotFound,
                message: "m".to_string(),
            },
        };
        let mut frame = encode_response(&response).expect("encode frame");
        // Corrupt the kind string in place ("NotFound" -> "XotFound").
        frame[9] = b'X';
        assert_eq!(decode_response(&frame), Err(WireError::UnknownErrorKind));
    }
}
