// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Wire protocol shared by HiveFS stubs and skeletons.
// Author: Lukas Bower

//! Framed request/reply protocol for HiveFS remote invocation.
//!
//! Every remote call is one tagged request frame followed by one tagged
//! reply frame over a stream socket. The crate is `no_std` so the same
//! codec can back host tooling and embedded deployments alike.

#![no_std]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod codec;
pub mod types;

pub use codec::{decode_request, decode_response, encode_request, encode_response};
pub use types::{
    ErrorKind, Iface, RemoteError, Request, RequestBody, Response, ResponseBody, StubRef,
    WireError, MAX_FRAME, REGISTRATION_PORT, SERVICE_PORT,
};
