// Copyright (c) 2024 nci-core contributors
//
// Redistribution and use in source and binary forms, with or without
// modification, are permitted provided that the following conditions are
// met:
//
//     * Redistributions of source code must retain the above copyright
//       notice, this list of conditions and the following disclaimer.
//     * Redistributions in binary form must reproduce the above
//       copyright notice, this list of conditions and the following
//       disclaimer in the documentation and/or other materials provided
//       with the distribution.
//     * Neither the name of the copyright holder nor the names of its
//       contributors may be used to endorse or promote products derived
//       from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS
// "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT
// LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR
// A PARTICULAR PURPOSE ARE DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT
// OWNER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT
// LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR SERVICES; LOSS OF USE,
// DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY
// THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT
// (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
// OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

//! Crate-wide error types.

use thiserror::Error;

/// Errors surfaced by the HAL boundary.
#[derive(Error, Debug)]
pub enum HalError {
    /// The underlying transport failed to start.
    #[error("HAL failed to start")]
    StartFailed,
    /// The underlying transport reported an I/O failure.
    #[error("HAL I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A write was requested while the HAL was not started.
    #[error("HAL not started")]
    NotStarted,
}

/// Errors surfaced by the core (SAR, state machine, façade) to consumers.
#[derive(Error, Debug)]
pub enum Error {
    /// The HAL transport failed.
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),
    /// A packet violated NCI framing rules (bad CID, mismatched fragments,
    /// unsupported message type, truncated packet).
    #[error("protocol framing error: {0}")]
    Protocol(&'static str),
    /// A command did not receive a response within `cmd_timeout`.
    #[error("command timed out")]
    Timeout,
    /// A pending command was superseded or explicitly cancelled.
    #[error("command cancelled")]
    Cancelled,
    /// The NFCC reported a non-OK status for a command that cannot proceed
    /// without it.
    #[error("NFCC reported failure, status=0x{status:02x}")]
    NfccFailure {
        /// The NCI status byte returned by the NFCC.
        status: u8,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
