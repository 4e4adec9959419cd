// ABOUTME: Cryptography module for credential protection at rest
// ABOUTME: Exposes the symmetric token cipher used by the connection manager
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cryptographic utilities for stored provider credentials.

pub mod cipher;

pub use cipher::TokenCipher;
