//! # conductor-provider-anthropic — Anthropic Messages API client
//!
//! A single non-streaming [`conductor_protocol::LmClient`] implementation.
//! The ReAct contract only needs `invoke(messages) -> text` (§1, §4.3), so
//! this crate carries none of the tool-use, streaming, or multimodal
//! surface a general-purpose provider client would.

#![deny(missing_docs)]

mod client;
mod error;
mod mapping;

pub use client::Anthropic;
