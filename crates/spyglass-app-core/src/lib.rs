// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for Spyglass tools (config storage, settings).
//! Keeps host adapters thin: they supply a `ConfigStore`, this crate turns
//! stored settings into a configured engine and breakpoint.

pub mod config;
pub mod settings;
