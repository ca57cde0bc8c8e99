//! # Territory Arena Client Library
//!
//! Headless client for the territory arena. It keeps no simulation of its
//! own: the server is authoritative and the client only smooths what it
//! receives.
//!
//! ## Module Organization
//!
//! ### Time Sync (`time_sync`)
//! Estimates the server clock from ping round trips. Each reply yields an
//! offset sample and the mean of a bounded history is used.
//!
//! ### Reconciler (`reconciler`)
//! Buffers authoritative snapshots and renders the arena a fixed delay
//! behind the estimated server time:
//! - Interpolates heads between the two frames bracketing the target
//! - Follows turns recorded in the newer frame so corners stay sharp
//! - Falls back to dead reckoning when no newer frame has arrived
//!
//! ### Network (`network`)
//! UDP transport: connects, joins, pings, feeds snapshots to the reconciler
//! and optionally drives the snake with a scripted autopilot.

pub mod network;
pub mod reconciler;
pub mod time_sync;
