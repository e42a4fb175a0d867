//! Core types and trait definitions for Lifeline.
//!
//! Holds the check-in evaluator and lifecycle rules, the contact relationship
//! model, and the capability traits (`Remote`, `Auth`, `Clock`) that the sync
//! layer is written against. This crate performs no I/O.

pub mod auth;
pub mod checkin;
pub mod clock;
pub mod contact;
pub mod document;
pub mod error;
pub mod event;
pub mod interval;
pub mod remote;
pub mod user;

pub use error::{Error, Result};
