//! VowDay Billing - Billing Ledger & Subscription Lifecycle Engine
//!
//! This crate keeps the money-side of the VowDay wedding-planning platform
//! consistent: gap-free sequential invoice numbering per calendar month,
//! subscription state driven by asynchronous gateway events, recurring
//! charge reconciliation and refunds that survive partial gateway failure.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
