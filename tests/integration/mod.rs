//! Integration tests for keypool
//!
//! These tests exercise the credential pool end to end: health transitions,
//! selection fairness, the model cascade, the HTTP surface and both storage
//! backends.

mod gemini_client;
mod redis_store;
mod selection;
