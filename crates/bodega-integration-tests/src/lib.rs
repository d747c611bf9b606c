//! This crate hosts cross-crate integration tests only; see `tests/`.
