//! Embedding crate
//!
//! Token id to dense vector lookup shared by the encoder and decoder. Each
//! owner builds its own table; nothing is tied.

pub mod token;

pub use token::{TokenEmbedding, TokenEmbeddingConfig, PADDING_ID};
