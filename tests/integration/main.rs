//! Integration tests: the full fetch → normalize → detect → persist
//! cycle against a scripted provider and an in-memory store.

mod mock_provider;
mod pipeline;
