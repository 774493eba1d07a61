//! # Corpus Bridge
//!
//! A sync bridge between a CMS content store and a Gemini File Search
//! corpus, with AI-powered search and chat on top.
//!
//! Corpus Bridge mirrors published content into a local SQLite database,
//! transforms it to Markdown documents, and keeps a remote File Search
//! store in lockstep as content is saved and deleted. On the serving
//! side it offers FTS5-backed autocomplete and grounded chat answers
//! with cited sources, via a CLI and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Content      │──▶│  Sync engine  │──▶│ File Search    │
//! │ events       │   │ mirror+push  │   │ store (Gemini) │
//! └──────────────┘   └──────┬───────┘   └───────┬───────┘
//!                           │                   │
//!                     ┌─────▼─────┐       ┌─────▼─────┐
//!                     │  SQLite   │       │ generate  │
//!                     │ FTS5 mirror│       │ + cite    │
//!                     └─────┬─────┘       └─────┬─────┘
//!                           ▼                   ▼
//!                      autocomplete         chat answers
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cbr init                          # create database
//! cbr credential set                # store the API key (encrypted)
//! cbr store create                  # create the File Search store
//! cbr types set post page           # choose indexable content types
//! cbr ingest events.json            # replay content events
//! cbr backfill --all                # push the whole corpus
//! cbr search "widget"               # FTS autocomplete
//! cbr chat                          # interactive grounded chat
//! cbr serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`settings`] | Key/value settings store |
//! | [`credentials`] | Encrypted API key storage |
//! | [`transform`] | HTML to Markdown document transform |
//! | [`gemini`] | File Search provider client |
//! | [`query`] | Generation request/response shaping |
//! | [`sync`] | Content sync orchestration |
//! | [`search`] | FTS5 autocomplete |
//! | [`sanitize`] | Answer HTML sanitization |
//! | [`session`] | Chat and autocomplete session state |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod admin;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod db;
pub mod gemini;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod query;
pub mod sanitize;
pub mod search;
pub mod server;
pub mod session;
pub mod settings;
pub mod sync;
pub mod transform;
