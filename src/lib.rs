//! BrandIntel API Library
//!
//! Backend for a guided brand-intelligence demo: variable selection, identity
//! enrichment of customer lists, aggregation into per-variable statistics,
//! assumption-gap detection, and LLM-narrated reports and audience queries.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `aggregation`: Variable aggregation engine.
//! - `catalog`: Identity-graph variable catalog.
//! - `comparison`: Assumption-comparison rules.
//! - `config`: Configuration management.
//! - `devlog`: Development-mode JSON-lines logging.
//! - `enrichment`: Batch customer enrichment.
//! - `errors`: Error handling types.
//! - `fallbacks`: Canned LLM fallbacks.
//! - `handlers`: HTTP request handlers.
//! - `identity_client`: Identity-resolution API client.
//! - `ingest`: CSV and sample customer lists.
//! - `llm_client`: LLM messages API client.
//! - `models`: Core data models.
//! - `prompts`: LLM prompt builders.
//! - `response_parser`: LLM response parsing.
//! - `services`: Narrative orchestration with fallbacks.

pub mod api;
pub mod core;
pub mod integrations;

pub mod aggregation;
pub mod catalog;
pub mod comparison;
pub mod config;
pub mod devlog;
pub mod enrichment;
pub mod errors;
pub mod fallbacks;
pub mod handlers;
pub mod identity_client;
pub mod ingest;
pub mod llm_client;
pub mod models;
pub mod prompts;
pub mod response_parser;
pub mod services;
