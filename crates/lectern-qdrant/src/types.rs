// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Qdrant REST request and response bodies.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateCollection {
    pub vectors: VectorParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorParams {
    pub size: usize,
    pub distance: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpsertPoints<'a> {
    pub points: Vec<PointStruct<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointStruct<'a> {
    pub id: &'a str,
    pub vector: &'a [f32],
    pub payload: &'a serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    pub vector: &'a [f32],
    pub limit: usize,
    pub score_threshold: f32,
    pub with_payload: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrollRequest {
    pub limit: usize,
    pub with_payload: bool,
    pub with_vector: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletePoints<'a> {
    pub points: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct CountRequest {
    pub exact: bool,
}

/// Envelope every Qdrant reply is wrapped in.
#[derive(Debug, Clone, Deserialize)]
pub struct QdrantResponse<T> {
    pub result: T,
}

/// Point ids are either unsigned integers or UUID strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Num(n) => write!(f, "{n}"),
            PointId::Uuid(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoredHit {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrollResult {
    pub points: Vec<Record>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Record {
    pub id: PointId,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CountResult {
    pub count: usize,
}
