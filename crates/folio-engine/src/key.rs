//! Canonical cache keys.
//!
//! Two requests with the same meaning map to the same key: symbols are
//! sorted, constraints normalized, maps emitted in key order and signed
//! zeros folded. The key also carries the model version so a new estimation
//! model never serves results computed by an old one.

use std::fmt;

use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use folio_portfolio::{OptimizerError, OptimizerResult, OptimizationRequest, ReturnModel};

/// Identity of a cached computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    canonical: String,
    fingerprint: u64,
}

impl CacheKey {
    /// Key of a single optimization whose data comes from the provider.
    pub fn for_request(request: &OptimizationRequest, model_version: &str) -> OptimizerResult<Self> {
        let mut value = request_value(request)?;
        value["kind"] = json!("optimize");
        value["method"] = to_value(&request.method)?;
        value["model_version"] = json!(model_version);
        Ok(Self::from_value(value))
    }

    /// Key of a frontier sweep.
    ///
    /// The method of the request plays no part in a frontier and is left out.
    pub fn for_frontier(
        request: &OptimizationRequest,
        points: usize,
        model_version: &str,
    ) -> OptimizerResult<Self> {
        let mut value = request_value(request)?;
        value["kind"] = json!("frontier");
        value["points"] = json!(points);
        value["model_version"] = json!(model_version);
        Ok(Self::from_value(value))
    }

    /// Key of an optimization over caller-supplied moments.
    ///
    /// The model enters through a digest of its metadata and the exact bit
    /// patterns of `μ` and `Σ`.
    pub fn for_model(
        request: &OptimizationRequest,
        model: &ReturnModel,
        model_version: &str,
    ) -> OptimizerResult<Self> {
        let mut value = request_value(request)?;
        value["kind"] = json!("model");
        value["method"] = to_value(&request.method)?;
        value["model"] = json!(model_digest(model)?);
        value["model_version"] = json!(model_version);
        Ok(Self::from_value(value))
    }

    fn from_value(value: Value) -> Self {
        let canonical = fold_signed_zeros(value).to_string();
        let digest = Sha256::digest(canonical.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self {
            canonical,
            fingerprint: u64::from_be_bytes(bytes),
        }
    }

    /// Canonical JSON form.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Stable 64-bit digest of the canonical form, for logs.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.fingerprint)
    }
}

fn to_value<T: Serialize>(value: &T) -> OptimizerResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| OptimizerError::invalid_request(format!("request is not serializable: {}", e)))
}

fn request_value(request: &OptimizationRequest) -> OptimizerResult<Value> {
    Ok(json!({
        "symbols": request.canonical_symbols(),
        "constraints": to_value(&request.constraints.normalized())?,
        "risk_free_rate": request.risk_free_rate,
        "benchmark": request.benchmark,
        "lookback": to_value(&request.lookback)?,
    }))
}

fn model_digest(model: &ReturnModel) -> OptimizerResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(to_value(&model.assets)?.to_string().as_bytes());
    for v in model.mu.iter().chain(model.covariance.iter()) {
        hasher.update((v + 0.0).to_bits().to_be_bytes());
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect())
}

/// Rewrites every `-0.0` as `0.0`.
///
/// Object keys need no treatment: `serde_json` maps are ordered.
fn fold_signed_zeros(value: Value) -> Value {
    match value {
        Value::Number(n) if n.as_f64() == Some(0.0) && n.is_f64() => json!(0.0),
        Value::Array(items) => Value::Array(items.into_iter().map(fold_signed_zeros).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, fold_signed_zeros(v)))
                .collect(),
        ),
        other => other,
    }
}
