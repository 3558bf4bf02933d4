//! Point-of-interest queries and their query-language serialisation.
//!
//! A [`QueryRequest`] is the loosely typed wire input accepted from callers.
//! Validation turns it into a [`QuerySpec`], whose [`QuerySpec::to_query`]
//! output doubles as the cache key: two queries that serialise identically share
//! a cache entry, while reordering rules or values yields a distinct key.
//!
//! # Examples
//!
//! ```
//! use poi_gateway_core::{GeoCenter, QuerySpec, TagRule};
//!
//! let spec = QuerySpec::new(
//!     vec![TagRule::new("tourism", ["museum"])],
//!     GeoCenter::new(51.5, -0.1),
//! )
//! .with_radius_meters(500.0)
//! .with_max_results(20.0);
//!
//! let query = spec.to_query();
//! assert!(query.contains(r#"node["tourism"="museum"](around:500,51.5,-0.1);"#));
//! assert!(query.ends_with("out center 20;"));
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use thiserror::Error;

/// Search radius used when the caller omits one or supplies an unusable value.
pub const DEFAULT_RADIUS_METERS: f64 = 10_000.0;

/// Result cap used when the caller omits one or supplies an unusable value.
pub const DEFAULT_MAX_RESULTS: u16 = 100;

/// Upper bound applied to every result cap.
pub const MAX_RESULTS_CEILING: u16 = 100;

/// Server-side evaluation limit embedded in every query.
const SERVER_TIMEOUT_SECS: u32 = 25;

/// One attribute filter. Each value expands to its own match clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    /// Tag key, e.g. `tourism`.
    pub key: String,
    /// Accepted tag values, in caller order.
    #[serde(default)]
    pub values: Vec<String>,
}

impl TagRule {
    /// Build a rule from a key and its accepted values.
    pub fn new<I, V>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Centre of the circular search area.
///
/// Coordinates are not range-checked; supplying a valid WGS84 position is the
/// caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCenter {
    /// Latitude in decimal degrees.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl GeoCenter {
    /// Create a centre from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// OSM element families matched by every clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    /// Point features.
    Node,
    /// Line and area features.
    Way,
    /// Multipolygons and other grouped features.
    Relation,
}

impl ElementKind {
    /// Element kinds in the order their clauses are emitted.
    pub const ALL: [Self; 3] = [Self::Node, Self::Way, Self::Relation];

    /// Query-language keyword for this element kind.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

/// A validated, immutable point-of-interest query.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    rules: Vec<TagRule>,
    center: GeoCenter,
    radius_meters: f64,
    max_results: u16,
}

impl QuerySpec {
    /// Create a query with the default radius and result cap.
    #[must_use]
    pub const fn new(rules: Vec<TagRule>, center: GeoCenter) -> Self {
        Self {
            rules,
            center,
            radius_meters: DEFAULT_RADIUS_METERS,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    /// Set the search radius. Non-positive or non-finite values fall back to
    /// [`DEFAULT_RADIUS_METERS`].
    #[must_use]
    pub fn with_radius_meters(mut self, radius_meters: f64) -> Self {
        self.radius_meters = normalise_radius(Some(radius_meters));
        self
    }

    /// Set the result cap, clamped by [`clamp_max_results`].
    #[must_use]
    pub fn with_max_results(mut self, max_results: f64) -> Self {
        self.max_results = clamp_max_results(Some(max_results));
        self
    }

    /// Tag rules in caller order.
    #[must_use]
    pub fn rules(&self) -> &[TagRule] {
        &self.rules
    }

    /// Centre of the search area.
    #[must_use]
    pub const fn center(&self) -> GeoCenter {
        self.center
    }

    /// Search radius in metres.
    #[must_use]
    pub const fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Effective result cap, always within `[1, MAX_RESULTS_CEILING]`.
    #[must_use]
    pub const fn max_results(&self) -> u16 {
        self.max_results
    }

    /// Serialise to the upstream query language.
    ///
    /// The output is also the cache key for this spec.
    #[must_use]
    pub fn to_query(&self) -> String {
        build_query(
            &self.rules,
            self.center,
            self.radius_meters,
            Some(f64::from(self.max_results)),
        )
    }
}

/// Build the query-language string for a rule set around `center`.
///
/// Every value of every rule emits one clause per [`ElementKind`], each
/// constrained to the circle of `radius_meters` around `center`. The result
/// cap is clamped with [`clamp_max_results`]. Output depends only on the
/// inputs, including rule and value order.
#[must_use]
pub fn build_query(
    rules: &[TagRule],
    center: GeoCenter,
    radius_meters: f64,
    max_results: Option<f64>,
) -> String {
    let limit = clamp_max_results(max_results);
    let radius = normalise_radius(Some(radius_meters));
    let area = format!(
        "(around:{radius},{},{})",
        center.latitude, center.longitude
    );

    let mut query = format!("[out:json][timeout:{SERVER_TIMEOUT_SECS}];\n(\n");
    for rule in rules {
        let key = escape(&rule.key);
        for value in &rule.values {
            let filter = format!("[\"{key}\"=\"{}\"]", escape(value));
            for kind in ElementKind::ALL {
                query.push_str(kind.keyword());
                query.push_str(&filter);
                query.push_str(&area);
                query.push_str(";\n");
            }
        }
    }
    query.push_str(");\n");
    query.push_str(&format!("out center {limit};"));
    query
}

/// Clamp a caller-supplied result cap into `[1, MAX_RESULTS_CEILING]`.
///
/// Absent, non-finite, zero, and negative inputs yield
/// [`DEFAULT_MAX_RESULTS`]. Fractional caps are truncated after clamping.
///
/// # Examples
///
/// ```
/// use poi_gateway_core::clamp_max_results;
///
/// assert_eq!(clamp_max_results(None), 100);
/// assert_eq!(clamp_max_results(Some(250.0)), 100);
/// assert_eq!(clamp_max_results(Some(0.4)), 1);
/// assert_eq!(clamp_max_results(Some(-3.0)), 100);
/// ```
#[must_use]
pub fn clamp_max_results(raw: Option<f64>) -> u16 {
    raw.filter(|value| value.is_finite() && *value > 0.0)
        .map_or(DEFAULT_MAX_RESULTS, |value| {
            truncate_cap(value.clamp(1.0, f64::from(MAX_RESULTS_CEILING)))
        })
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "callers clamp the value into [1, MAX_RESULTS_CEILING] first"
)]
fn truncate_cap(value: f64) -> u16 {
    value as u16
}

/// Resolve the search radius, substituting [`DEFAULT_RADIUS_METERS`] for
/// absent, non-finite, or non-positive input.
#[must_use]
pub fn normalise_radius(raw: Option<f64>) -> f64 {
    raw.filter(|value| value.is_finite() && *value > 0.0)
        .unwrap_or(DEFAULT_RADIUS_METERS)
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Errors returned by [`QueryRequest::into_spec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueryRequestError {
    /// The request carried no `rules` field.
    #[error("rules are required")]
    MissingRules,
    /// The request carried no `center` field.
    #[error("center is required")]
    MissingCenter,
}

/// Query input as submitted by callers.
///
/// `radiusMeters` and `maxResults` accept any JSON value; numbers and numeric
/// strings are honoured and everything else falls back to the defaults,
/// including numbers too large for an `f64`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Tag rules to match.
    #[serde(default)]
    pub rules: Option<Vec<TagRule>>,
    /// Centre of the search area.
    #[serde(default)]
    pub center: Option<GeoCenter>,
    /// Search radius in metres.
    #[serde(
        default,
        deserialize_with = "lenient_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub radius_meters: Option<Value>,
    /// Maximum number of results to request.
    #[serde(
        default,
        deserialize_with = "lenient_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_results: Option<Value>,
}

impl QueryRequest {
    /// Validate the request and build the immutable [`QuerySpec`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryRequestError`] when `rules` or `center` is absent.
    pub fn into_spec(self) -> Result<QuerySpec, QueryRequestError> {
        let rules = self.rules.ok_or(QueryRequestError::MissingRules)?;
        let center = self.center.ok_or(QueryRequestError::MissingCenter)?;
        let radius_meters = normalise_radius(self.radius_meters.as_ref().and_then(numeric));
        let max_results = clamp_max_results(self.max_results.as_ref().and_then(numeric));
        Ok(QuerySpec {
            rules,
            center,
            radius_meters,
            max_results,
        })
    }
}

/// Capture the field verbatim and decode it separately, so a value serde_json
/// cannot represent drops to `None` instead of failing the whole request.
fn lenient_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Box<RawValue>>::deserialize(deserializer)?;
    Ok(raw.and_then(|raw| serde_json::from_str(raw.get()).ok()))
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
