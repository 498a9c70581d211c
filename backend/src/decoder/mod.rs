//! VIN decode service client.
//!
//! Looks up one VIN at a time against the NHTSA vPIC `DecodeVin` endpoint
//! (or any service with the same response shape) and flattens the
//! `{"Results": [{"Variable", "Value"}, ...]}` list into a [`DecodedResult`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use autovin::decoder::{decode_vin, DecoderClient};
//!
//! let client = DecoderClient::from_env()?;
//! let decoded = decode_vin(&client, "1HGCM82633A004352").await?;
//! println!("{:?}", decoded.make);
//! ```

use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::future::Future;
use std::time::Duration;

use crate::error::{DecodeError, DecodeResult};
use crate::models::{compact_vin, DecodedResult, COUNTRY_US, NOT_AVAILABLE};

/// Public NHTSA vPIC vehicles API.
pub const DEFAULT_BASE_URL: &str = "https://vpic.nhtsa.dot.gov/api/vehicles";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the base URL
pub const ENV_DECODER_URL: &str = "AUTOVIN_DECODER_URL";

/// Environment variable overriding the timeout
pub const ENV_TIMEOUT_SECS: &str = "AUTOVIN_TIMEOUT_SECS";

// Variable names in the service response
const VAR_MODEL_YEAR: &str = "Model Year";
const VAR_MAKE: &str = "Make";
const VAR_MODEL: &str = "Model";
const VAR_FUEL: &str = "Fuel Type - Primary";
const VAR_VEHICLE_TYPE: &str = "Vehicle Type";
const VAR_ERROR_TEXT: &str = "Error Text";

/// Source of raw decode responses.
///
/// Implemented by [`DecoderClient`] over HTTP; tests and offline runs can
/// provide canned bodies instead.
pub trait VinLookup {
    /// Fetch the raw response body for an already space-stripped VIN.
    fn fetch(&self, vin: &str) -> impl Future<Output = DecodeResult<String>> + Send;

    /// Identifies the source in cache fingerprints.
    fn source_id(&self) -> String;
}

/// vPIC HTTP client
#[derive(Clone)]
pub struct DecoderClient {
    base_url: String,
    timeout: Duration,
    http: reqwest::Client,
}

/// Decode response structure
#[derive(Debug, Deserialize)]
struct DecodeResponse {
    #[serde(rename = "Results")]
    results: Vec<DecodeVariable>,
}

#[derive(Debug, Deserialize)]
struct DecodeVariable {
    #[serde(rename = "Variable")]
    variable: Option<String>,
    #[serde(rename = "Value")]
    value: Option<Value>,
}

impl DecoderClient {
    /// Create a client for `base_url` with the default timeout.
    ///
    /// Certificate verification stays enabled.
    pub fn new(base_url: impl Into<String>) -> DecodeResult<Self> {
        Self::build(base_url.into(), Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a client from `AUTOVIN_DECODER_URL` / `AUTOVIN_TIMEOUT_SECS`
    pub fn from_env() -> DecodeResult<Self> {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        let base_url = env::var(ENV_DECODER_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::build(base_url, Duration::from_secs(timeout_secs))
    }

    /// Set the base URL
    pub fn with_base_url(self, base_url: &str) -> DecodeResult<Self> {
        Self::build(base_url.to_string(), self.timeout)
    }

    /// Set the request timeout
    pub fn with_timeout(self, timeout: Duration) -> DecodeResult<Self> {
        Self::build(self.base_url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build(base_url: String, timeout: Duration) -> DecodeResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DecodeError::Client(e.to_string()))?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    /// `<base>/DecodeVin/<vin>?format=json`, VIN percent-encoded
    pub fn lookup_url(&self, vin: &str) -> DecodeResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DecodeError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| DecodeError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push("DecodeVin")
            .push(vin);
        url.query_pairs_mut().append_pair("format", "json");

        Ok(url)
    }

    /// Single GET, body returned whatever the status
    async fn call_api(&self, vin: &str) -> DecodeResult<String> {
        let url = self.lookup_url(vin)?;
        let response = self.http.get(url).send().await?;
        let body = response.text().await?;
        Ok(body)
    }
}

impl VinLookup for DecoderClient {
    fn fetch(&self, vin: &str) -> impl Future<Output = DecodeResult<String>> + Send {
        self.call_api(vin)
    }

    fn source_id(&self) -> String {
        self.base_url.clone()
    }
}

/// Decode one VIN as authored: strip spaces, fetch, parse.
///
/// Transport failures are errors; an unusable body is not.
pub async fn decode_vin<L: VinLookup>(lookup: &L, raw_vin: &str) -> DecodeResult<DecodedResult> {
    let vin = compact_vin(raw_vin);
    let body = lookup.fetch(&vin).await?;
    Ok(parse_decode_body(&vin, &body))
}

/// Flatten a response body into a [`DecodedResult`].
///
/// Bodies that are not JSON, or JSON without a `Results` list, yield
/// [`DecodedResult::unparsable`].
pub fn parse_decode_body(vin: &str, body: &str) -> DecodedResult {
    let response: DecodeResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(_) => return DecodedResult::unparsable(vin),
    };

    // Later duplicates win
    let mut values: HashMap<String, Option<String>> = HashMap::new();
    for item in response.results {
        if let Some(variable) = item.variable {
            values.insert(variable, item.value.and_then(value_to_string));
        }
    }

    let field = |name: &str| -> Option<String> {
        match values.get(name) {
            Some(value) => value.clone(),
            None => Some(NOT_AVAILABLE.to_string()),
        }
    };

    DecodedResult {
        vin: vin.to_string(),
        year: field(VAR_MODEL_YEAR),
        make: field(VAR_MAKE),
        model: field(VAR_MODEL),
        fuel: field(VAR_FUEL),
        country: COUNTRY_US.to_string(),
        vehicle_type: field(VAR_VEHICLE_TYPE),
        error_code: field(VAR_ERROR_TEXT),
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
