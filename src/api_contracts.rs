/**
 * API Contract Types for the Google REST endpoints
 *
 * These types mirror the JSON bodies exchanged with:
 * - the OAuth 2.0 token endpoint (JWT bearer grant)
 * - Cloud Firestore v1 `documents:commit` and document listing
 * - Cloud Storage JSON API object uploads
 *
 * Principles:
 * - Only the fields we read or write are modelled
 * - Firestore uses camelCase on the wire, Storage too
 * - Optional response fields are `Option<T>` so partial responses still parse
 */

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// =============================================================================
// OAuth token endpoint
// =============================================================================

/// Claims of the signed assertion sent to the token endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Successful token response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
}

// =============================================================================
// Firestore values and documents
// =============================================================================

/// A typed Firestore value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FirestoreValue {
    StringValue(String),
    /// Int64 values travel as decimal strings
    IntegerValue(String),
    DoubleValue(f64),
    BooleanValue(bool),
    NullValue(()),
    /// RFC 3339 timestamp
    TimestampValue(String),
    /// Base64 encoded
    BytesValue(String),
    /// Full resource name of another document
    ReferenceValue(String),
    GeoPointValue(LatLng),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

/// Zero coordinates are omitted on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArrayValue {
    #[serde(default)]
    pub values: Vec<FirestoreValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapValue {
    #[serde(default)]
    pub fields: BTreeMap<String, FirestoreValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FirestoreDocument {
    /// Full resource name: `projects/{p}/databases/(default)/documents/{collection}/{id}`
    pub name: String,
    pub fields: BTreeMap<String, FirestoreValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Precondition {
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    /// Always `REQUEST_TIME`, the only server value Firestore offers
    pub set_to_server_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    pub update: FirestoreDocument,
    pub current_document: Precondition,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_transforms: Vec<FieldTransform>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    #[serde(default)]
    pub update_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub write_results: Vec<WriteResult>,
    #[serde(default)]
    pub commit_time: Option<String>,
}

/// A document as returned by a list call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListedDocument {
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FirestoreValue>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// One page of `GET .../documents/{collection}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    /// Absent when the page is empty
    #[serde(default)]
    pub documents: Vec<ListedDocument>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// =============================================================================
// Cloud Storage objects
// =============================================================================

/// Metadata part of a multipart upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub name: String,
    pub content_type: String,
    /// Custom key/value metadata stored with the object
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Object resource returned after an upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredObject {
    pub name: String,
    pub bucket: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// Byte size, sent as a decimal string
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub generation: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
