//! Firestore REST client
//!
//! Documents are created with a client-generated id in a single
//! `documents:commit` call, which is also where server timestamps are set.
//! Collections are read back page by page in document-name order.

use crate::api_contracts::{
    CommitRequest, CommitResponse, FieldTransform, FirestoreDocument, FirestoreValue, ListDocumentsResponse,
    ListedDocument, Precondition, Write,
};
use crate::auth::TokenProvider;
use crate::error::GatewayError;
use crate::gateway::{DocumentPage, FieldMap, FieldValue};
use crate::types::ExportedDocument;
use chrono::SecondsFormat;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Same alphabet and length as Firestore's own auto ids
const AUTO_ID_ALPHABET: [char; 62] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];
const AUTO_ID_LEN: usize = 20;

const SERVER_TIME: &str = "REQUEST_TIME";

pub fn generate_document_id() -> String {
    nanoid::nanoid!(AUTO_ID_LEN, &AUTO_ID_ALPHABET)
}

pub struct FirestoreClient {
    endpoint: String,
    project_id: String,
    client: reqwest::Client,
    tokens: Arc<TokenProvider>,
}

impl FirestoreClient {
    pub fn new(endpoint: String, project_id: String, client: reqwest::Client, tokens: Arc<TokenProvider>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id,
            client,
            tokens,
        }
    }

    fn database_path(&self) -> String {
        format!("projects/{}/databases/(default)", self.project_id)
    }

    /// URL of the commit endpoint
    fn commit_url(&self) -> String {
        format!("{}/v1/{}/documents:commit", self.endpoint, self.database_path())
    }

    /// Create a new document in `collection` and return its id
    pub async fn add_document(&self, collection: &str, fields: FieldMap) -> Result<String, GatewayError> {
        let id = generate_document_id();
        let name = format!("{}/documents/{}/{}", self.database_path(), collection, id);
        let request = build_create_request(name, fields);

        let token = self.tokens.access_token().await?;

        tracing::debug!(collection, id = %id, "Committing document");

        let response = self
            .client
            .post(self.commit_url())
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await
            .map_err(|e| GatewayError::network("firestore", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                service: "firestore",
                status,
                body,
            });
        }

        let _commit: CommitResponse = response.json().await.map_err(|e| GatewayError::InvalidResponse {
            service: "firestore",
            message: e.to_string(),
        })?;

        Ok(id)
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/v1/{}/documents/{}", self.endpoint, self.database_path(), collection)
    }

    /// Fetch one page of `collection`, ordered by document name
    pub async fn list_documents(
        &self,
        collection: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, GatewayError> {
        let mut query = vec![("pageSize", page_size.to_string()), ("orderBy", "__name__".to_string())];
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .get(self.collection_url(collection))
            .bearer_auth(&token)
            .query(&query)
            .send()
            .await
            .map_err(|e| GatewayError::network("firestore", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                service: "firestore",
                status,
                body,
            });
        }

        let listing: ListDocumentsResponse = response.json().await.map_err(|e| GatewayError::InvalidResponse {
            service: "firestore",
            message: e.to_string(),
        })?;

        tracing::debug!(collection, count = listing.documents.len(), "Listed documents");

        Ok(DocumentPage {
            documents: listing.documents.into_iter().map(export_document).collect(),
            next_page_token: listing.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

/// Strip the typed wrappers from a listed document
pub fn export_document(document: ListedDocument) -> ExportedDocument {
    let id = document.name.rsplit('/').next().unwrap_or_default().to_string();
    let data = document
        .fields
        .into_iter()
        .map(|(name, value)| (name, export_value(value)))
        .collect::<Map<String, Value>>();
    ExportedDocument { id, data }
}

/// Plain JSON for a typed value. Types JSON has no word for are wrapped in
/// a single-key object so they survive a round trip through the export file.
pub fn export_value(value: FirestoreValue) -> Value {
    match value {
        FirestoreValue::StringValue(s) => Value::String(s),
        FirestoreValue::IntegerValue(s) => match s.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::String(s),
        },
        FirestoreValue::DoubleValue(d) => serde_json::Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        FirestoreValue::BooleanValue(b) => Value::Bool(b),
        FirestoreValue::NullValue(()) => Value::Null,
        FirestoreValue::TimestampValue(ts) => json!({ "__timestamp__": ts }),
        FirestoreValue::BytesValue(b64) => json!({ "__bytes__": b64 }),
        FirestoreValue::ReferenceValue(name) => json!({ "__reference__": document_path(&name) }),
        FirestoreValue::GeoPointValue(point) => {
            json!({ "__geopoint__": format!("{},{}", point.latitude, point.longitude) })
        }
        FirestoreValue::ArrayValue(array) => Value::Array(array.values.into_iter().map(export_value).collect()),
        FirestoreValue::MapValue(map) => Value::Object(
            map.fields
                .into_iter()
                .map(|(name, value)| (name, export_value(value)))
                .collect(),
        ),
    }
}

/// `projects/p/databases/(default)/documents/users/u1` -> `users/u1`
fn document_path(resource_name: &str) -> &str {
    resource_name
        .split_once("/documents/")
        .map(|(_, path)| path)
        .unwrap_or(resource_name)
}

/// Build a commit request that creates `name` and fails if it already exists
pub fn build_create_request(name: String, fields: FieldMap) -> CommitRequest {
    let mut encoded = BTreeMap::new();
    let mut transforms = Vec::new();

    for (field, value) in fields {
        let wire = match value {
            FieldValue::String(s) => FirestoreValue::StringValue(s),
            FieldValue::Integer(i) => FirestoreValue::IntegerValue(i.to_string()),
            FieldValue::Boolean(b) => FirestoreValue::BooleanValue(b),
            FieldValue::Null => FirestoreValue::NullValue(()),
            FieldValue::Timestamp(ts) => {
                FirestoreValue::TimestampValue(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            FieldValue::ServerTimestamp => {
                transforms.push(FieldTransform {
                    field_path: field_path(&field),
                    set_to_server_value: SERVER_TIME.to_string(),
                });
                continue;
            }
        };
        encoded.insert(field, wire);
    }

    CommitRequest {
        writes: vec![Write {
            update: FirestoreDocument { name, fields: encoded },
            current_document: Precondition { exists: false },
            update_transforms: transforms,
        }],
    }
}

/// Quote a top-level field name unless it is a simple identifier
fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}
