//! # Data Store Adapter
//!
//! Grid and data-binding components talk to their data through a small contract: load a
//! page, fetch a record by key, insert, update and remove by key, and tell what the key of
//! a record is. [`NapDataStore`] implements that contract on top of a [`NapConnection`],
//! and [`DataSource`] adds grid-side paging on top of a store.
//!
//! Keys are normalized into filters before hitting the backend:
//!
//! | key handed in                 | filter sent                                   |
//! |-------------------------------|-----------------------------------------------|
//! | `7` / `"abc"`                 | `[keys[0], "=", 7]`                           |
//! | `{"a": 1, "b": 2}`            | `[["a", "=", 1], "AND", ["b", "=", 2]]`       |
//! | `{"a": 1}`                    | `["a", "=", 1]`                               |
//! | `["a", ">", 1]` (a filter)    | unchanged                                     |
mod data_source;

pub use data_source::DataSource;

use crate::{
    client::{NapConnection, RequestError},
    http::{HttpTransport, Transport},
    types::{Connector, Filter, FilterSource, Key, ListOptions, NapResponse, ResponseFailure},
};
use serde_json::{Map, Value};

/// Key field used when none is given.
pub const DEFAULT_KEY: &str = "_id";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Request(#[from] RequestError),
    /// The backend answered with a non-success envelope.
    #[error("{0}")]
    Rejected(#[from] ResponseFailure),
}

/// One page of records, as handed back to a grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    pub data: Vec<Value>,
    pub total_count: u64,
    /// `false` when `total_count` is only the length of `data`.
    pub total_reported: bool,
}

/// Store bound to one resource. See the [module docs](self).
#[derive(Debug)]
pub struct NapDataStore<T = HttpTransport> {
    resource: String,
    conn: NapConnection<T>,
    key_fields: Vec<String>,
    filter: Option<FilterSource>,
}

impl<T> Clone for NapDataStore<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            conn: self.conn.clone(),
            key_fields: self.key_fields.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<T> NapDataStore<T> {
    pub fn new(resource: impl Into<String>, conn: NapConnection<T>) -> Self {
        Self {
            resource: resource.into(),
            conn,
            key_fields: vec![DEFAULT_KEY.to_string()],
            filter: None,
        }
    }

    /// Replaces the key fields. An empty list keeps the current ones.
    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if !keys.is_empty() {
            self.key_fields = keys;
        }
        self
    }

    pub fn with_filter(mut self, filter: impl Into<FilterSource>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn set_filter(&mut self, filter: Option<FilterSource>) {
        self.filter = filter;
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// The key field(s) of the resource.
    pub fn key(&self) -> &[String] {
        &self.key_fields
    }

    /// The key of `record`: an object holding each key field (absent ones as `null`).
    pub fn key_of(&self, record: Option<&Value>) -> Map<String, Value> {
        let Some(record) = record.filter(|r| !r.is_null()) else {
            return Map::new();
        };
        self.key_fields
            .iter()
            .map(|field| {
                (
                    field.clone(),
                    record.get(field).cloned().unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Turns a key into the filter selecting its record(s).
    pub fn key_filter(&self, key: impl Into<Key>) -> Filter {
        match key.into() {
            Key::Filter(filter) => filter,
            Key::Scalar(value) => Filter::raw(Value::Array(vec![
                self.first_key_field(),
                Value::String("=".to_string()),
                value,
            ])),
            Key::Fields(fields) => Filter::join(
                fields
                    .into_iter()
                    .map(|(field, value)| Filter::eq(field, value)),
                Connector::And,
            ),
        }
    }

    fn first_key_field(&self) -> Value {
        self.key_fields
            .first()
            .map(|f| Value::String(f.clone()))
            .unwrap_or(Value::Null)
    }
}

impl<T: Transport> NapDataStore<T> {
    /// Loads the records matching the store filter, shaped by `options` (paging, sort...).
    ///
    /// `total_count` is the server's `totalCount` when it reports a non-zero one, and the
    /// number of returned records otherwise.
    pub async fn load(&self, options: Option<ListOptions>) -> Result<LoadResult, StoreError> {
        let filter = self.filter.as_ref().map(FilterSource::resolve);
        let response = self.conn.list::<Value>(&self.resource, filter, options).await?;

        let reported = response.total_count.filter(|n| *n > 0);
        let data = accept(response)?.unwrap_or_default();

        Ok(LoadResult {
            total_count: reported.unwrap_or(data.len() as u64),
            total_reported: reported.is_some(),
            data,
        })
    }

    /// Total number of records matching the store filter.
    pub async fn total_count(&self, options: Option<ListOptions>) -> Result<u64, StoreError> {
        Ok(self.load(options).await?.total_count)
    }

    /// The first record matching `key`, if any.
    pub async fn by_key(&self, key: impl Into<Key>) -> Result<Option<Value>, StoreError> {
        let key = match key.into() {
            Key::Scalar(Value::String(s)) => {
                let mut fields = Map::new();
                if let Some(field) = self.key_fields.first() {
                    fields.insert(field.clone(), Value::String(s));
                }
                Key::Fields(fields)
            }
            other => other,
        };
        let filter = self.key_filter(key);

        let response = self
            .conn
            .list::<Value>(&self.resource, Some(filter), None)
            .await?;

        Ok(accept(response)?.and_then(|records| records.into_iter().next()))
    }

    /// Inserts `values` and returns what the backend stored. An `_id` is never sent.
    pub async fn insert(&self, mut values: Value) -> Result<Option<Value>, StoreError> {
        if let Some(object) = values.as_object_mut() {
            object.remove(DEFAULT_KEY);
        }

        let response = self
            .conn
            .insert::<_, Value>(&self.resource, &values, None)
            .await?;

        Ok(accept(response)?)
    }

    pub async fn update(
        &self,
        key: impl Into<Key>,
        values: Value,
    ) -> Result<Option<Value>, StoreError> {
        let filter = self.key_filter(key);

        let response = self
            .conn
            .update::<_, Value>(&self.resource, &values, filter, None)
            .await?;

        Ok(accept(response)?)
    }

    pub async fn remove(&self, key: impl Into<Key>) -> Result<(), StoreError> {
        let filter = self.key_filter(key);

        let response = self
            .conn
            .delete::<Value>(&self.resource, filter, None)
            .await?;

        accept(response)?;
        Ok(())
    }
}

fn accept<R>(response: NapResponse<R>) -> Result<Option<R>, StoreError> {
    response.into_result().map_err(|failure| {
        tracing::debug!(%failure, "store operation rejected");
        StoreError::Rejected(failure)
    })
}

/// Factory for stores and data sources sharing one connection.
#[derive(Debug)]
pub struct StoreService<T = HttpTransport> {
    conn: NapConnection<T>,
}

impl<T> Clone for StoreService<T> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

impl<T> StoreService<T> {
    pub fn new(conn: NapConnection<T>) -> Self {
        Self { conn }
    }

    /// A store for `resource`, keyed by `keys` (`["_id"]` when empty).
    pub fn data_store<I, S>(
        &self,
        resource: &str,
        keys: I,
        filter: Option<FilterSource>,
    ) -> NapDataStore<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut store = NapDataStore::new(resource, self.conn.clone()).with_keys(keys);
        store.set_filter(filter);
        store
    }

    /// A paging data source over a new store for `resource`.
    pub fn data_source<I, S>(
        &self,
        resource: &str,
        keys: I,
        filter: Option<FilterSource>,
    ) -> DataSource<T>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DataSource::new(self.data_store(resource, keys, filter))
    }
}
