//! Row streaming and typed-value decoding.
//!
//! `Rows` pulls result pages lazily: each store response is decoded into
//! generic `(name, value)` columns and buffered; further pages are requested
//! only when the buffer drains and a continuation token remains. Decoding
//! inverts the typed encoding the serializer produces, keeping number text
//! verbatim.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::debug;

use dynasql_core::error::Error;
use dynasql_model::AttributeValue;
use dynasql_model::error::StoreError;
use dynasql_model::input::{QueryInput, ScanInput};

use crate::context::ExecContext;
use crate::store::StoreClient;

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Null.
    Null,
    /// Boolean.
    Bool(bool),
    /// String.
    Text(String),
    /// Number, kept as its textual form.
    Number(String),
    /// Binary.
    Bytes(bytes::Bytes),
    /// List of values.
    List(Vec<SqlValue>),
    /// Nested document, sorted by key.
    Map(Vec<(String, SqlValue)>),
    /// String set.
    StringSet(Vec<String>),
    /// Number set (textual).
    NumberSet(Vec<String>),
    /// Binary set.
    BinarySet(Vec<bytes::Bytes>),
}

/// One decoded row: named columns sorted by attribute name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    /// All columns in name order.
    #[must_use]
    pub fn columns(&self) -> &[(String, SqlValue)] {
        &self.columns
    }

    /// Look up one column by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, value)| value)
    }
}

/// Decode a stored item into a row with name-sorted columns.
#[must_use]
pub fn decode_item(item: HashMap<String, AttributeValue>) -> Row {
    let mut columns: Vec<(String, SqlValue)> = item
        .into_iter()
        .map(|(name, value)| (name, decode_value(value)))
        .collect();
    columns.sort_by(|(a, _), (b, _)| a.cmp(b));
    Row { columns }
}

/// Decode one typed value, inverting the request encoding.
#[must_use]
pub fn decode_value(value: AttributeValue) -> SqlValue {
    match value {
        AttributeValue::S(s) => SqlValue::Text(s),
        AttributeValue::N(n) => SqlValue::Number(n),
        AttributeValue::B(b) => SqlValue::Bytes(b),
        AttributeValue::Bool(b) => SqlValue::Bool(b),
        AttributeValue::Null(_) => SqlValue::Null,
        AttributeValue::L(items) => SqlValue::List(items.into_iter().map(decode_value).collect()),
        AttributeValue::M(entries) => {
            let mut decoded: Vec<(String, SqlValue)> = entries
                .into_iter()
                .map(|(name, value)| (name, decode_value(value)))
                .collect();
            decoded.sort_by(|(a, _), (b, _)| a.cmp(b));
            SqlValue::Map(decoded)
        }
        AttributeValue::Ss(items) => SqlValue::StringSet(items),
        AttributeValue::Ns(items) => SqlValue::NumberSet(items),
        AttributeValue::Bs(items) => SqlValue::BinarySet(items),
    }
}

/// A lazily paginated result stream.
#[derive(Debug)]
pub struct Rows {
    source: RowsSource,
}

#[derive(Debug)]
enum RowsSource {
    Done,
    Single(Option<Row>),
    Paged(Box<PagedRows>),
}

#[derive(Debug)]
pub(crate) enum PageRequest {
    Query(QueryInput),
    Scan(ScanInput),
}

#[derive(Debug)]
struct PagedRows {
    store: Arc<dyn StoreClient>,
    ctx: ExecContext,
    request: PageRequest,
    buffer: VecDeque<Row>,
    next_key: HashMap<String, AttributeValue>,
    /// Rows still to emit; `None` is unbounded.
    remaining: Option<i32>,
    page_size: Option<i32>,
    started: bool,
    finished: bool,
}

impl Rows {
    /// A stream over at most one item (point get).
    pub(crate) fn single(item: Option<HashMap<String, AttributeValue>>) -> Self {
        Self {
            source: RowsSource::Single(item.map(decode_item)),
        }
    }

    /// A paginating stream. The statement's row limit arrives inside the
    /// request; a limit of zero never touches the store.
    pub(crate) fn paged(
        store: Arc<dyn StoreClient>,
        ctx: ExecContext,
        mut request: PageRequest,
        page_size: Option<i32>,
        default_limit: Option<i32>,
    ) -> Self {
        let remaining = match &mut request {
            PageRequest::Query(input) => input.limit.take(),
            PageRequest::Scan(input) => input.limit.take(),
        }
        .or(default_limit);

        if remaining == Some(0) {
            return Self {
                source: RowsSource::Done,
            };
        }

        Self {
            source: RowsSource::Paged(Box::new(PagedRows {
                store,
                ctx,
                request,
                buffer: VecDeque::new(),
                next_key: HashMap::new(),
                remaining,
                page_size,
                started: false,
                finished: false,
            })),
        }
    }

    /// Fetch the next row, requesting further pages as needed.
    ///
    /// # Errors
    ///
    /// Surfaces store failures and [`Error::Cancelled`] between pages.
    pub async fn next(&mut self) -> Result<Option<Row>, Error> {
        let result = match &mut self.source {
            RowsSource::Done => return Ok(None),
            RowsSource::Single(item) => return Ok(item.take()),
            RowsSource::Paged(paged) => paged.next().await,
        };
        if matches!(result, Ok(None) | Err(_)) {
            self.source = RowsSource::Done;
        }
        result
    }

    /// Drop any buffered rows and stop paginating.
    pub fn close(&mut self) {
        self.source = RowsSource::Done;
    }
}

impl PagedRows {
    async fn next(&mut self) -> Result<Option<Row>, Error> {
        loop {
            if self.remaining == Some(0) {
                return Ok(None);
            }
            if let Some(row) = self.buffer.pop_front() {
                if let Some(remaining) = &mut self.remaining {
                    *remaining -= 1;
                }
                return Ok(Some(row));
            }
            if self.finished {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    async fn fetch_page(&mut self) -> Result<(), Error> {
        let page_limit = match (self.remaining, self.page_size) {
            (Some(remaining), Some(page)) => Some(remaining.min(page)),
            (Some(remaining), None) => Some(remaining),
            (None, page) => page,
        };

        let (items, next_key) = match &self.request {
            PageRequest::Query(input) => {
                let mut input = input.clone();
                input.limit = page_limit;
                input.exclusive_start_key = std::mem::take(&mut self.next_key);
                let output = self
                    .ctx
                    .run(self.store.query(input))
                    .await?
                    .map_err(store_error)?;
                (output.items, output.last_evaluated_key)
            }
            PageRequest::Scan(input) => {
                let mut input = input.clone();
                input.limit = page_limit;
                input.exclusive_start_key = std::mem::take(&mut self.next_key);
                let output = self
                    .ctx
                    .run(self.store.scan(input))
                    .await?
                    .map_err(store_error)?;
                (output.items, output.last_evaluated_key)
            }
        };

        debug!(
            items = items.len(),
            more = !next_key.is_empty(),
            first_page = !self.started,
            "fetched result page"
        );
        self.started = true;
        self.buffer.extend(items.into_iter().map(decode_item));
        if next_key.is_empty() {
            self.finished = true;
        } else {
            self.next_key = next_key;
        }
        Ok(())
    }
}

fn store_error(source: StoreError) -> Error {
    Error::Store { source, row: None }
}
