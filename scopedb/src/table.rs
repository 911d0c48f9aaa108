use serde::Deserialize;
use serde::de::IntoDeserializer;
use serde::de::value::{Error as ValueError, StrDeserializer};
use tracing::info;

use crate::bail;
use crate::client::Client;
use crate::error::{ErrorKind, ScopeDbResult};
use crate::protocol::DataType;
use crate::result::{FieldSchema, Schema, Value};

const DEFAULT_DATABASE: &str = "scopedb";
const DEFAULT_SCHEMA: &str = "public";

/// A table like object (table, view, ...) of a ScopeDB server.
#[derive(Debug, Clone)]
pub struct Table {
    client: Client,
    database: Option<String>,
    schema: Option<String>,
    name: String,
}

impl Table {
    pub(crate) fn new(client: Client, name: String) -> Self {
        Self {
            client,
            database: None,
            schema: None,
            name,
        }
    }

    /// Qualifies the table with a database. A schema should be set as well.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backtick quoted identifier, e.g. `` `db`.`public`.`events` ``.
    pub fn identifier(&self) -> String {
        let mut identifier = String::new();
        for part in [&self.database, &self.schema].into_iter().flatten() {
            identifier.push_str(&quote_ident(part, '`'));
            identifier.push('.');
        }
        identifier.push_str(&quote_ident(&self.name, '`'));
        identifier
    }

    /// Drops the table and waits for the statement to finish.
    pub async fn drop(&self) -> ScopeDbResult<()> {
        let identifier = self.identifier();
        self.client
            .statement(format!("DROP TABLE {identifier}"))
            .execute()
            .await?;

        info!(table = %identifier, "dropped table");

        Ok(())
    }

    /// Reads the column names and types of the table from the system catalog.
    pub async fn table_schema(&self) -> ScopeDbResult<Schema> {
        let database = quote_ident(self.database.as_deref().unwrap_or(DEFAULT_DATABASE), '\'');
        let schema = quote_ident(self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA), '\'');
        let table = quote_ident(&self.name, '\'');

        let statement = format!(
            "FROM scopedb.system.columns \
             WHERE table_name = {table} AND schema_name = {schema} AND database_name = {database} \
             SELECT column_name, data_type"
        );
        let rows = self
            .client
            .statement(statement)
            .execute()
            .await?
            .into_values()?;

        let mut fields = Vec::with_capacity(rows.len());
        for row in rows {
            let [Value::String(name), Value::String(data_type)] = row.as_slice() else {
                bail!(
                    ErrorKind::InvalidData,
                    "Column catalog row has an unexpected shape",
                    detail = format!("expected two string cells, got {row:?}")
                );
            };

            fields.push(FieldSchema::new(name.clone(), parse_data_type(data_type)));
        }

        Ok(Schema::new(fields))
    }
}

/// Maps a catalog type name such as `uint` to a [`DataType`], keeping unknown names as
/// [`DataType::Unknown`].
fn parse_data_type(name: &str) -> DataType {
    let deserializer: StrDeserializer<'_, ValueError> = name.trim().into_deserializer();
    DataType::deserialize(deserializer).unwrap_or(DataType::Unknown)
}

/// Wraps `ident` in `quote`, escaping the quote itself, backslashes and control characters.
pub fn quote_ident(ident: &str, quote: char) -> String {
    let mut quoted = String::with_capacity(ident.len() + 2);
    quoted.push(quote);
    for c in ident.chars() {
        match c {
            '\t' => quoted.push_str("\\t"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\\' => quoted.push_str("\\\\"),
            c if c == quote => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if (c as u32) < 0x20 => quoted.push_str(&format!("\\x{:02x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push(quote);
    quoted
}
