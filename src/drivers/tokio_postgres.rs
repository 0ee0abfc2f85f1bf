use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures_util::StreamExt;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{Client, NoTls, RowStream, Statement};
use tracing::{debug, error, warn};

use crate::error::{DbError, DriverError, Result};
use crate::mapping::FromValue;
use crate::traits::{DatabaseDriver, Execution, Outcome, PreparedStatement, RowCursor};
use crate::types::{Row, SqlValue};

type Param = Box<dyn ToSql + Sync + Send>;

/// PostgreSQL driver implementation using tokio-postgres.
///
/// Rows stream from the server as the cursor advances. PostgreSQL has no
/// last-insert id; use `INSERT ... RETURNING` to read generated keys.
pub struct TokioPostgresDriver {
    client: Client,
}

impl TokioPostgresDriver {
    /// Connect to a PostgreSQL database.
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        // Spawn the connection handler
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {}", e);
            }
        });

        Ok(Self { client })
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    async fn prepare(&self, sql: &str) -> std::result::Result<PreparedStatement, DriverError> {
        let statement = self.client.prepare(sql).await.map_err(driver_error)?;
        debug!(
            sql,
            columns = statement.columns().len(),
            parameters = statement.params().len(),
            "Prepared PostgreSQL statement"
        );
        Ok(PreparedStatement::new(sql).with_handle(statement))
    }

    async fn execute(
        &self,
        prepared: PreparedStatement,
    ) -> std::result::Result<Execution, DriverError> {
        let statement = match prepared.handle::<Statement>() {
            Some(statement) => statement.clone(),
            None => self.client.prepare(prepared.sql()).await.map_err(driver_error)?,
        };

        // Convert SqlValue params to the types the server inferred for each placeholder
        let converted_params: Vec<Param> = prepared
            .binds()
            .iter()
            .enumerate()
            .map(|(i, value)| match statement.params().get(i) {
                Some(ty) => to_pg_param(value, ty),
                None => native_param(value),
            })
            .collect();
        let param_refs: Vec<&(dyn ToSql + Sync)> = converted_params
            .iter()
            .map(|b| b.as_ref() as &(dyn ToSql + Sync))
            .collect();

        if statement.columns().is_empty() {
            let rows_affected = self
                .client
                .execute_raw(&statement, param_refs.iter().copied())
                .await
                .map_err(driver_error)?;
            return Ok(Execution::Done(Outcome {
                rows_affected,
                last_insert_id: None,
            }));
        }

        let columns = statement
            .columns()
            .iter()
            .map(|c| (c.name().to_string(), c.type_().clone()))
            .collect();
        let stream = self
            .client
            .query_raw(&statement, param_refs.iter().copied())
            .await
            .map_err(driver_error)?;

        Ok(Execution::Rows(Box::new(PostgresCursor {
            columns,
            stream: Box::pin(stream),
        })))
    }
}

struct PostgresCursor {
    columns: Vec<(String, Type)>,
    stream: Pin<Box<RowStream>>,
}

#[async_trait]
impl RowCursor for PostgresCursor {
    async fn next_row(&mut self) -> std::result::Result<Option<Row>, DriverError> {
        let Some(row) = self.stream.next().await else {
            return Ok(None);
        };
        let row = row.map_err(driver_error)?;

        let mut converted = Row::default();
        for (i, (name, ty)) in self.columns.iter().enumerate() {
            converted.push(name.as_str(), row_value(&row, i, name, ty)?);
        }
        Ok(Some(converted))
    }
}

/// Convert a row value at a given index to a SqlValue.
///
/// Columns of a type with no counterpart read as text when the server type is
/// text-like, and as NULL otherwise, so one exotic column does not fail the row.
fn row_value(
    row: &tokio_postgres::Row,
    index: usize,
    name: &str,
    ty: &Type,
) -> std::result::Result<SqlValue, DriverError> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index).map(SqlValue::from),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(index)
            .map(|v| v.map(i64::from).into()),
        Type::INT4 => row.try_get::<_, Option<i32>>(index).map(SqlValue::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(index).map(SqlValue::from),
        Type::OID => row
            .try_get::<_, Option<u32>>(index)
            .map(|v| v.map(i64::from).into()),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(index)
            .map(|v| v.map(f64::from).into()),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index).map(SqlValue::from),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(index).map(SqlValue::from),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(index)
            .map(SqlValue::from),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(index)
            .map(SqlValue::from),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(index)
            .map(|v| v.map(|date| date.to_string()).into()),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(index)
            .map(|v| v.map(|time| time.to_string()).into()),
        _ if reads_as_text(ty) => {
            row.try_get::<_, Option<String>>(index).map(SqlValue::from)
        }
        _ => {
            warn!(column = name, column_type = %ty, "Unsupported column type, reading as NULL");
            return Ok(SqlValue::Null);
        }
    };
    value.map_err(|e| DriverError::new(format!("Unable to read column {name} of type {ty}: {e}")))
}

/// Whether a column type without a dedicated arm can still be read as text.
fn reads_as_text(ty: &Type) -> bool {
    <String as FromSql<'_>>::accepts(ty)
}

/// Convert a SqlValue to a parameter of the given server type.
/// Values that cannot be converted are passed as-is so the server reports the mismatch.
fn to_pg_param(value: &SqlValue, ty: &Type) -> Param {
    fn typed<V>(value: &SqlValue) -> Param
    where
        V: FromValue + ToSql + Sync + Send + 'static,
    {
        match Option::<V>::from_value(value) {
            Ok(v) => Box::new(v),
            Err(_) => native_param(value),
        }
    }

    match *ty {
        Type::BOOL => typed::<bool>(value),
        Type::INT2 => typed::<i16>(value),
        Type::INT4 => typed::<i32>(value),
        Type::INT8 => typed::<i64>(value),
        Type::FLOAT4 => typed::<f32>(value),
        Type::FLOAT8 => typed::<f64>(value),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => typed::<String>(value),
        Type::BYTEA => typed::<Vec<u8>>(value),
        Type::TIMESTAMPTZ => typed::<DateTime<Utc>>(value),
        Type::TIMESTAMP => match Option::<DateTime<Utc>>::from_value(value) {
            Ok(v) => Box::new(v.map(|ts| ts.naive_utc())),
            Err(_) => native_param(value),
        },
        _ => native_param(value),
    }
}

fn native_param(value: &SqlValue) -> Param {
    match value {
        SqlValue::Null => Box::new(None::<String>),
        SqlValue::Int(i) => Box::new(*i),
        SqlValue::Float(f) => Box::new(*f),
        SqlValue::Text(s) => Box::new(s.clone()),
        SqlValue::Bool(b) => Box::new(*b),
        SqlValue::Bytes(b) => Box::new(b.clone()),
        SqlValue::Timestamp(ts) => Box::new(*ts),
    }
}

fn driver_error(e: tokio_postgres::Error) -> DriverError {
    match e.as_db_error() {
        Some(db) => DriverError::with_code(db.message(), db.code().code()),
        None => DriverError::new(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use chrono::TimeZone;
    use tokio_postgres::types::{IsNull, WrongType};

    fn encode(value: SqlValue, ty: &Type) -> (BytesMut, std::result::Result<IsNull, String>) {
        let mut buf = BytesMut::new();
        let result = to_pg_param(&value, ty)
            .to_sql_checked(ty, &mut buf)
            .map_err(|e| {
                assert!(e.downcast_ref::<WrongType>().is_some(), "unexpected error: {e}");
                e.to_string()
            });
        (buf, result)
    }

    #[test]
    fn test_int_binds_as_narrow_int() {
        let (buf, result) = encode(SqlValue::Int(5), &Type::INT2);
        assert!(matches!(result, Ok(IsNull::No)));
        assert_eq!(&buf[..], &[0, 5]);
    }

    #[test]
    fn test_int_binds_as_text() {
        let (buf, result) = encode(SqlValue::Int(5), &Type::TEXT);
        assert!(matches!(result, Ok(IsNull::No)));
        assert_eq!(&buf[..], b"5");
    }

    #[test]
    fn test_null_binds_as_typed_null() {
        let (buf, result) = encode(SqlValue::Null, &Type::INT4);
        assert!(matches!(result, Ok(IsNull::Yes)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_unconvertible_value_falls_back_to_native() {
        let (_, result) = encode(SqlValue::from("x"), &Type::INT4);
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_binds_as_naive_timestamp() {
        let ts = Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap();
        let (buf, result) = encode(SqlValue::Timestamp(ts), &Type::TIMESTAMP);
        assert!(matches!(result, Ok(IsNull::No)));
        assert_eq!(buf.len(), 8);

        let (_, from_text) = encode(SqlValue::from("2021-03-14T15:09:26Z"), &Type::TIMESTAMPTZ);
        assert!(matches!(from_text, Ok(IsNull::No)));
    }

    #[test]
    fn test_column_type_fallback() {
        for ty in [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME] {
            assert!(reads_as_text(&ty), "{ty} should read as text");
        }
        // Read as NULL instead of failing the row.
        for ty in [Type::NUMERIC, Type::UUID, Type::JSONB, Type::INTERVAL] {
            assert!(!reads_as_text(&ty), "{ty} has no text reading");
        }
    }

    #[test]
    fn test_native_param_without_server_type() {
        let mut buf = BytesMut::new();
        let result = native_param(&SqlValue::Bool(true)).to_sql_checked(&Type::BOOL, &mut buf);
        assert!(matches!(result, Ok(IsNull::No)));
        assert_eq!(&buf[..], &[1]);
    }
}
