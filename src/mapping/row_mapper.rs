use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{DbError, Result};
use crate::mapping::{Entity, FromValue};
use crate::types::{Row, SqlValue};

/// Conversion of a fetched row into a typed value.
///
/// Every [`Entity`] maps field by field and never fails. Scalar types read
/// the first column and fail when it cannot be converted.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self>;
}

impl<T: Entity> FromRow for T {
    fn from_row(row: &Row) -> Result<Self> {
        Ok(map_entity(row))
    }
}

/// Populates a new `T` from the columns of `row`.
///
/// Unknown columns, read-only fields and values that fail to coerce are
/// reported and skipped. The affected fields keep their default value.
pub fn map_entity<T: Entity>(row: &Row) -> T {
    let catalog = T::catalog();
    let entity_name = std::any::type_name::<T>();
    let mut entity = T::default();

    for (column, value) in row.iter() {
        let Some(field) = catalog.get(column) else {
            warn!(column, entity = entity_name, "Unable to find property for column");
            continue;
        };

        if !field.is_writable() {
            warn!(column, entity = entity_name, "Unable to write to read-only property");
            continue;
        }

        if value.is_null() && !field.is_nullable() {
            warn!(column, entity = entity_name, "Null value for non-nullable property");
            continue;
        }

        if let Err(e) = field.write(&mut entity, value) {
            warn!(column, entity = entity_name, error = %e, "Unable to write to property");
        }
    }

    entity
}

/// Converts the first column of `row` to `V`.
pub fn map_scalar<V: FromValue>(row: &Row) -> Result<V> {
    let value = row.value(0).unwrap_or(&SqlValue::Null);
    V::from_value(value).map_err(|e| {
        warn!(error = %e, "Unable to convert from primitive");
        DbError::Mapping(e.to_string())
    })
}

macro_rules! impl_scalar_from_row {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &Row) -> Result<Self> {
                    map_scalar(row)
                }
            }

            impl FromRow for Option<$ty> {
                fn from_row(row: &Row) -> Result<Self> {
                    map_scalar(row)
                }
            }
        )+
    };
}

impl_scalar_from_row!(
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    bool,
    String,
    Vec<u8>,
    DateTime<Utc>,
);
