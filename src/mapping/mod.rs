//! Row to value mapping: field catalogs, coercion rules and the row mapper.

mod catalog;
mod coerce;
mod enums;
mod row_mapper;

pub use catalog::{Catalog, CatalogBuilder, Entity, FieldDescriptor};
pub use coerce::{parse_iso8601, CoercionError, FieldType, FromValue};
pub use enums::{enum_from_str, enum_from_str_ignore_case, enum_from_value, enum_to_str, SqlEnum};
pub use row_mapper::{map_entity, map_scalar, FromRow};
