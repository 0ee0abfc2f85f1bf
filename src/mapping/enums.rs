use crate::mapping::CoercionError;
use crate::types::SqlValue;

/// An enumeration with a name/value table.
/// Usually implemented through [`sql_enum!`](crate::sql_enum).
pub trait SqlEnum: Copy + PartialEq + 'static {
    /// Members in declaration order.
    fn members() -> &'static [(&'static str, Self)];
}

/// Returns the declared name of `value`.
pub fn enum_to_str<E: SqlEnum>(value: E) -> Option<&'static str> {
    E::members()
        .iter()
        .find(|(_, member)| *member == value)
        .map(|(name, _)| *name)
}

/// Looks up a member by its exact declared name.
pub fn enum_from_str<E: SqlEnum>(name: &str) -> Option<E> {
    E::members()
        .iter()
        .find(|(member, _)| *member == name)
        .map(|(_, value)| *value)
}

/// Looks up a member by name, ignoring ASCII case.
pub fn enum_from_str_ignore_case<E: SqlEnum>(name: &str) -> Option<E> {
    E::members()
        .iter()
        .find(|(member, _)| member.eq_ignore_ascii_case(name))
        .map(|(_, value)| *value)
}

/// Coerces a column value into an enum member.
/// The value is read as text and matched against member names without regard to case.
pub fn enum_from_value<E: SqlEnum>(value: &SqlValue) -> Result<E, CoercionError> {
    let target = std::any::type_name::<E>();
    let text = match value {
        SqlValue::Null => return Err(CoercionError::UnexpectedNull { target }),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::Float(v) => v.to_string(),
        SqlValue::Bool(v) => v.to_string(),
        other => return Err(CoercionError::incompatible(other, target)),
    };
    enum_from_str_ignore_case(text.trim())
        .ok_or(CoercionError::UnknownEnumMember { value: text, target })
}

/// Declares an enum together with its [`SqlEnum`] table and column coercion.
///
/// # Example
/// ```
/// rowbind::sql_enum! {
///     #[derive(Default)]
///     pub enum Status {
///         #[default]
///         Active,
///         Retired,
///     }
/// }
///
/// assert_eq!(rowbind::enum_to_str(Status::Retired), Some("Retired"));
/// ```
#[macro_export]
macro_rules! sql_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident $(= $discriminant:expr)? ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant $(= $discriminant)? ),+
        }

        impl $crate::SqlEnum for $name {
            fn members() -> &'static [(&'static str, Self)] {
                &[$( (stringify!($variant), $name::$variant) ),+]
            }
        }

        impl $crate::FromValue for $name {
            const FIELD_TYPE: $crate::FieldType = $crate::FieldType::Enum;

            fn from_value(value: &$crate::SqlValue) -> ::std::result::Result<Self, $crate::CoercionError> {
                $crate::mapping::enum_from_value(value)
            }

            fn enum_names() -> Option<Vec<&'static str>> {
                Some(<Self as $crate::SqlEnum>::members().iter().map(|(name, _)| *name).collect())
            }
        }

        impl $crate::FromRow for $name {
            fn from_row(row: &$crate::Row) -> $crate::Result<Self> {
                $crate::mapping::map_scalar(row)
            }
        }

        impl From<$name> for $crate::SqlValue {
            fn from(value: $name) -> Self {
                $crate::SqlValue::from_enum(value)
            }
        }
    };
}
