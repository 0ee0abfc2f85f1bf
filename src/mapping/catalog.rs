//! Per-type field registration.
//!
//! A [`Catalog`] lists the fields a row can be mapped onto for one entity
//! type. Catalogs are declared once through [`Entity::describe`] and then
//! memoized for the lifetime of the process.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::mapping::{CoercionError, FieldType, FromValue};
use crate::types::SqlValue;

type Setter<T> = Arc<dyn Fn(&mut T, &SqlValue) -> Result<(), CoercionError> + Send + Sync>;

/// A type rows can be mapped onto field by field.
///
/// # Example
/// ```
/// use rowbind::{CatalogBuilder, Entity};
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: Option<String>,
/// }
///
/// impl Entity for User {
///     fn describe(catalog: CatalogBuilder<Self>) -> CatalogBuilder<Self> {
///         catalog
///             .field("id", |u, v| u.id = v)
///             .field("name", |u, v| u.name = v)
///     }
/// }
///
/// assert_eq!(User::catalog().len(), 2);
/// ```
pub trait Entity: Default + Send + 'static {
    /// Registers the fields of this type.
    fn describe(catalog: CatalogBuilder<Self>) -> CatalogBuilder<Self>;

    /// Returns the memoized catalog for this type, building it on first use.
    fn catalog() -> &'static Catalog<Self> {
        registry::get_or_build::<Self>()
    }
}

/// Metadata for one mappable field.
pub struct FieldDescriptor<T> {
    name: &'static str,
    field_type: FieldType,
    nullable: bool,
    enum_names: Option<Vec<&'static str>>,
    setter: Option<Setter<T>>,
}

impl<T> FieldDescriptor<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Member names when the field is an enumeration.
    pub fn enum_names(&self) -> Option<&[&'static str]> {
        self.enum_names.as_deref()
    }

    /// Coerces `value` and stores it on `target`.
    /// Read-only fields are left untouched.
    pub fn write(&self, target: &mut T, value: &SqlValue) -> Result<(), CoercionError> {
        match &self.setter {
            Some(set) => set(target, value),
            None => Ok(()),
        }
    }

    fn lift<C: 'static>(&self, project: fn(&mut C) -> &mut T) -> FieldDescriptor<C>
    where
        T: 'static,
    {
        let setter = self.setter.clone().map(|set| {
            Arc::new(move |child: &mut C, value: &SqlValue| set(project(child), value)) as Setter<C>
        });
        FieldDescriptor {
            name: self.name,
            field_type: self.field_type,
            nullable: self.nullable,
            enum_names: self.enum_names.clone(),
            setter,
        }
    }
}

impl<T> fmt::Debug for FieldDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("nullable", &self.nullable)
            .field("writable", &self.is_writable())
            .field("enum_names", &self.enum_names)
            .finish()
    }
}

/// The ordered field table of one entity type.
pub struct Catalog<T> {
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> Catalog<T> {
    /// Looks up a field by its exact declared name.
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor<T>> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> fmt::Debug for Catalog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.fields).finish()
    }
}

/// Builder passed to [`Entity::describe`].
pub struct CatalogBuilder<T> {
    own: Vec<FieldDescriptor<T>>,
    inherited: Vec<FieldDescriptor<T>>,
}

impl<T: 'static> CatalogBuilder<T> {
    pub fn new() -> Self {
        Self {
            own: Vec::new(),
            inherited: Vec::new(),
        }
    }

    /// Registers a writable field. The field type and nullability come from `V`.
    pub fn field<V: FromValue + 'static>(mut self, name: &'static str, set: fn(&mut T, V)) -> Self {
        let setter: Setter<T> = Arc::new(move |target: &mut T, value: &SqlValue| {
            set(target, V::from_value(value)?);
            Ok(())
        });
        self.push_own(FieldDescriptor {
            name,
            field_type: V::FIELD_TYPE,
            nullable: V::NULLABLE,
            enum_names: V::enum_names(),
            setter: Some(setter),
        });
        self
    }

    /// Registers a field that is known but cannot be written, e.g. a computed value.
    pub fn read_only(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.push_own(FieldDescriptor {
            name,
            field_type,
            nullable: true,
            enum_names: None,
            setter: None,
        });
        self
    }

    /// Pulls in the fields of an embedded parent entity.
    /// Fields declared on this type shadow parent fields with the same name.
    pub fn inherit<P: Entity>(mut self, project: fn(&mut T) -> &mut P) -> Self {
        for field in P::catalog().fields() {
            if self.inherited.iter().all(|f| f.name != field.name) {
                self.inherited.push(field.lift(project));
            }
        }
        self
    }

    fn push_own(&mut self, field: FieldDescriptor<T>) {
        match self.own.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.own.push(field),
        }
    }

    pub fn build(self) -> Catalog<T> {
        let CatalogBuilder { mut own, inherited } = self;
        let mut fields: Vec<_> = inherited
            .into_iter()
            .filter(|parent| own.iter().all(|f| f.name != parent.name))
            .collect();
        fields.append(&mut own);
        Catalog { fields }
    }
}

impl<T: 'static> Default for CatalogBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

mod registry {
    use super::*;

    type Registry = RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>;

    static CATALOGS: LazyLock<Registry> = LazyLock::new(|| RwLock::new(HashMap::new()));

    fn lookup<T: 'static>() -> Option<&'static Catalog<T>> {
        let catalogs = CATALOGS.read().unwrap_or_else(PoisonError::into_inner);
        catalogs
            .get(&TypeId::of::<T>())
            .copied()
            .and_then(|entry| entry.downcast_ref::<Catalog<T>>())
    }

    pub(super) fn get_or_build<T: Entity>() -> &'static Catalog<T> {
        if let Some(catalog) = lookup::<T>() {
            return catalog;
        }

        // Built outside the lock: describe() may inherit, which recurses into the registry.
        let built = T::describe(CatalogBuilder::new()).build();

        let mut catalogs = CATALOGS.write().unwrap_or_else(PoisonError::into_inner);
        let entry = *catalogs
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::leak(Box::new(built)) as &'static (dyn Any + Send + Sync));
        drop(catalogs);

        match entry.downcast_ref::<Catalog<T>>() {
            Some(catalog) => catalog,
            None => unreachable!("catalog registered under a foreign TypeId"),
        }
    }
}
