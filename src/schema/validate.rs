//! Schema validation
//!
//! Runs once assembly is complete. Names must be unique across every
//! namespace, then each construct checks itself. Any failure aborts the
//! build; nothing is persisted.

use indexmap::IndexMap;

use super::{Field, InterfaceType, ObjectType, Schema, UnionType, MUTATION_TYPE, QUERY_TYPE};
use crate::error::{invariant, Result};
use crate::naming::is_internal_type;

impl Schema {
    pub fn validate(&self) -> Result<()> {
        self.check_unique_names()?;

        for ty in self.types.values() {
            self.validate_object(ty)?;
        }
        for model in self.models.values() {
            self.validate_object(model.as_object())?;
        }
        for interface in self.interfaces.values() {
            self.validate_interface(interface)?;
        }
        for union in self.unions.values() {
            self.validate_union(union)?;
        }
        for enum_type in self.enums.values() {
            invariant!(
                !enum_type.values.is_empty(),
                "Enum {} has no values",
                enum_type.name
            );
        }
        for field in self.queries.values() {
            self.validate_field(QUERY_TYPE, field, false)?;
        }
        for field in self.mutations.values() {
            self.validate_field(MUTATION_TYPE, field, false)?;
        }
        Ok(())
    }

    fn check_unique_names(&self) -> Result<()> {
        let mut counts: IndexMap<&str, usize> = IndexMap::new();
        let names = self
            .types
            .keys()
            .chain(self.models.keys())
            .chain(self.enums.keys())
            .chain(self.interfaces.keys())
            .chain(self.unions.keys())
            .chain(self.scalars.keys());
        for name in names {
            *counts.entry(name.as_str()).or_default() += 1;
        }
        let duplicates: Vec<&str> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect();
        invariant!(
            duplicates.is_empty(),
            "Your schema has multiple types with the same name. See {}",
            duplicates.join(", ")
        );
        Ok(())
    }

    /// Types usable as arguments and input object fields
    fn is_input_type(&self, name: &str) -> bool {
        is_internal_type(name)
            || self.scalars.contains_key(name)
            || self.enums.contains_key(name)
            || self.types.get(name).map(|ty| ty.input).unwrap_or(false)
    }

    fn is_object_type(&self, name: &str) -> bool {
        self.models.contains_key(name)
            || self.types.get(name).map(|ty| !ty.input).unwrap_or(false)
    }

    fn validate_object(&self, ty: &ObjectType) -> Result<()> {
        invariant!(
            !ty.fields.is_empty(),
            "Type {} has no fields. Every type must have at least one field",
            ty.name
        );
        for interface in &ty.interfaces {
            invariant!(
                self.interfaces.contains_key(interface),
                "Type {} implements {}, which is not a registered interface",
                ty.name,
                interface
            );
        }
        for field in ty.fields.values() {
            self.validate_field(&ty.name, field, ty.input)?;
        }
        Ok(())
    }

    fn validate_interface(&self, interface: &InterfaceType) -> Result<()> {
        invariant!(
            !interface.fields.is_empty(),
            "Interface {} has no fields. Every interface must have at least one field",
            interface.name
        );
        for field in interface.fields.values() {
            self.validate_field(&interface.name, field, false)?;
        }
        Ok(())
    }

    fn validate_union(&self, union: &UnionType) -> Result<()> {
        invariant!(!union.types.is_empty(), "Union {} has no types", union.name);
        for member in &union.types {
            invariant!(
                self.is_object_type(member),
                "Union {} includes {}, which is not a registered object type",
                union.name,
                member
            );
        }
        Ok(())
    }

    fn validate_field(&self, owner: &str, field: &Field, input: bool) -> Result<()> {
        let named = field.type_ref.named_type();
        invariant!(
            self.has_named_type(named),
            "Field {}.{} has type {}, which does not exist",
            owner,
            field.name,
            named
        );
        if input {
            invariant!(
                self.is_input_type(named),
                "Input field {}.{} must use an input, enum or scalar type, got {}",
                owner,
                field.name,
                named
            );
            invariant!(
                field.args.is_empty(),
                "Input field {}.{} cannot take arguments",
                owner,
                field.name
            );
        }
        for arg in field.args.values() {
            let arg_type = arg.type_ref.named_type();
            invariant!(
                self.is_input_type(arg_type),
                "Argument {} of {}.{} has type {}, which is not a registered input type",
                arg.name,
                owner,
                field.name,
                arg_type
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Argument, EnumType, ScalarType, TypeRef};
    use serde_json::json;

    fn object(name: &str, fields: &[(&str, &str)]) -> ObjectType {
        fields.iter().fold(ObjectType::new(name), |ty, (field, type_ref)| {
            ty.with_field(Field::new(*field, type_ref.parse().unwrap()))
        })
    }

    fn valid_schema() -> Schema {
        let mut schema = Schema::new("default");
        schema.add_type(object("Post", &[("id", "ID!"), ("title", "String")]));
        schema.add_query(Field::new("posts", "[Post]".parse().unwrap()));
        schema.finalize();
        schema
    }

    #[test]
    fn test_valid_schema_passes() {
        valid_schema().validate().unwrap();
    }

    #[test]
    fn test_duplicate_names_are_listed() {
        let mut schema = valid_schema();
        schema.add_type(object("Foo", &[("id", "ID")]));
        let config = serde_json::from_value(json!({"values": ["A"]})).unwrap();
        schema.add_enum(EnumType::from_config("Foo", &config).unwrap());
        schema.add_scalar(ScalarType::new("Post"));

        let err = schema.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Your schema has multiple types with the same name. See Post, Foo"
        );
    }

    #[test]
    fn test_type_without_fields_fails() {
        let mut schema = valid_schema();
        schema.add_type(ObjectType::new("Empty"));
        assert!(schema.validate().unwrap_err().to_string().contains("Empty has no fields"));
    }

    #[test]
    fn test_unknown_field_type_fails() {
        let mut schema = valid_schema();
        schema.add_type(object("Comment", &[("post", "Postt")]));
        assert!(schema.validate().unwrap_err().to_string().contains("Postt"));
    }

    #[test]
    fn test_argument_must_be_input_type() {
        let mut schema = valid_schema();
        schema.add_type(
            ObjectType::new("Comment").with_field(
                Field::new("post", TypeRef::named("Post"))
                    .with_arg(Argument::new("filter", TypeRef::named("Post"))),
            ),
        );
        assert!(schema
            .validate()
            .unwrap_err()
            .to_string()
            .contains("not a registered input type"));
    }

    #[test]
    fn test_union_members_must_be_objects() {
        let mut schema = valid_schema();
        schema.add_union(UnionType::new("Result", ["Post", "String"]));
        assert!(schema
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Union Result includes String"));
    }

    #[test]
    fn test_input_fields_reject_object_types() {
        let mut schema = valid_schema();
        let mut input = object("PostInput", &[("post", "Post")]);
        input.input = true;
        schema.add_type(input);
        assert!(schema
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Input field PostInput.post"));
    }
}
