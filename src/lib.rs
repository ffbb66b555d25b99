//! A JSON-representable schema language with three engines over it: a data
//! validator, a randomized data generator, and a type-signature deriver.
//!
//! Schemas are ordinary JSON documents. Plain objects describe closed object
//! shapes, arrays describe unions, and reserved `$`-prefixed keys introduce
//! everything else (`$array`, `$map`, `$enum`, `$number`, `$string`,
//! `$literal`, `$tuple`, `$and`, `$keyOf`, `$propertyPath`). Custom types
//! declared in `$types` blocks are lexically scoped and may be recursive.
//!
//! ```
//! use serde_json::json;
//!
//! let schema = json!({ "name": "string", "age": ["?", "integer"] });
//!
//! let ok = json_schematic::validate(&schema, &json!({ "name": "Ada" })).unwrap();
//! assert!(ok.passed());
//!
//! let sample = json_schematic::generate(&schema).unwrap();
//! assert!(json_schematic::validate(&schema, &sample).unwrap().passed());
//!
//! let ty = json_schematic::derive_type(&schema).unwrap();
//! assert_eq!(ty, "{ name: string; age?: undefined | number }");
//! ```

pub mod cli;
pub mod derive;
pub mod generate;
pub mod schema;
pub mod validate;

pub use derive::derive_type;
pub use generate::{generate, generate_with, GenerateError, Options, Prefer};
pub use schema::{load_schema, load_schema_str, SchemaError};
pub use validate::{validate, Diagnostic, Outcome, ValidationResult};
