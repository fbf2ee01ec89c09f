//! # Parameter System
//!
//! Named, bounded scalars that make up the solver's parameter vector.
//!
//! ## Key Features
//!
//! - **Structured names**: every entry is named after the quantity it stands
//!   for, e.g. `gamma0_air_2_1_7` or `baseline_a_3`
//! - **Bounds**: min/max bounds mapped to unbounded solver coordinates with
//!   the Minuit transformations
//! - **Expressions**: an entry can be computed from other entries
//! - **Layout**: each entry knows which transition or spectrum quantity it
//!   feeds, so fitted values can be written back
//! - **Serialization**: entries save to and load from JSON
//!
//! ## Example Usage
//!
//! ```rust
//! use specfit_rs::parameters::{ParameterEntry, ParameterVector};
//!
//! let mut params = ParameterVector::new();
//! params.add(ParameterEntry::with_bounds("gamma0_air_2_1_0", 0.07, 0.0233, 0.21).unwrap()).unwrap();
//! params.add_param("gamma0_self_2_1_0", 0.09).unwrap();
//!
//! // tie self broadening to air broadening
//! params.set_expr("gamma0_self_2_1_0", Some("1.3 * gamma0_air_2_1_0")).unwrap();
//! params.resolve_expressions().unwrap();
//!
//! assert!((params.value("gamma0_self_2_1_0").unwrap() - 0.091).abs() < 1e-12);
//! assert_eq!(params.varying_names(), vec!["gamma0_air_2_1_0"]);
//! ```

pub mod bounds;
pub mod expression;
pub mod layout;
pub mod parameter;
pub mod vector;

pub use bounds::{Bounds, BoundsError, BoundsTransform};
pub use expression::{EvaluationContext, Expression, ExpressionError};
pub use layout::{
    DisjointSet, EntryOrigin, LineBinding, LineSlot, LineSlotKey, ParameterLayout, SpectrumLayout,
};
pub use parameter::{ParameterEntry, ParameterError};
pub use vector::ParameterVector;
