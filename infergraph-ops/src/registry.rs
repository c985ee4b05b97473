//! Operator schema registration

use std::collections::HashMap;
use std::path::PathBuf;

use infergraph_core::adapter::TensorShape;

use crate::attrs::AttrMap;
use crate::error::{Error, Result};

/// Source framework an operator definition originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    /// Caffe layer definitions
    Caffe,
    /// TensorFlow op definitions
    TensorFlow,
}

/// Output-shape inference function attached to an operator schema
pub type InferShapeFn = fn(&AttrMap, &TensorShape) -> Result<TensorShape>;

/// Location of a compiled kernel's build artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelLocator {
    /// Compiled kernel object
    pub bin_path: PathBuf,

    /// Kernel metadata
    pub json_path: PathBuf,
}

impl KernelLocator {
    /// Artifact paths for a kernel by name, under the build output tree
    pub fn for_kernel(name: &str) -> Self {
        Self {
            bin_path: PathBuf::from(format!("./operator/kernel_meta/{name}.o")),
            json_path: PathBuf::from(format!("./operator/kernel_meta/{name}.json")),
        }
    }
}

/// Registration record for one custom operator
pub struct OpSchema {
    /// Operator type name in the deployed model, unique per registry
    pub op_type: String,

    /// Operator type name in the source framework
    pub origin_type: String,

    /// The source framework
    pub framework: Framework,

    /// Output-shape inference for the operator
    pub infer_shape: InferShapeFn,

    /// Where the compiled kernel lives
    pub kernel: KernelLocator,
}

/// Registry of custom operator schemas, keyed by deployed type name
#[derive(Default)]
pub struct OpRegistry {
    schemas: HashMap<String, OpSchema>,
}

impl OpRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema; each type name may be registered once
    pub fn register(&mut self, schema: OpSchema) -> Result<()> {
        if self.schemas.contains_key(&schema.op_type) {
            return Err(Error::AlreadyRegistered(schema.op_type));
        }
        self.schemas.insert(schema.op_type.clone(), schema);
        Ok(())
    }

    /// Look up a schema by deployed type name
    pub fn get(&self, op_type: &str) -> Option<&OpSchema> {
        self.schemas.get(op_type)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(_attrs: &AttrMap, shape: &TensorShape) -> Result<TensorShape> {
        Ok(shape.clone())
    }

    fn sample_schema() -> OpSchema {
        OpSchema {
            op_type: "custom_identity".into(),
            origin_type: "Identity".into(),
            framework: Framework::TensorFlow,
            infer_shape: identity,
            kernel: KernelLocator::for_kernel("Identity"),
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = OpRegistry::new();
        registry.register(sample_schema()).unwrap();

        let schema = registry.get("custom_identity").unwrap();
        assert_eq!(schema.origin_type, "Identity");
        assert_eq!(schema.framework, Framework::TensorFlow);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = OpRegistry::new();
        registry.register(sample_schema()).unwrap();

        assert!(matches!(
            registry.register(sample_schema()),
            Err(Error::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn test_kernel_locator_paths() {
        let kernel = KernelLocator::for_kernel("Reduction");
        assert_eq!(
            kernel.bin_path,
            PathBuf::from("./operator/kernel_meta/Reduction.o")
        );
        assert_eq!(
            kernel.json_path,
            PathBuf::from("./operator/kernel_meta/Reduction.json")
        );
    }
}
