//! Structured generic type signatures

/// Generic type signature of a member
///
/// Recursive: type arguments, bounds and array components are themselves
/// signatures.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GenericSignature {
    /// Plain (possibly raw) type reference
    ClassRef(String),
    /// Parameterized type such as `Map<K, V>` or `Outer<T>.Inner<U>`
    Parameterized {
        /// Raw type name
        raw: String,
        /// Enclosing parameterized type, if any
        owner: Option<Box<GenericSignature>>,
        /// Actual type arguments
        args: Vec<GenericSignature>,
    },
    /// Type variable such as `T extends Comparable<T>`
    TypeVariable {
        /// Variable name
        name: String,
        /// Declared upper bounds
        bounds: Vec<GenericSignature>,
    },
    /// Wildcard argument such as `? extends Number`
    Wildcard {
        /// Upper bounds
        upper: Vec<GenericSignature>,
        /// Lower bounds
        lower: Vec<GenericSignature>,
    },
    /// Array whose component is generic
    GenericArray(Box<GenericSignature>),
}

impl GenericSignature {
    /// Shorthand for a plain class reference
    pub fn class(name: impl Into<String>) -> Self {
        GenericSignature::ClassRef(name.into())
    }

    /// Shorthand for a parameterized type without owner
    pub fn parameterized(raw: impl Into<String>, args: Vec<GenericSignature>) -> Self {
        GenericSignature::Parameterized {
            raw: raw.into(),
            owner: None,
            args,
        }
    }

    /// Erased type name
    ///
    /// Type variables and wildcards erase to their first upper bound, or
    /// `java.lang.Object` when unbounded. Arrays render as `component[]`.
    pub fn erasure(&self) -> String {
        match self {
            GenericSignature::ClassRef(name) => name.clone(),
            GenericSignature::Parameterized { raw, .. } => raw.clone(),
            GenericSignature::TypeVariable { bounds, .. } => bounds
                .first()
                .map(GenericSignature::erasure)
                .unwrap_or_else(|| OBJECT.to_string()),
            GenericSignature::Wildcard { upper, .. } => upper
                .first()
                .map(GenericSignature::erasure)
                .unwrap_or_else(|| OBJECT.to_string()),
            GenericSignature::GenericArray(component) => format!("{}[]", component.erasure()),
        }
    }

    /// Nesting depth (a plain class reference has depth 1)
    pub fn depth(&self) -> usize {
        let children = match self {
            GenericSignature::ClassRef(_) => return 1,
            GenericSignature::Parameterized { owner, args, .. } => args
                .iter()
                .chain(owner.as_deref())
                .map(GenericSignature::depth)
                .max(),
            GenericSignature::TypeVariable { bounds, .. } => {
                bounds.iter().map(GenericSignature::depth).max()
            }
            GenericSignature::Wildcard { upper, lower } => {
                upper.iter().chain(lower).map(GenericSignature::depth).max()
            }
            GenericSignature::GenericArray(component) => Some(component.depth()),
        };
        1 + children.unwrap_or(0)
    }
}

const OBJECT: &str = "java.lang.Object";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erasure() {
        let list = GenericSignature::parameterized(
            "java.util.List",
            vec![GenericSignature::class("java.lang.String")],
        );
        assert_eq!(list.erasure(), "java.util.List");

        let var = GenericSignature::TypeVariable {
            name: "T".to_string(),
            bounds: vec![GenericSignature::class("java.lang.Number")],
        };
        assert_eq!(var.erasure(), "java.lang.Number");

        let unbounded = GenericSignature::Wildcard {
            upper: vec![],
            lower: vec![GenericSignature::class("java.lang.Integer")],
        };
        assert_eq!(unbounded.erasure(), "java.lang.Object");

        let array = GenericSignature::GenericArray(Box::new(var));
        assert_eq!(array.erasure(), "java.lang.Number[]");
    }

    #[test]
    fn test_depth() {
        let inner = GenericSignature::class("java.lang.String");
        assert_eq!(inner.depth(), 1);
        let list = GenericSignature::parameterized("java.util.List", vec![inner]);
        assert_eq!(list.depth(), 2);
        let nested = GenericSignature::GenericArray(Box::new(list));
        assert_eq!(nested.depth(), 3);
    }
}
