//! Parameter declarations.

use mlbind_ffi::{ElemKind, Orientation};
use std::fmt;

/// The declared type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// 32-bit signed integer.
    Int,
    /// 64-bit float.
    Double,
    /// Boolean flag.
    Bool,
    /// UTF-8 string.
    String,
    /// Ordered sequence of integers.
    IntSeq,
    /// Ordered sequence of strings.
    StringSeq,
    /// Dense matrix of the given element kind.
    Matrix(ElemKind),
    /// Dense row or column vector of the given element kind.
    Vector(ElemKind, Orientation),
    /// `f64` matrix with a categorical flag per row.
    MatrixWithInfo,
    /// Opaque native model with the given type descriptor.
    Model(&'static str),
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "Int"),
            Self::Double => write!(f, "Double"),
            Self::Bool => write!(f, "Bool"),
            Self::String => write!(f, "String"),
            Self::IntSeq => write!(f, "IntSeq"),
            Self::StringSeq => write!(f, "StringSeq"),
            Self::Matrix(kind) => write!(f, "Matrix<{kind}>"),
            Self::Vector(kind, orientation) => write!(f, "Vector<{kind}, {orientation}>"),
            Self::MatrixWithInfo => write!(f, "MatrixWithInfo"),
            Self::Model(descriptor) => write!(f, "Model<{descriptor}>"),
        }
    }
}

/// Whether the caller supplies a parameter or the core produces it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Supplied by the caller.
    Input,
    /// Produced by the core.
    Output,
}

/// The value an unset parameter takes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DefaultValue {
    /// Integer default.
    Int(i32),
    /// Float default.
    Double(f64),
    /// Flag default.
    Bool(bool),
    /// String default.
    Str(&'static str),
    /// Empty matrix, vector, or sequence, or an absent model.
    Empty,
}

impl DefaultValue {
    /// The zero value for a type.
    #[must_use]
    pub const fn zero_for(ty: ParamType) -> Self {
        match ty {
            ParamType::Int => Self::Int(0),
            ParamType::Double => Self::Double(0.0),
            ParamType::Bool => Self::Bool(false),
            ParamType::String => Self::Str(""),
            _ => Self::Empty,
        }
    }

    /// Whether this default can stand in for a parameter of type `ty`.
    ///
    /// Integer defaults widen to `Double`; container and model types only
    /// take [`DefaultValue::Empty`].
    #[must_use]
    pub const fn fits(self, ty: ParamType) -> bool {
        matches!(
            (ty, self),
            (ParamType::Int, Self::Int(_))
                | (ParamType::Double, Self::Double(_) | Self::Int(_))
                | (ParamType::Bool, Self::Bool(_))
                | (ParamType::String, Self::Str(_))
                | (
                    ParamType::IntSeq
                        | ParamType::StringSeq
                        | ParamType::Matrix(_)
                        | ParamType::Vector(..)
                        | ParamType::MatrixWithInfo
                        | ParamType::Model(_),
                    Self::Empty
                )
        )
    }
}

/// One declared parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamSpec {
    /// Parameter name; unique within a schema, case-sensitive.
    pub name: &'static str,
    /// Declared type.
    pub ty: ParamType,
    /// Input or output.
    pub direction: Direction,
    /// Whether callers are expected to supply it.
    pub required: bool,
    /// Value used when the parameter is not set.
    pub default: DefaultValue,
    /// Human-readable description.
    pub description: &'static str,
}

impl ParamSpec {
    /// Whether this is an input parameter.
    #[inline]
    #[must_use]
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }
}

/// The parameter declarations of one binding, in declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct Schema {
    binding: &'static str,
    params: Vec<ParamSpec>,
}

impl Schema {
    /// An empty schema for the named binding.
    #[must_use]
    pub fn new(binding: &'static str) -> Self {
        Self {
            binding,
            params: Vec::new(),
        }
    }

    fn push(
        mut self,
        name: &'static str,
        ty: ParamType,
        direction: Direction,
        required: bool,
        default: DefaultValue,
        description: &'static str,
    ) -> Self {
        debug_assert!(
            self.get(name).is_none(),
            "parameter '{name}' declared twice"
        );
        debug_assert!(
            default.fits(ty),
            "parameter '{name}' of type {ty} has incompatible default {default:?}"
        );
        self.params.push(ParamSpec {
            name,
            ty,
            direction,
            required,
            default,
            description,
        });
        self
    }

    /// Declare an optional input defaulting to the zero value of its type.
    #[must_use]
    pub fn input(self, name: &'static str, ty: ParamType, description: &'static str) -> Self {
        self.push(
            name,
            ty,
            Direction::Input,
            false,
            DefaultValue::zero_for(ty),
            description,
        )
    }

    /// Declare a required input.
    ///
    /// Missing required inputs still fall back to `default`.
    #[must_use]
    pub fn required_input(
        self,
        name: &'static str,
        ty: ParamType,
        default: DefaultValue,
        description: &'static str,
    ) -> Self {
        self.push(name, ty, Direction::Input, true, default, description)
    }

    /// Declare an output.
    #[must_use]
    pub fn output(self, name: &'static str, ty: ParamType, description: &'static str) -> Self {
        self.push(
            name,
            ty,
            Direction::Output,
            false,
            DefaultValue::zero_for(ty),
            description,
        )
    }

    /// The binding name.
    #[inline]
    #[must_use]
    pub fn binding(&self) -> &'static str {
        self.binding
    }

    /// Look up a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// All parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter()
    }

    /// Input parameters in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.is_input())
    }

    /// Output parameters in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| !p.is_input())
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
