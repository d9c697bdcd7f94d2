//! Spelling of built-in types and literals.

use shadex_ir::{Literal, Scalar, ScalarKind, TypeInner, VectorSize};

use crate::Error;

pub fn scalar_name(scalar: Scalar) -> Result<&'static str, Error> {
    use ScalarKind as K;
    Ok(match (scalar.kind, scalar.width) {
        (K::Bool, _) => "bool",
        (K::Sint, 4) => "int",
        (K::Uint, 4) => "uint",
        (K::Float, 4) => "float",
        (K::Float, 8) => "double",
        (K::Sint, 8) => "int64_t",
        (K::Uint, 8) => "uint64_t",
        (K::Float, 2) => "float16_t",
        (K::Sint, 2) => "int16_t",
        (K::Uint, 2) => "uint16_t",
        (K::Sint, 1) => "int8_t",
        (K::Uint, 1) => "uint8_t",
        _ => return Err(unsupported_scalar(scalar)),
    })
}

fn unsupported_scalar(scalar: Scalar) -> Error {
    Error::Unsupported(format!(
        "{:?} scalar of width {}",
        scalar.kind, scalar.width
    ))
}

fn vector_prefix(scalar: Scalar) -> Result<&'static str, Error> {
    use ScalarKind as K;
    Ok(match (scalar.kind, scalar.width) {
        (K::Bool, _) => "bvec",
        (K::Sint, 4) => "ivec",
        (K::Uint, 4) => "uvec",
        (K::Float, 4) => "vec",
        (K::Float, 8) => "dvec",
        (K::Sint, 8) => "i64vec",
        (K::Uint, 8) => "u64vec",
        (K::Float, 2) => "f16vec",
        (K::Sint, 2) => "i16vec",
        (K::Uint, 2) => "u16vec",
        (K::Sint, 1) => "i8vec",
        (K::Uint, 1) => "u8vec",
        _ => return Err(unsupported_scalar(scalar)),
    })
}

pub fn vector_name(scalar: Scalar, size: VectorSize) -> Result<String, Error> {
    Ok(format!("{}{}", vector_prefix(scalar)?, size as u32))
}

pub fn matrix_name(columns: VectorSize, rows: VectorSize, scalar: Scalar) -> Result<String, Error> {
    let prefix = match (scalar.kind, scalar.width) {
        (ScalarKind::Float, 4) => "mat",
        (ScalarKind::Float, 8) => "dmat",
        (ScalarKind::Float, 2) => "f16mat",
        _ => {
            return Err(Error::Unsupported(format!(
                "matrix of {:?} width {}",
                scalar.kind, scalar.width
            )));
        }
    };
    Ok(if columns == rows {
        format!("{prefix}{}", columns as u32)
    } else {
        format!("{prefix}{}x{}", columns as u32, rows as u32)
    })
}

/// Spells types that need no arena lookups. Arrays, structs and pointers
/// are the writer's business.
pub fn simple_type_name(inner: &TypeInner) -> Result<String, Error> {
    match *inner {
        TypeInner::Scalar(s) | TypeInner::Atomic(s) => Ok(scalar_name(s)?.to_string()),
        TypeInner::Vector { size, scalar } => vector_name(scalar, size),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => matrix_name(columns, rows, scalar),
        _ => Err(Error::Unsupported(
            "composite type where a scalar, vector or matrix was expected".into(),
        )),
    }
}

fn float_text(value: f64, suffix: &str) -> String {
    if value.is_nan() {
        format!("(0.0{suffix} / 0.0{suffix})")
    } else if value.is_infinite() {
        let sign = if value < 0.0 { "-" } else { "" };
        format!("({sign}1.0{suffix} / 0.0{suffix})")
    } else {
        format!("{value:?}{suffix}")
    }
}

pub fn literal(lit: Literal) -> String {
    match lit {
        Literal::Bool(b) => b.to_string(),
        Literal::I32(i32::MIN) => "(-2147483647 - 1)".into(),
        Literal::I32(v) => v.to_string(),
        Literal::U32(v) => format!("{v}u"),
        Literal::I64(i64::MIN) => "(-9223372036854775807l - 1l)".into(),
        Literal::I64(v) => format!("{v}l"),
        Literal::U64(v) => format!("{v}ul"),
        Literal::F16(v) => float_text(f64::from(v), "hf"),
        Literal::F32(v) => {
            if v.is_finite() {
                format!("{v:?}")
            } else {
                float_text(f64::from(v), "")
            }
        }
        Literal::F64(v) => float_text(v, "lf"),
    }
}

/// The zero literal of a scalar type.
pub fn zero_literal(scalar: Scalar) -> Result<String, Error> {
    Literal::zero(scalar)
        .map(literal)
        .ok_or_else(|| unsupported_scalar(scalar))
}

/// Number of interface locations a type occupies.
pub fn location_slots(inner: &TypeInner) -> u32 {
    match *inner {
        TypeInner::Vector { size, scalar } => {
            if scalar.width == 8 && size as u32 > 2 { 2 } else { 1 }
        }
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => {
            let per_column = if scalar.width == 8 && rows as u32 > 2 { 2 } else { 1 };
            columns as u32 * per_column
        }
        _ => 1,
    }
}
