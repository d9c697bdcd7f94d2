//! Helper functions emitted in place of builtins the target lacks or
//! gets wrong.

use std::fmt::Write as _;

use shadex_ir::{Scalar, VectorSize};

use crate::Error;
use crate::types::{scalar_name, vector_name};

/// A helper function. Variants are ordered so that every helper comes
/// after the helpers it calls.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum Polyfill {
    Det2x2,
    Det3x3,
    /// `min` that returns the non-NaN operand.
    NMin {
        scalar: Scalar,
        size: Option<VectorSize>,
    },
    NMax {
        scalar: Scalar,
        size: Option<VectorSize>,
    },
    NClamp {
        scalar: Scalar,
        size: Option<VectorSize>,
    },
    /// Transposes a `columns`x`rows` float matrix.
    Transpose {
        columns: VectorSize,
        rows: VectorSize,
    },
    Inverse(VectorSize),
    Determinant(VectorSize),
}

impl Polyfill {
    pub fn helper_name(self) -> &'static str {
        match self {
            Self::Det2x2 => "spvDet2x2",
            Self::Det3x3 => "spvDet3x3",
            Self::NMin { .. } => "spvNMin",
            Self::NMax { .. } => "spvNMax",
            Self::NClamp { .. } => "spvNClamp",
            Self::Transpose { .. } => "spvTranspose",
            Self::Inverse(VectorSize::Bi) => "spvInverse2x2",
            Self::Inverse(VectorSize::Tri) => "spvInverse3x3",
            Self::Inverse(VectorSize::Quad) => "spvInverse4x4",
            Self::Determinant(_) => "spvDeterminant",
        }
    }

    /// Helpers this one calls directly.
    pub fn dependencies(self) -> Vec<Self> {
        match self {
            Self::Det2x2 | Self::NMin { .. } | Self::NMax { .. } | Self::Transpose { .. } => {
                vec![]
            }
            Self::Det3x3 => vec![Self::Det2x2],
            Self::NClamp { scalar, size } => {
                vec![Self::NMin { scalar, size }, Self::NMax { scalar, size }]
            }
            Self::Inverse(VectorSize::Bi) => vec![],
            Self::Inverse(VectorSize::Tri) | Self::Determinant(VectorSize::Bi) => {
                vec![Self::Det2x2]
            }
            Self::Inverse(VectorSize::Quad)
            | Self::Determinant(VectorSize::Tri)
            | Self::Determinant(VectorSize::Quad) => vec![Self::Det3x3],
        }
    }

    /// This helper and everything it calls, transitively.
    pub fn closure(self) -> Vec<Self> {
        let mut out = vec![self];
        let mut i = 0;
        while i < out.len() {
            for dep in out[i].dependencies() {
                if !out.contains(&dep) {
                    out.push(dep);
                }
            }
            i += 1;
        }
        out
    }

    /// Writes the helper's definition followed by a blank line.
    pub fn write(self, out: &mut String) -> Result<(), Error> {
        match self {
            Self::Det2x2 => {
                out.push_str("float spvDet2x2(float a1, float a2, float b1, float b2)\n{\n");
                out.push_str("    return a1 * b2 - b1 * a2;\n}\n");
            }
            Self::Det3x3 => {
                out.push_str(
                    "float spvDet3x3(float a1, float a2, float a3, float b1, float b2, float b3, \
                     float c1, float c2, float c3)\n{\n",
                );
                out.push_str(
                    "    return a1 * spvDet2x2(b2, b3, c2, c3) - b1 * spvDet2x2(a2, a3, c2, c3) \
                     + c1 * spvDet2x2(a2, a3, b2, b3);\n}\n",
                );
            }
            Self::NMin { scalar, size } | Self::NMax { scalar, size } => {
                let ty = value_type(scalar, size)?;
                let name = self.helper_name();
                let op = if matches!(self, Self::NMin { .. }) { "min" } else { "max" };
                writeln!(out, "{ty} {name}({ty} a, {ty} b)\n{{")?;
                writeln!(
                    out,
                    "    return mix(mix({op}(a, b), a, isnan(b)), b, isnan(a));\n}}"
                )?;
            }
            Self::NClamp { scalar, size } => {
                let ty = value_type(scalar, size)?;
                writeln!(out, "{ty} spvNClamp({ty} x, {ty} lo, {ty} hi)\n{{")?;
                writeln!(out, "    return spvNMin(spvNMax(x, lo), hi);\n}}")?;
            }
            Self::Transpose { columns, rows } => {
                let (c, r) = (columns as usize, rows as usize);
                let input = float_matrix(c, r);
                let output = float_matrix(r, c);
                let components = (0..r)
                    .flat_map(|j| (0..c).map(move |i| format!("m[{i}][{j}]")))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "{output} spvTranspose({input} m)\n{{")?;
                writeln!(out, "    return {output}({components});\n}}")?;
            }
            Self::Inverse(size) => write_inverse(out, size as usize)?,
            Self::Determinant(size) => {
                let n = size as usize;
                let ty = float_matrix(n, n);
                writeln!(out, "float spvDeterminant({ty} m)\n{{")?;
                let body = if n == 4 {
                    (0..4)
                        .map(|c| {
                            let sign = match c {
                                0 => "",
                                _ if c % 2 == 1 => " - ",
                                _ => " + ",
                            };
                            format!("{sign}m[{c}][0] * {}", minor(4, c, 0))
                        })
                        .collect::<String>()
                } else {
                    let all = (0..n)
                        .flat_map(|c| (0..n).map(move |r| format!("m[{c}][{r}]")))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("spvDet{n}x{n}({all})")
                };
                writeln!(out, "    return {body};\n}}")?;
            }
        }
        out.push('\n');
        Ok(())
    }
}

fn value_type(scalar: Scalar, size: Option<VectorSize>) -> Result<String, Error> {
    match size {
        Some(size) => vector_name(scalar, size),
        None => Ok(scalar_name(scalar)?.to_string()),
    }
}

fn float_matrix(columns: usize, rows: usize) -> String {
    if columns == rows {
        format!("mat{columns}")
    } else {
        format!("mat{columns}x{rows}")
    }
}

/// Determinant of the `n`x`n` matrix `m` without column `column` and row
/// `row`, spelled with the determinant helpers.
fn minor(n: usize, column: usize, row: usize) -> String {
    let elements = (0..n)
        .filter(|&c| c != column)
        .flat_map(|c| {
            (0..n)
                .filter(move |&r| r != row)
                .map(move |r| format!("m[{c}][{r}]"))
        })
        .collect::<Vec<_>>();
    match n - 1 {
        1 => elements.concat(),
        k => format!("spvDet{k}x{k}({})", elements.join(", ")),
    }
}

fn write_inverse(out: &mut String, n: usize) -> Result<(), Error> {
    let ty = float_matrix(n, n);
    writeln!(out, "{ty} spvInverse{n}x{n}({ty} m)\n{{")?;
    writeln!(out, "    {ty} adj;")?;
    out.push('\n');
    // The classical adjoint: the transpose of the cofactor matrix.
    for c in 0..n {
        for r in 0..n {
            let sign = if (c + r) % 2 == 0 { "" } else { "-" };
            writeln!(out, "    adj[{c}][{r}] = {sign}{};", minor(n, r, c))?;
        }
    }
    out.push('\n');
    let det = (0..n)
        .map(|c| format!("(adj[0][{c}] * m[{c}][0])"))
        .collect::<Vec<_>>()
        .join(" + ");
    writeln!(out, "    float det = {det};")?;
    out.push('\n');
    // A singular matrix is returned unchanged.
    writeln!(out, "    return (det != 0.0) ? (adj * (1.0 / det)) : m;\n}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_follow_their_dependencies() {
        for p in [
            Polyfill::Inverse(VectorSize::Quad),
            Polyfill::Determinant(VectorSize::Tri),
            Polyfill::NClamp {
                scalar: Scalar::F32,
                size: Some(VectorSize::Tri),
            },
        ] {
            for dep in p.closure().into_iter().skip(1) {
                assert!(dep < p, "{dep:?} must sort before {p:?}");
            }
        }
    }

    #[test]
    fn inverse4_pulls_in_both_determinants() {
        let closure = Polyfill::Inverse(VectorSize::Quad).closure();
        assert!(closure.contains(&Polyfill::Det3x3));
        assert!(closure.contains(&Polyfill::Det2x2));
    }

    #[test]
    fn inverse2x2_text() {
        let mut out = String::new();
        Polyfill::Inverse(VectorSize::Bi).write(&mut out).unwrap();
        assert!(out.starts_with("mat2 spvInverse2x2(mat2 m)\n{\n"));
        assert!(out.contains("    adj[0][0] = m[1][1];\n"));
        assert!(out.contains("    adj[0][1] = -m[0][1];\n"));
        assert!(out.contains("    adj[1][0] = -m[1][0];\n"));
        assert!(out.contains("    adj[1][1] = m[0][0];\n"));
        assert!(out.contains("float det = (adj[0][0] * m[0][0]) + (adj[0][1] * m[1][0]);"));
        assert!(!out.contains("0.0f"));
    }

    #[test]
    fn inverse4x4_first_cofactors() {
        let mut out = String::new();
        Polyfill::Inverse(VectorSize::Quad).write(&mut out).unwrap();
        assert!(out.contains(
            "adj[0][0] = spvDet3x3(m[1][1], m[1][2], m[1][3], m[2][1], m[2][2], m[2][3], \
             m[3][1], m[3][2], m[3][3]);"
        ));
        assert!(out.contains(
            "adj[0][1] = -spvDet3x3(m[0][1], m[0][2], m[0][3], m[2][1], m[2][2], m[2][3], \
             m[3][1], m[3][2], m[3][3]);"
        ));
    }

    #[test]
    fn transpose_of_non_square() {
        let mut out = String::new();
        Polyfill::Transpose {
            columns: VectorSize::Tri,
            rows: VectorSize::Bi,
        }
        .write(&mut out)
        .unwrap();
        assert!(out.starts_with("mat2x3 spvTranspose(mat3x2 m)"));
        assert!(out.contains("mat2x3(m[0][0], m[1][0], m[2][0], m[0][1], m[1][1], m[2][1])"));
    }

    #[test]
    fn nan_aware_min() {
        let mut out = String::new();
        Polyfill::NMin {
            scalar: Scalar::F32,
            size: Some(VectorSize::Bi),
        }
        .write(&mut out)
        .unwrap();
        assert!(out.starts_with("vec2 spvNMin(vec2 a, vec2 b)"));
        assert!(out.contains("mix(mix(min(a, b), a, isnan(b)), b, isnan(a))"));
    }
}
