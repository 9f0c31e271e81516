//! Kernel source fragments and program assembly.
//!
//! Each routine family compiles one program: a `PRECISION` define, the
//! merged tuning parameters as `#define` constants, and the concatenated
//! kernel fragments the family needs.
//!
//! | Fragment | Entry points |
//! |----------|--------------|
//! | `common.cl` | (types and arithmetic macros) |
//! | `copy.cl` | `CopyMatrix` |
//! | `pad.cl` | `PadMatrix`, `UnPadMatrix`, `Symm*ToSquared`, `Herm*ToSquared`, `Trmm*ToSquared` |
//! | `transpose.cl` | `TransposeMatrix` |
//! | `padtranspose.cl` | `PadTransposeMatrix`, `UnPadTransposeMatrix` |
//! | `xgemm.cl` | `Xgemm`, `XgemmUpper`, `XgemmLower` |
//! | `trsm.cl` | `TrsmSolve` |

use crate::database::{TuningParameters, COPY, PAD, PAD_TRANSPOSE, TRANSPOSE, TRSM, XGEMM};
use crate::types::Precision;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const COMMON: &str = include_str!("../kernels/common.cl");
pub const COPY_FAST: &str = include_str!("../kernels/copy.cl");
pub const PAD_COPY: &str = include_str!("../kernels/pad.cl");
pub const TRANSPOSE_FAST: &str = include_str!("../kernels/transpose.cl");
pub const PAD_TRANSPOSE_COPY: &str = include_str!("../kernels/padtranspose.cl");
pub const XGEMM_KERNELS: &str = include_str!("../kernels/xgemm.cl");
pub const TRSM_KERNELS: &str = include_str!("../kernels/trsm.cl");

/// Name of the precision constant every program is compiled with.
pub const PRECISION_DEFINE: &str = "PRECISION";

/// Group of routines sharing one compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoutineFamily {
    Gemm,
    Symm,
    Hemm,
    Syrk,
    Herk,
    Syr2k,
    Her2k,
    Trmm,
    Trsm,
}

impl RoutineFamily {
    pub const ALL: [RoutineFamily; 9] = [
        RoutineFamily::Gemm,
        RoutineFamily::Symm,
        RoutineFamily::Hemm,
        RoutineFamily::Syrk,
        RoutineFamily::Herk,
        RoutineFamily::Syr2k,
        RoutineFamily::Her2k,
        RoutineFamily::Trmm,
        RoutineFamily::Trsm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RoutineFamily::Gemm => "GEMM",
            RoutineFamily::Symm => "SYMM",
            RoutineFamily::Hemm => "HEMM",
            RoutineFamily::Syrk => "SYRK",
            RoutineFamily::Herk => "HERK",
            RoutineFamily::Syr2k => "SYR2K",
            RoutineFamily::Her2k => "HER2K",
            RoutineFamily::Trmm => "TRMM",
            RoutineFamily::Trsm => "TRSM",
        }
    }

    /// Tuning tables whose parameters the family's program is compiled with.
    pub fn tuning_tables(self) -> &'static [&'static str] {
        match self {
            RoutineFamily::Trsm => &[COPY, PAD, TRANSPOSE, PAD_TRANSPOSE, XGEMM, TRSM],
            _ => &[COPY, PAD, TRANSPOSE, PAD_TRANSPOSE, XGEMM],
        }
    }

    /// Kernel source fragments, in concatenation order.
    pub fn fragments(self) -> &'static [&'static str] {
        match self {
            RoutineFamily::Trsm => &[
                COMMON,
                COPY_FAST,
                PAD_COPY,
                TRANSPOSE_FAST,
                PAD_TRANSPOSE_COPY,
                TRSM_KERNELS,
            ],
            _ => &[
                COMMON,
                COPY_FAST,
                PAD_COPY,
                TRANSPOSE_FAST,
                PAD_TRANSPOSE_COPY,
                XGEMM_KERNELS,
            ],
        }
    }
}

impl fmt::Display for RoutineFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Full program source: precision constant, tuning constants, fragments.
pub fn assemble(precision: Precision, params: &TuningParameters, fragments: &[&str]) -> String {
    let mut source = format!("#define {} {}\n", PRECISION_DEFINE, precision.define_value());
    source.push_str(&params.to_defines());
    for fragment in fragments {
        source.push('\n');
        source.push_str(fragment);
    }
    source
}

/// Hash of an assembled source, part of the program cache key.
pub fn source_hash(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Kernel entry points declared in a source (`__kernel void Name(`).
pub fn kernel_names(source: &str) -> Vec<&str> {
    const MARKER: &str = "__kernel void ";
    source
        .match_indices(MARKER)
        .filter_map(|(start, _)| {
            let rest = &source[start + MARKER.len()..];
            let end = rest.find('(')?;
            let name = rest[..end].trim();
            (!name.is_empty()).then_some(name)
        })
        .collect()
}

/// `#define NAME VALUE` constants with integer values.
pub fn parse_defines(source: &str) -> TuningParameters {
    source
        .lines()
        .filter_map(|line| {
            let mut words = line.trim().strip_prefix("#define ")?.split_whitespace();
            let name = words.next()?;
            let value = words.next()?.parse::<usize>().ok()?;
            words.next().is_none().then_some((name, value))
        })
        .collect()
}

/// The compile-time checks of the tiled multiply kernel (`#error` guards in
/// `xgemm.cl`).
pub fn check_xgemm_constraints(params: &TuningParameters) -> Result<(), String> {
    const NAMES: [&str; 10] = [
        "MWG", "NWG", "KWG", "MDIMC", "NDIMC", "MDIMA", "NDIMB", "KWI", "VWM", "VWN",
    ];
    let mut values = [0usize; 10];
    for (slot, name) in values.iter_mut().zip(NAMES) {
        *slot = match params.get(name) {
            Some(0) => return Err(format!("{} must be positive", name)),
            Some(value) => value,
            None => return Err(format!("missing parameter {}", name)),
        };
    }
    let [mwg, nwg, kwg, mdimc, ndimc, mdima, ndimb, kwi, vwm, vwn] = values;

    let threads = mdimc * ndimc;
    let checks = [
        (mwg % (mdimc * vwm) == 0, "MWG must be a multiple of MDIMC*VWM"),
        (nwg % (ndimc * vwn) == 0, "NWG must be a multiple of NDIMC*VWN"),
        (mwg % (mdima * vwm) == 0, "MWG must be a multiple of MDIMA*VWM"),
        (nwg % (ndimb * vwn) == 0, "NWG must be a multiple of NDIMB*VWN"),
        (kwg % kwi == 0, "KWG must be a multiple of KWI"),
        (threads % mdima == 0, "MDIMC*NDIMC must be a multiple of MDIMA"),
        (threads % ndimb == 0, "MDIMC*NDIMC must be a multiple of NDIMB"),
    ];
    if let Some((_, message)) = checks.iter().find(|(ok, _)| !ok) {
        return Err(message.to_string());
    }
    if kwg % (threads / mdima) != 0 {
        return Err("KWG must be a multiple of MDIMC*NDIMC/MDIMA".to_string());
    }
    if kwg % (threads / ndimb) != 0 {
        return Err("KWG must be a multiple of MDIMC*NDIMC/NDIMB".to_string());
    }
    Ok(())
}
