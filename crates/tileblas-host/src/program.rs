//! Programs "compiled" by the host device.
//!
//! A build parses the assembled kernel source instead of compiling it: the
//! `PRECISION` constant, the integer `#define` tuning constants and the
//! declared `__kernel` entry points. The compile-time constraints of the tiled
//! multiply are checked the same way its `#error` guards would.

use crate::kernels;
use std::any::Any;
use tileblas::database::TuningParameters;
use tileblas::device::{DeviceError, Program};
use tileblas::source::{self, PRECISION_DEFINE};
use tileblas::Precision;

#[derive(Debug)]
pub struct HostProgram {
    precision: Precision,
    params: TuningParameters,
    kernels: Vec<String>,
}

impl HostProgram {
    pub fn compile(source: &str, options: &[String]) -> Result<Self, DeviceError> {
        if let Some(option) = options.iter().find(|o| !o.starts_with("-D") && !o.starts_with("-cl-")) {
            return Err(DeviceError::Build(format!("unsupported build option {}", option)));
        }

        let params = source::parse_defines(source);
        let precision = params
            .get(PRECISION_DEFINE)
            .and_then(Precision::from_define_value)
            .ok_or_else(|| DeviceError::Build("missing or unknown PRECISION".into()))?;

        let kernels: Vec<String> = source::kernel_names(source)
            .into_iter()
            .map(str::to_string)
            .collect();
        if kernels.is_empty() {
            return Err(DeviceError::Build("source declares no kernels".into()));
        }
        if let Some(name) = kernels.iter().find(|name| !kernels::is_known(name)) {
            return Err(DeviceError::Build(format!("no host execution for kernel {}", name)));
        }
        if kernels.iter().any(|name| name.starts_with("Xgemm")) {
            source::check_xgemm_constraints(&params)
                .map_err(|reason| DeviceError::Build(format!("xgemm.cl: #error \"{}\"", reason)))?;
        }

        Ok(Self {
            precision,
            params,
            kernels,
        })
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// The `#define` constants the program was built with.
    pub fn params(&self) -> &TuningParameters {
        &self.params
    }

    /// A compile-time constant the kernels rely on.
    pub(crate) fn constant(&self, name: &str) -> Result<usize, DeviceError> {
        match self.params.get(name) {
            Some(0) | None => Err(DeviceError::Build(format!(
                "constant {} is undefined or zero",
                name
            ))),
            Some(value) => Ok(value),
        }
    }
}

impl Program for HostProgram {
    fn kernel_names(&self) -> Vec<&str> {
        self.kernels.iter().map(String::as_str).collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
