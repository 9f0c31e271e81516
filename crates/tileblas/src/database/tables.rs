//! Built-in tuning tables.

use super::{
    DeviceSelector, TuningEntry, TuningParameters, COPY, PAD, PAD_TRANSPOSE, TRANSPOSE, TRSM,
    XGEMM,
};
use crate::device::DeviceType;
use crate::types::Precision::{self, ComplexDouble, ComplexSingle, Double, Single};

const NVIDIA: &str = "NVIDIA Corporation";
const AMD: &str = "Advanced Micro Devices, Inc.";
const INTEL: &str = "Intel";

macro_rules! params {
    ($($name:ident: $value:expr),* $(,)?) => {
        TuningParameters::from_pairs([$((stringify!($name), $value)),*])
    };
}

fn device(
    routine: &str,
    precision: Precision,
    vendor: &str,
    name: &str,
    parameters: TuningParameters,
) -> TuningEntry {
    TuningEntry {
        routine: routine.to_string(),
        precision,
        selector: DeviceSelector::new(DeviceType::Gpu, vendor, name),
        parameters,
    }
}

fn vendor_default(
    routine: &str,
    precision: Precision,
    vendor: &str,
    parameters: TuningParameters,
) -> TuningEntry {
    TuningEntry {
        routine: routine.to_string(),
        precision,
        selector: DeviceSelector::vendor_default(DeviceType::Gpu, vendor),
        parameters,
    }
}

/// The same global default for all four precisions.
fn defaults(routine: &str, parameters: TuningParameters) -> Vec<TuningEntry> {
    Precision::ALL
        .into_iter()
        .map(|precision| TuningEntry {
            routine: routine.to_string(),
            precision,
            selector: DeviceSelector::global_default(),
            parameters: parameters.clone(),
        })
        .collect()
}

pub(super) fn builtin_entries() -> Vec<TuningEntry> {
    let mut entries = Vec::new();
    entries.extend(copy());
    entries.extend(pad());
    entries.extend(transpose());
    entries.extend(pad_transpose());
    entries.extend(xgemm());
    entries.extend(trsm());
    entries
}

fn copy() -> Vec<TuningEntry> {
    let mut entries = vec![
        device(COPY, Single, NVIDIA, "GeForce GTX 480", params! { COPY_DIMX: 32, COPY_DIMY: 8, COPY_WPT: 1, COPY_VW: 2 }),
        device(COPY, Single, NVIDIA, "Tesla K20m", params! { COPY_DIMX: 8, COPY_DIMY: 16, COPY_WPT: 2, COPY_VW: 4 }),
        device(COPY, Single, NVIDIA, "Tesla K40m", params! { COPY_DIMX: 16, COPY_DIMY: 16, COPY_WPT: 4, COPY_VW: 4 }),
        device(COPY, Single, AMD, "Tahiti", params! { COPY_DIMX: 16, COPY_DIMY: 8, COPY_WPT: 4, COPY_VW: 2 }),
        device(COPY, Single, INTEL, "Iris", params! { COPY_DIMX: 32, COPY_DIMY: 8, COPY_WPT: 1, COPY_VW: 4 }),
        vendor_default(COPY, Single, NVIDIA, params! { COPY_DIMX: 16, COPY_DIMY: 8, COPY_WPT: 2, COPY_VW: 2 }),
        device(COPY, Double, NVIDIA, "Tesla K40m", params! { COPY_DIMX: 16, COPY_DIMY: 16, COPY_WPT: 2, COPY_VW: 2 }),
        device(COPY, Double, AMD, "Tahiti", params! { COPY_DIMX: 16, COPY_DIMY: 8, COPY_WPT: 2, COPY_VW: 2 }),
        device(COPY, ComplexSingle, NVIDIA, "Tesla K40m", params! { COPY_DIMX: 16, COPY_DIMY: 8, COPY_WPT: 2, COPY_VW: 1 }),
        device(COPY, ComplexDouble, NVIDIA, "Tesla K40m", params! { COPY_DIMX: 8, COPY_DIMY: 8, COPY_WPT: 1, COPY_VW: 1 }),
    ];
    entries.extend(defaults(COPY, params! { COPY_DIMX: 8, COPY_DIMY: 8, COPY_WPT: 1, COPY_VW: 1 }));
    entries
}

fn pad() -> Vec<TuningEntry> {
    let mut entries = vec![
        device(PAD, Single, NVIDIA, "Tesla K40m", params! { PAD_DIMX: 32, PAD_DIMY: 8, PAD_WPTX: 1, PAD_WPTY: 2 }),
        device(PAD, Single, AMD, "Tahiti", params! { PAD_DIMX: 16, PAD_DIMY: 16, PAD_WPTX: 2, PAD_WPTY: 1 }),
        device(PAD, Single, INTEL, "Iris", params! { PAD_DIMX: 16, PAD_DIMY: 8, PAD_WPTX: 1, PAD_WPTY: 1 }),
        device(PAD, Double, NVIDIA, "Tesla K40m", params! { PAD_DIMX: 16, PAD_DIMY: 16, PAD_WPTX: 1, PAD_WPTY: 1 }),
        device(PAD, ComplexSingle, NVIDIA, "Tesla K40m", params! { PAD_DIMX: 16, PAD_DIMY: 8, PAD_WPTX: 1, PAD_WPTY: 2 }),
    ];
    entries.extend(defaults(PAD, params! { PAD_DIMX: 8, PAD_DIMY: 8, PAD_WPTX: 1, PAD_WPTY: 1 }));
    entries
}

fn transpose() -> Vec<TuningEntry> {
    let mut entries = vec![
        device(TRANSPOSE, Single, NVIDIA, "Tesla K40m", params! { TRA_DIM: 16, TRA_WPT: 2, TRA_PAD: 1, TRA_SHUFFLE: 0 }),
        device(TRANSPOSE, Single, AMD, "Tahiti", params! { TRA_DIM: 16, TRA_WPT: 4, TRA_PAD: 0, TRA_SHUFFLE: 1 }),
        device(TRANSPOSE, Double, NVIDIA, "Tesla K40m", params! { TRA_DIM: 8, TRA_WPT: 2, TRA_PAD: 1, TRA_SHUFFLE: 0 }),
    ];
    entries.extend(defaults(TRANSPOSE, params! { TRA_DIM: 8, TRA_WPT: 1, TRA_PAD: 0, TRA_SHUFFLE: 0 }));
    entries
}

fn pad_transpose() -> Vec<TuningEntry> {
    let mut entries = vec![
        device(PAD_TRANSPOSE, Single, NVIDIA, "Tesla K40m", params! { PADTRA_TILE: 16, PADTRA_WPT: 2, PADTRA_PAD: 1 }),
        device(PAD_TRANSPOSE, Single, AMD, "Tahiti", params! { PADTRA_TILE: 16, PADTRA_WPT: 4, PADTRA_PAD: 0 }),
        device(PAD_TRANSPOSE, ComplexDouble, NVIDIA, "Tesla K40m", params! { PADTRA_TILE: 8, PADTRA_WPT: 1, PADTRA_PAD: 1 }),
    ];
    entries.extend(defaults(PAD_TRANSPOSE, params! { PADTRA_TILE: 8, PADTRA_WPT: 1, PADTRA_PAD: 0 }));
    entries
}

fn xgemm() -> Vec<TuningEntry> {
    let mut entries = vec![
        device(XGEMM, Single, NVIDIA, "GeForce GTX 480", params! {
            MWG: 64, NWG: 64, KWG: 32, MDIMC: 16, NDIMC: 16, MDIMA: 16, NDIMB: 16,
            KWI: 2, VWM: 2, VWN: 2, STRM: 1, STRN: 0, SA: 1, SB: 1,
        }),
        device(XGEMM, Single, NVIDIA, "Tesla K20m", params! {
            MWG: 128, NWG: 64, KWG: 16, MDIMC: 32, NDIMC: 8, MDIMA: 16, NDIMB: 32,
            KWI: 2, VWM: 4, VWN: 1, STRM: 1, STRN: 0, SA: 1, SB: 1,
        }),
        device(XGEMM, Single, NVIDIA, "Tesla K40m", params! {
            MWG: 128, NWG: 128, KWG: 16, MDIMC: 16, NDIMC: 16, MDIMA: 32, NDIMB: 32,
            KWI: 2, VWM: 4, VWN: 1, STRM: 1, STRN: 0, SA: 1, SB: 1,
        }),
        vendor_default(XGEMM, Single, NVIDIA, params! {
            MWG: 64, NWG: 64, KWG: 16, MDIMC: 16, NDIMC: 16, MDIMA: 16, NDIMB: 16,
            KWI: 2, VWM: 2, VWN: 2, STRM: 1, STRN: 0, SA: 1, SB: 1,
        }),
        device(XGEMM, Single, AMD, "Tahiti", params! {
            MWG: 128, NWG: 128, KWG: 32, MDIMC: 16, NDIMC: 16, MDIMA: 16, NDIMB: 16,
            KWI: 2, VWM: 4, VWN: 4, STRM: 1, STRN: 1, SA: 1, SB: 1,
        }),
        device(XGEMM, Single, INTEL, "Iris", params! {
            MWG: 64, NWG: 64, KWG: 32, MDIMC: 8, NDIMC: 8, MDIMA: 16, NDIMB: 8,
            KWI: 8, VWM: 4, VWN: 4, STRM: 1, STRN: 1, SA: 1, SB: 0,
        }),
        device(XGEMM, Double, NVIDIA, "Tesla K40m", params! {
            MWG: 64, NWG: 64, KWG: 16, MDIMC: 16, NDIMC: 16, MDIMA: 16, NDIMB: 16,
            KWI: 2, VWM: 2, VWN: 2, STRM: 1, STRN: 0, SA: 1, SB: 1,
        }),
        device(XGEMM, Double, AMD, "Tahiti", params! {
            MWG: 64, NWG: 64, KWG: 32, MDIMC: 16, NDIMC: 16, MDIMA: 16, NDIMB: 16,
            KWI: 2, VWM: 2, VWN: 4, STRM: 1, STRN: 0, SA: 1, SB: 1,
        }),
        device(XGEMM, ComplexSingle, NVIDIA, "Tesla K40m", params! {
            MWG: 32, NWG: 64, KWG: 16, MDIMC: 16, NDIMC: 16, MDIMA: 16, NDIMB: 16,
            KWI: 2, VWM: 1, VWN: 1, STRM: 1, STRN: 0, SA: 1, SB: 1,
        }),
        device(XGEMM, ComplexDouble, NVIDIA, "Tesla K40m", params! {
            MWG: 32, NWG: 32, KWG: 16, MDIMC: 8, NDIMC: 8, MDIMA: 16, NDIMB: 8,
            KWI: 2, VWM: 1, VWN: 1, STRM: 1, STRN: 0, SA: 1, SB: 0,
        }),
    ];
    entries.extend(defaults(XGEMM, params! {
        MWG: 32, NWG: 32, KWG: 16, MDIMC: 8, NDIMC: 8, MDIMA: 8, NDIMB: 8,
        KWI: 1, VWM: 1, VWN: 1, STRM: 0, STRN: 0, SA: 0, SB: 0,
    }));
    entries
}

fn trsm() -> Vec<TuningEntry> {
    let mut entries = vec![
        device(TRSM, Single, NVIDIA, "Tesla K40m", params! { TRSM_DIM: 32 }),
        device(TRSM, Double, NVIDIA, "Tesla K40m", params! { TRSM_DIM: 16 }),
    ];
    entries.extend(defaults(TRSM, params! { TRSM_DIM: 8 }));
    entries
}
