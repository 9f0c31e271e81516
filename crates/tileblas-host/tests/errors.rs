mod common;

use common::{download, engine, small_tiles, upload};
use std::sync::Arc;
use tileblas::database::{DeviceSelector, TuningEntry, XGEMM};
use tileblas::device::KernelLaunch;
use tileblas::{
    BlasError, Buffer, Device, DeviceError, DeviceIdentity, Diagonal, Engine, Event, Layout,
    MatrixArg, Operand, Precision, Program, Side, StatusCode, Transpose, Triangle,
    TuningParameters,
};
use tileblas_host::{HostDevice, HostDeviceConfig};

/// Host device whose launches of one kernel fail while running.
struct FaultyDevice {
    inner: Arc<HostDevice>,
    failing: &'static str,
}

impl Device for FaultyDevice {
    fn identity(&self) -> &DeviceIdentity {
        self.inner.identity()
    }

    fn allocate(&self, bytes: usize) -> Result<Buffer, DeviceError> {
        self.inner.allocate(bytes)
    }

    fn build_program(&self, source: &str, options: &[String]) -> Result<Arc<dyn Program>, DeviceError> {
        self.inner.build_program(source, options)
    }

    fn enqueue_kernel(&self, launch: KernelLaunch<'_>) -> Result<Event, DeviceError> {
        if launch.kernel == self.failing {
            let (event, signal) = Event::pending();
            signal.finish(Err(DeviceError::Execution("device fault".into())));
            return Ok(event);
        }
        self.inner.enqueue_kernel(launch)
    }

    fn enqueue_copy(
        &self,
        src: &Buffer,
        dst: &Buffer,
        bytes: usize,
        wait_for: &[Event],
    ) -> Result<Event, DeviceError> {
        self.inner.enqueue_copy(src, dst, bytes, wait_for)
    }

    fn write_buffer(&self, buffer: &Buffer, offset: usize, data: &[u8]) -> Result<(), DeviceError> {
        self.inner.write_buffer(buffer, offset, data)
    }

    fn read_buffer(&self, buffer: &Buffer, offset: usize, out: &mut [u8]) -> Result<(), DeviceError> {
        self.inner.read_buffer(buffer, offset, out)
    }

    fn finish(&self) -> Result<(), DeviceError> {
        self.inner.finish()
    }
}

fn faulty_engine(failing: &'static str) -> Engine {
    let device = FaultyDevice {
        inner: Arc::new(HostDevice::new()),
        failing,
    };
    Engine::new(Arc::new(device)).with_database(small_tiles())
}

fn gemm_2x2(engine: &Engine, a: MatrixArg<'_>, b: MatrixArg<'_>, c: MatrixArg<'_>) -> tileblas::Result<()> {
    engine
        .gemm(Layout::ColMajor, Transpose::No, Transpose::No, 2, 2, 2, 1.0f64, a, b, 0.0, c)
        .map(|_| ())
}

#[test]
fn test_zero_dimension() {
    let (device, engine) = engine();
    let buffer = upload(&engine, &[0.0f64; 4]);
    let arg = MatrixArg::new(&buffer, 0, 2);
    let result = engine.gemm(
        Layout::ColMajor,
        Transpose::No,
        Transpose::No,
        0,
        2,
        2,
        1.0f64,
        arg,
        arg,
        0.0,
        arg,
    );
    assert!(matches!(result, Err(BlasError::InvalidDimension)));
    assert_eq!(StatusCode::from(&result), StatusCode::InvalidDimension);

    let result = engine.syrk(
        Layout::RowMajor,
        Triangle::Upper,
        Transpose::No,
        2,
        0,
        1.0f64,
        arg,
        0.0,
        arg,
    );
    assert!(matches!(result, Err(BlasError::InvalidDimension)));
    assert_eq!(device.builds(), 0);
}

#[test]
fn test_null_buffer_names_the_operand() {
    let (_device, engine) = engine();
    let buffer = upload(&engine, &[0.0f64; 4]);
    let null = Buffer::null();
    let good = MatrixArg::new(&buffer, 0, 2);

    let err = gemm_2x2(&engine, good, MatrixArg::new(&null, 0, 2), good).unwrap_err();
    assert!(matches!(err, BlasError::InvalidBufferHandle(Operand::B)));
    assert_eq!(err.status(), StatusCode::InvalidBufferHandle);
}

#[test]
fn test_leading_dimension_too_small() {
    let (_device, engine) = engine();
    let buffer = upload(&engine, &[0.0f64; 16]);
    let good = MatrixArg::new(&buffer, 0, 2);
    let err = gemm_2x2(&engine, good, good, MatrixArg::new(&buffer, 0, 1)).unwrap_err();
    assert!(matches!(
        err,
        BlasError::InvalidLeadingDimension {
            operand: Operand::C,
            ld: 1,
            minimum: 2
        }
    ));
}

#[test]
fn test_row_major_leading_dimension_counts_columns() {
    let (_device, engine) = engine();
    let a = upload(&engine, &[0.0f64; 12]);
    let b = upload(&engine, &[0.0f64; 12]);
    let c = upload(&engine, &[0.0f64; 4]);
    // A is 2x3 row-major: ld must be at least 3
    let err = engine
        .gemm(
            Layout::RowMajor,
            Transpose::No,
            Transpose::No,
            2,
            2,
            3,
            1.0f64,
            MatrixArg::new(&a, 0, 2),
            MatrixArg::new(&b, 0, 2),
            0.0,
            MatrixArg::new(&c, 0, 2),
        )
        .unwrap_err();
    assert_eq!(err.operand(), Some(Operand::A));
    assert_eq!(err.status(), StatusCode::InvalidLeadingDimension);
}

#[test]
fn test_buffer_too_small_for_offset() {
    let (_device, engine) = engine();
    let buffer = upload(&engine, &[0.0f64; 4]);
    let good = MatrixArg::new(&buffer, 0, 2);
    let err = gemm_2x2(&engine, MatrixArg::new(&buffer, 1, 2), good, good).unwrap_err();
    match err {
        BlasError::InvalidMatrixSize {
            operand,
            required,
            available,
        } => {
            assert_eq!(operand, Operand::A);
            assert_eq!(required, 5 * 8);
            assert_eq!(available, 4 * 8);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_temporary_allocation_failure_launches_nothing() {
    // room for the three 5x5 operands but not for an 8x8 temporary
    let device = Arc::new(HostDevice::with_config(
        HostDeviceConfig::default().with_memory_limit(3 * 25 * 8 + 100),
    ));
    let engine = Engine::new(device.clone()).with_database(small_tiles());
    let a = upload(&engine, &[1.0f64; 25]);
    let b = upload(&engine, &[1.0f64; 25]);
    let c = upload(&engine, &[7.0f64; 25]);

    let err = engine
        .gemm(
            Layout::ColMajor,
            Transpose::No,
            Transpose::No,
            5,
            5,
            5,
            1.0f64,
            MatrixArg::new(&a, 0, 5),
            MatrixArg::new(&b, 0, 5),
            0.0,
            MatrixArg::new(&c, 0, 5),
        )
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::TempBufferAllocFailure);
    assert_eq!(device.launches(), 0);
    // temporaries reserved before the failure are released
    assert_eq!(device.allocated_bytes(), 3 * 25 * 8);
    assert_eq!(download::<f64>(&engine, &c), vec![7.0; 25]);
}

#[test]
fn test_trsm_allocation_failure_before_packing() {
    let device = Arc::new(HostDevice::with_config(
        HostDeviceConfig::default().with_memory_limit(2 * 9 * 8 + 8 * 8),
    ));
    let engine = Engine::new(device.clone()).with_database(small_tiles());
    let a = upload(&engine, &[1.0f64; 9]);
    let b = upload(&engine, &[1.0f64; 9]);
    let err = engine
        .trsm(
            Layout::ColMajor,
            Side::Left,
            Triangle::Lower,
            Transpose::No,
            Diagonal::NonUnit,
            3,
            3,
            1.0f64,
            MatrixArg::new(&a, 0, 3),
            MatrixArg::new(&b, 0, 3),
        )
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::TempBufferAllocFailure);
    assert_eq!(device.launches(), 0);
}

#[test]
fn test_broken_tuning_parameters_are_invalid_kernel() {
    // MWG is not a multiple of MDIMC * VWM
    let broken: Vec<TuningEntry> = Precision::ALL
        .into_iter()
        .map(|precision| TuningEntry {
            routine: XGEMM.to_string(),
            precision,
            selector: DeviceSelector::global_default(),
            parameters: TuningParameters::from_pairs([
                ("MWG", 6),
                ("NWG", 4),
                ("KWG", 4),
                ("MDIMC", 4),
                ("NDIMC", 2),
                ("MDIMA", 2),
                ("NDIMB", 2),
                ("KWI", 1),
                ("VWM", 1),
                ("VWN", 1),
            ]),
        })
        .collect();
    let database = small_tiles().with_overrides(broken).unwrap();
    let device = Arc::new(HostDevice::new());
    let engine = Engine::new(device.clone()).with_database(Arc::new(database));

    let a = upload(&engine, &[1.0f64; 4]);
    let arg = MatrixArg::new(&a, 0, 2);
    let err = gemm_2x2(&engine, arg, arg, arg).unwrap_err();
    assert_eq!(err.status(), StatusCode::InvalidKernel);
    assert!(err.to_string().contains("MDIMC*VWM"));
    assert_eq!(device.launches(), 0);
    assert_eq!(download::<f64>(&engine, &a), vec![1.0; 4]);
}

#[test]
fn test_missing_tuning_parameter_is_invalid_kernel() {
    let (_device, engine) = engine();
    let routine = engine
        .routine(tileblas::RoutineFamily::Gemm, Precision::Single)
        .unwrap();
    let err = routine.param("NOT_A_PARAMETER").unwrap_err();
    assert_eq!(err.status(), StatusCode::InvalidKernel);
}

#[test]
fn test_failed_multiply_fails_the_routine_event() {
    let engine = faulty_engine("Xgemm");
    let a = upload(&engine, &[1.0f64; 25]);
    let b = upload(&engine, &[1.0f64; 25]);
    let c = upload(&engine, &[7.0f64; 25]);
    let event = engine
        .gemm(
            Layout::ColMajor,
            Transpose::No,
            Transpose::No,
            5,
            5,
            5,
            1.0f64,
            MatrixArg::new(&a, 0, 5),
            MatrixArg::new(&b, 0, 5),
            0.0,
            MatrixArg::new(&c, 0, 5),
        )
        .unwrap();
    assert_eq!(event.wait(), Err(DeviceError::Execution("device fault".into())));
    assert!(event.is_complete());
    // the write-back behind the failed multiply never ran
    assert_eq!(download::<f64>(&engine, &c), vec![7.0; 25]);
}

#[test]
fn test_failed_packing_skips_the_multiply() {
    let engine = faulty_engine("SymmUpperToSquared");
    let a = upload(&engine, &[1.0f64; 16]);
    let b = upload(&engine, &[1.0f64; 16]);
    let c = upload(&engine, &[7.0f64; 16]);
    // 4x4 operands are kernel-shaped, so the multiply would write C directly
    let event = engine
        .symm(
            Layout::ColMajor,
            Side::Left,
            Triangle::Upper,
            4,
            4,
            1.0f64,
            MatrixArg::new(&a, 0, 4),
            MatrixArg::new(&b, 0, 4),
            0.0,
            MatrixArg::new(&c, 0, 4),
        )
        .unwrap();
    assert_eq!(event.wait(), Err(DeviceError::Execution("device fault".into())));
    assert_eq!(download::<f64>(&engine, &c), vec![7.0; 16]);
}
