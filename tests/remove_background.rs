use cutout::backend::{
    BackendChoice, ComputeAdapter, ComputeProbe, InferenceEngine, InferenceSession, ModelSource,
};
use cutout::segmentation::{ModelOutputs, NormalizedTensor, TensorData};
use cutout::{BackgroundRemover, Error, RemoverConfig, Result, SegmentationModel, MODEL_INPUT_SIZE};
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};
use std::thread;

const FRAME: usize = MODEL_INPUT_SIZE as usize;

/// Session that answers with a mask derived from the input tensor
struct EchoSession {
    output_name: String,
    fail: bool,
}

impl InferenceSession for EchoSession {
    fn run(&mut self, input_name: &str, input: &NormalizedTensor) -> Result<ModelOutputs> {
        if self.fail {
            return Err(Error::Inference("kernel launch failed".to_string()));
        }
        assert_eq!(input_name, "input");
        assert_eq!(input.shape(), [1, 3, FRAME, FRAME]);

        // Red plane as the score: bright red pixels become foreground
        let data = input.as_array();
        let mut scores = Vec::with_capacity(FRAME * FRAME);
        for y in 0..FRAME {
            for x in 0..FRAME {
                scores.push(data[[0, 0, y, x]]);
            }
        }

        let mut outputs = ModelOutputs::new();
        outputs.insert(
            self.output_name.clone(),
            TensorData {
                shape: vec![1, 1, FRAME, FRAME],
                data: scores,
            },
        );
        Ok(outputs)
    }
}

struct FakeEngine {
    accelerated_works: bool,
    output_name: String,
    fail_run: bool,
    attempts: Mutex<Vec<BackendChoice>>,
}

impl FakeEngine {
    fn new() -> Self {
        Self {
            accelerated_works: true,
            output_name: "output".to_string(),
            fail_run: false,
            attempts: Mutex::new(Vec::new()),
        }
    }
}

impl InferenceEngine for FakeEngine {
    fn create_session(
        &self,
        _model: &ModelSource,
        backend: BackendChoice,
    ) -> Result<Box<dyn InferenceSession>> {
        self.attempts.lock().unwrap().push(backend);
        if backend == BackendChoice::Accelerated && !self.accelerated_works {
            return Err(Error::ModelLoad("no kernel image for device".to_string()));
        }
        Ok(Box::new(EchoSession {
            output_name: self.output_name.clone(),
            fail: self.fail_run,
        }))
    }
}

struct ThrowingAdapter;

impl ComputeAdapter for ThrowingAdapter {
    fn describe(&self) -> String {
        "flaky gpu".to_string()
    }

    fn request_device(&self) -> Result<()> {
        Err(Error::BackendUnavailable("device creation failed".to_string()))
    }
}

struct ReadyAdapter;

impl ComputeAdapter for ReadyAdapter {
    fn describe(&self) -> String {
        "test gpu".to_string()
    }

    fn request_device(&self) -> Result<()> {
        Ok(())
    }
}

struct Probe {
    throws: bool,
}

impl ComputeProbe for Probe {
    fn query_adapter(&self) -> Option<Box<dyn ComputeAdapter>> {
        if self.throws {
            Some(Box::new(ThrowingAdapter))
        } else {
            Some(Box::new(ReadyAdapter))
        }
    }
}

fn model() -> ModelSource {
    ModelSource::Memory(vec![0u8; 16])
}

fn remover(engine: &FakeEngine, probe: &Probe) -> BackgroundRemover {
    BackgroundRemover::initialize(engine, probe, &model(), &RemoverConfig::default()).unwrap()
}

/// Left half red, right half blue
fn split_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 0, 255, 255])
        }
    })
}

#[test]
fn throwing_device_probe_still_initializes_portable() {
    let engine = FakeEngine::new();
    let remover = remover(&engine, &Probe { throws: true });
    assert_eq!(remover.backend(), BackendChoice::Portable);
    assert_eq!(*engine.attempts.lock().unwrap(), vec![BackendChoice::Portable]);
}

#[test]
fn accelerated_backend_is_reported() {
    let engine = FakeEngine::new();
    let remover = remover(&engine, &Probe { throws: false });
    assert_eq!(remover.backend(), BackendChoice::Accelerated);
}

#[test]
fn failing_accelerated_session_reports_portable() {
    let engine = FakeEngine {
        accelerated_works: false,
        ..FakeEngine::new()
    };
    let remover = remover(&engine, &Probe { throws: false });
    assert_eq!(remover.backend(), BackendChoice::Portable);
}

#[test]
fn cutout_keeps_colors_and_masks_background() {
    let engine = FakeEngine::new();
    let remover = remover(&engine, &Probe { throws: false });
    let image = split_image(100, 50);

    let cutout = remover.remove_background(&image).unwrap();

    assert_eq!(cutout.dimensions(), image.dimensions());
    for (x, y, pixel) in cutout.enumerate_pixels() {
        let original = image.get_pixel(x, y);
        assert_eq!(&pixel.0[..3], &original.0[..3]);
    }
    // Away from the resampled seam the mask is fully on or off
    assert_eq!(cutout.get_pixel(5, 25)[3], 255);
    assert_eq!(cutout.get_pixel(94, 25)[3], 0);
    // The caller's image is untouched
    assert!(image.pixels().all(|p| p[3] == 255));
}

#[test]
fn mask_matches_original_resolution() {
    let engine = FakeEngine::new();
    let remover = remover(&engine, &Probe { throws: true });
    let image = split_image(37, 91);

    let mask = remover.segment(&image).unwrap();

    assert_eq!(mask.dimensions(), (37, 91));
    assert!(mask.pixels().all(|p| p[0] == p[1] && p[1] == p[2] && p[3] == 255));
    assert_eq!(remover.input_size(), (MODEL_INPUT_SIZE, MODEL_INPUT_SIZE));
}

#[test]
fn black_image_with_uniform_content_gives_zero_alpha() {
    let engine = FakeEngine::new();
    let remover = remover(&engine, &Probe { throws: true });
    let image = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));

    let cutout = remover.remove_background(&image).unwrap();

    assert!(cutout.pixels().all(|p| p.0 == [0, 0, 0, 0]));
}

#[test]
fn missing_output_lists_available_names() {
    let engine = FakeEngine {
        output_name: "logits".to_string(),
        ..FakeEngine::new()
    };
    let remover = remover(&engine, &Probe { throws: true });

    match remover.remove_background(&split_image(4, 4)) {
        Err(Error::InvalidMask(message)) => {
            assert!(message.contains("output"));
            assert!(message.contains("logits"));
        }
        other => panic!("expected InvalidMask, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn inference_failure_propagates() {
    let engine = FakeEngine {
        fail_run: true,
        ..FakeEngine::new()
    };
    let remover = remover(&engine, &Probe { throws: true });

    assert!(matches!(
        remover.remove_background(&split_image(4, 4)),
        Err(Error::Inference(_))
    ));
}

#[test]
fn empty_image_is_rejected_before_inference() {
    let engine = FakeEngine {
        fail_run: true,
        ..FakeEngine::new()
    };
    let remover = remover(&engine, &Probe { throws: true });

    assert!(matches!(
        remover.remove_background(&RgbaImage::new(0, 3)),
        Err(Error::InvalidImage(_))
    ));
}

#[test]
fn concurrent_requests_keep_their_own_geometry() {
    let engine = FakeEngine::new();
    let remover = Arc::new(remover(&engine, &Probe { throws: true }));

    let handles: Vec<_> = [(120, 30), (30, 120), (64, 64), (200, 10)]
        .into_iter()
        .map(|(width, height)| {
            let remover = Arc::clone(&remover);
            thread::spawn(move || {
                let image = split_image(width, height);
                let cutout = remover.remove_background(&image).unwrap();
                (image, cutout)
            })
        })
        .collect();

    for handle in handles {
        let (image, cutout) = handle.join().unwrap();
        let (width, height) = image.dimensions();
        assert_eq!(cutout.dimensions(), (width, height));
        assert_eq!(cutout.get_pixel(0, height / 2)[3], 255);
        assert_eq!(cutout.get_pixel(width - 1, height / 2)[3], 0);
    }
}
