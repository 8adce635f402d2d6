//! Live sampling against a mock detection service.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bladescan_media::{ImageSurface, MediaResult, MediaSource, PlaybackClock};
use bladescan_ml_client::{InferenceClient, InferenceConfig};
use bladescan_sync::{CycleOutcome, SharedSurface, SyncConfig, SyncEngine, SyncOutcome};
use image::{Rgb, RgbImage};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct StillVideo {
    clock: PlaybackClock,
}

#[async_trait]
impl MediaSource for StillVideo {
    fn current_time(&self) -> f64 {
        self.clock.now()
    }

    fn dimensions(&self) -> (u32, u32) {
        (640, 480)
    }

    fn duration(&self) -> Option<f64> {
        Some(30.0)
    }

    async fn paint_current(&self) -> MediaResult<RgbImage> {
        Ok(RgbImage::from_pixel(640, 480, Rgb([90, 120, 150])))
    }
}

#[tokio::test]
async fn test_live_cycle_through_http_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict/image"))
        .and(header_exists("content-type"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "detections": [
                {"class": "damage", "confidence": 0.91, "bbox": [100, 100, 200, 200], "class_id": 0},
                {"class": "dirt", "confidence": 0.55, "bbox": [300, 50, 420, 90], "class_id": 1}
            ],
            "total_detections": 2
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = InferenceClient::new(InferenceConfig {
        base_url: server.uri(),
        ..Default::default()
    })
    .unwrap();

    let surface = Arc::new(Mutex::new(ImageSurface::new(320, 240)));
    let shared: SharedSurface = surface.clone();
    let engine = Arc::new(SyncEngine::new(SyncConfig::default(), Arc::new(client), shared));

    let clock = PlaybackClock::new();
    engine.load_live(Arc::new(StillVideo {
        clock: clock.clone(),
    }));

    for t in [0.0, 0.25, 0.5] {
        clock.set(t);
        if let SyncOutcome::Sampling(handle) = engine.on_position_changed(t) {
            assert!(matches!(handle.await.unwrap(), CycleOutcome::Merged { .. }));
        }
    }

    let display = engine.display();
    assert_eq!(display.detection_count, 4);
    assert_eq!(display.totals.damage(), 2);
    assert_eq!(display.totals.dirt(), 2);

    let history = engine.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].timestamp, 0.5);
    assert_eq!(history[1].source_size, Some((640, 480)));

    // Damage box [100, 100, 200, 200] lands at [50, 50, 100, 100] on the half-size surface.
    let canvas = surface.lock().unwrap();
    assert_eq!(canvas.canvas().get_pixel(50, 75).0, [255, 59, 48, 255]);
}
