//! Integration tests: drive the controller through upload, crop,
//! background removal, styling, and export the way a UI would.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::cast_possible_truncation)]

use std::sync::{Arc, Mutex};

use glowcut_pipeline::{
    AspectRatio, Controller, Dimensions, PipelineError, Region, RgbaImage, SegmentError, Status,
    StyleParams, StylePatch, segment::apply_mask, segmenter_fn,
};

/// Opaque gradient so every pixel is distinguishable.
fn photo(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 251) as u8, (y % 241) as u8, ((x + y) % 7) as u8 * 30, 255])
    })
}

fn png(image: &RgbaImage) -> Vec<u8> {
    glowcut_pipeline::decode::encode_png(image).unwrap()
}

fn exported(controller: &Controller<glowcut_pipeline::RectCropper>) -> RgbaImage {
    controller.export_for_download().unwrap().decode().unwrap()
}

/// Cuts out the left half of the image.
fn left_half(image: &RgbaImage) -> RgbaImage {
    let mask = glowcut_pipeline::GrayImage::from_fn(image.width(), image.height(), |x, _| {
        image::Luma([if x < image.width() / 2 { 255 } else { 0 }])
    });
    apply_mask(image, &mask)
}

#[test]
fn padding_only_centres_the_image_on_a_transparent_canvas() {
    let controller = Controller::default();
    let source = photo(400, 300);
    controller.load(&png(&source)).unwrap();
    controller
        .set_style(StylePatch {
            padding: Some(20.0),
            shadow_blur: Some(0.0),
            glow_blur: Some(0.0),
        })
        .unwrap();

    let blob = controller.export_for_download().unwrap();
    assert_eq!(blob.dimensions(), Dimensions::new(440, 340));
    assert_eq!(blob.format().mime_type(), "image/png");

    let out = blob.decode().unwrap();
    for (x, y, pixel) in out.enumerate_pixels() {
        let inside = (20..420).contains(&x) && (20..320).contains(&y);
        if inside {
            assert_eq!(pixel, source.get_pixel(x - 20, y - 20), "at {x},{y}");
        } else {
            assert_eq!(pixel.0[3], 0, "border pixel {x},{y} should be transparent");
        }
    }
}

#[test]
fn default_style_adds_padding_and_shadow() {
    let controller = Controller::default();
    controller.load(&png(&photo(50, 40))).unwrap();

    let out = exported(&controller);
    assert_eq!(out.dimensions(), (130, 120));
    // Shadow spills into the padding just outside the image edge.
    assert!(out.get_pixel(38, 60).0[3] > 0);
    // Far corners remain transparent.
    assert_eq!(out.get_pixel(0, 0).0[3], 0);
}

#[test]
fn crop_then_style_uses_the_cropped_image() {
    let controller = Controller::from_config(glowcut_pipeline::ControllerConfig {
        initial_style: StyleParams::PLAIN,
        ..Default::default()
    });
    let source = photo(200, 100);
    controller.load(&png(&source)).unwrap();

    controller.set_aspect_ratio(AspectRatio::SQUARE).unwrap();
    let selected = controller.select(Region::new(30, 10, 60, 60)).unwrap();
    assert_eq!(selected, Region::new(30, 10, 60, 60));
    controller.commit_crop().unwrap();

    controller.set_style(StylePatch::padding(5.0)).unwrap();
    let out = exported(&controller);
    assert_eq!(out.dimensions(), (70, 70));
    assert_eq!(out.get_pixel(5, 5), source.get_pixel(30, 10));
    assert_eq!(out.get_pixel(64, 64), source.get_pixel(89, 69));
}

#[test]
fn successive_crops_compose() {
    let controller = Controller::from_config(glowcut_pipeline::ControllerConfig {
        initial_style: StyleParams::PLAIN,
        ..Default::default()
    });
    let source = photo(120, 90);
    controller.load(&png(&source)).unwrap();

    controller.select(Region::new(10, 10, 100, 70)).unwrap();
    controller.commit_crop().unwrap();
    controller.select(Region::new(5, 5, 20, 20)).unwrap();
    controller.commit_crop().unwrap();

    let working = controller.working_image().unwrap();
    assert_eq!(working.dimensions(), (20, 20));
    assert_eq!(working.get_pixel(0, 0), source.get_pixel(15, 15));
}

#[test]
fn full_selection_crop_is_lossless() {
    let controller = Controller::default();
    let source = photo(64, 48);
    controller.load(&png(&source)).unwrap();
    let before = controller.export_for_download().unwrap();

    controller.select(Region::full(Dimensions::new(64, 48))).unwrap();
    controller.commit_crop().unwrap();

    assert_eq!(*controller.working_image().unwrap(), source);
    assert_eq!(controller.export_for_download().unwrap(), before);
}

#[test]
fn full_selection_crop_after_a_crop_keeps_the_first_crop() {
    let controller = Controller::default();
    controller.load(&png(&photo(90, 60))).unwrap();
    controller.select(Region::new(12, 7, 50, 40)).unwrap();
    controller.commit_crop().unwrap();
    let first = controller.working_image().unwrap();
    let first_artifact = controller.export_for_download().unwrap();

    controller.select(Region::full(Dimensions::new(50, 40))).unwrap();
    controller.commit_crop().unwrap();

    assert_eq!(*controller.working_image().unwrap(), *first);
    assert_eq!(controller.export_for_download().unwrap(), first_artifact);
}

#[tokio::test]
async fn background_removal_replaces_working_image() {
    let controller = Controller::default();
    controller.load(&png(&photo(40, 20))).unwrap();
    let revision = controller.revision();

    let segmenter = segmenter_fn(|image: Arc<RgbaImage>, _| async move {
        Ok::<_, SegmentError>(left_half(&image))
    });
    controller.remove_background(&segmenter).await.unwrap();

    let working = controller.working_image().unwrap();
    assert_eq!(working.get_pixel(5, 5).0[3], 255);
    assert_eq!(working.get_pixel(35, 5).0[3], 0);
    assert!(controller.revision() > revision);
    assert_eq!(controller.status(), Status::Cropping);
    assert!(!controller.is_segmenting());
    // A fresh session covers the new image.
    assert!(controller.has_crop_session());
}

#[tokio::test]
async fn rejected_segmentation_keeps_working_image() {
    let controller = Controller::default();
    controller.load(&png(&photo(16, 16))).unwrap();
    let working = controller.working_image().unwrap();
    let artifact = controller.export_for_download().unwrap();

    let segmenter = segmenter_fn(|_, _| async {
        Err::<RgbaImage, _>(SegmentError::Failed("model failed to load".into()))
    });
    let err = controller.remove_background(&segmenter).await.unwrap_err();

    assert!(matches!(err, PipelineError::Segmentation(SegmentError::Failed(_))));
    assert!(Arc::ptr_eq(&working, &controller.working_image().unwrap()));
    assert_eq!(controller.export_for_download().unwrap(), artifact);
    match controller.status() {
        Status::Error(message) => assert!(message.contains("model failed to load")),
        other => panic!("expected error status, got {other:?}"),
    }
    assert!(!controller.is_segmenting());

    // The guard was released, so a retry is accepted.
    let retry = segmenter_fn(|image: Arc<RgbaImage>, _| async move {
        Ok::<_, SegmentError>((*image).clone())
    });
    controller.remove_background(&retry).await.unwrap();
}

#[tokio::test]
async fn second_removal_while_pending_is_rejected() {
    let controller = Controller::default();
    controller.load(&png(&photo(12, 12))).unwrap();

    let (release, released) = tokio::sync::oneshot::channel::<()>();
    let released = Mutex::new(Some(released));
    let slow = segmenter_fn(|image: Arc<RgbaImage>, _| {
        let released = released.lock().unwrap().take();
        async move {
            if let Some(released) = released {
                let _ = released.await;
            }
            Ok::<_, SegmentError>(left_half(&image))
        }
    });
    let calls = Mutex::new(0_u32);
    let counting = segmenter_fn(|image: Arc<RgbaImage>, _| {
        *calls.lock().unwrap() += 1;
        async move { Ok::<_, SegmentError>((*image).clone()) }
    });

    let first = controller.remove_background(&slow);
    let second = async {
        tokio::task::yield_now().await;
        let result = controller.remove_background(&counting).await;
        release.send(()).unwrap();
        result
    };
    let (first, second) = tokio::join!(first, second);

    first.unwrap();
    assert!(matches!(second, Err(PipelineError::OperationInProgress)));
    assert_eq!(*calls.lock().unwrap(), 0, "rejected call must not reach the segmenter");
    assert_eq!(controller.working_image().unwrap().get_pixel(11, 0).0[3], 0);
}

#[test]
fn clear_then_export_reports_nothing_to_export() {
    let controller = Controller::default();
    controller.load(&png(&photo(10, 10))).unwrap();
    controller.set_style(StylePatch::glow_blur(12.0)).unwrap();

    controller.clear();

    assert!(matches!(
        controller.export_for_download(),
        Err(PipelineError::NothingToExport)
    ));
    assert!(controller.working_image().is_none());
    assert!(!controller.has_crop_session());
    assert!((controller.style().glow_blur - 12.0).abs() < f32::EPSILON);
    assert!(controller.status().is_error());
}

#[test]
fn render_is_idempotent() {
    let controller = Controller::default();
    controller.load(&png(&photo(30, 20))).unwrap();
    controller
        .set_style(StylePatch {
            padding: Some(12.0),
            shadow_blur: Some(6.0),
            glow_blur: Some(9.0),
        })
        .unwrap();

    controller.render().unwrap();
    let first = controller.export_for_download().unwrap();
    controller.render().unwrap();
    let second = controller.export_for_download().unwrap();
    assert_eq!(first.bytes(), second.bytes());
}

#[test]
fn style_changes_do_not_modify_working_image() {
    let controller = Controller::default();
    let source = photo(25, 25);
    controller.load(&png(&source)).unwrap();

    for value in [0.0, 80.0, 33.3, -4.0, f64::NAN] {
        controller.set_style(StylePatch::shadow_blur(value)).unwrap();
        controller.set_style(StylePatch::glow_blur(value)).unwrap();
        controller.set_style(StylePatch::padding(value)).unwrap();
    }

    assert_eq!(*controller.working_image().unwrap(), source);
}

#[test]
fn loading_a_new_image_replaces_everything_but_style() {
    let controller = Controller::default();
    controller.load(&png(&photo(10, 10))).unwrap();
    controller.set_style(StylePatch::padding(3.0)).unwrap();
    controller.select(Region::new(0, 0, 4, 4)).unwrap();

    controller.load(&png(&photo(20, 30))).unwrap();

    assert_eq!(controller.working_dimensions(), Some(Dimensions::new(20, 30)));
    assert_eq!(controller.style().padding, 3);
    assert_eq!(
        controller.export_for_download().unwrap().dimensions(),
        Dimensions::new(26, 36)
    );
    // The new session starts from its own default box.
    assert_ne!(controller.selection(), Some(Region::new(0, 0, 4, 4)));
}

#[test]
fn out_of_range_style_values_are_clamped() {
    let controller = Controller::default();
    controller
        .set_style(StylePatch {
            padding: Some(1e9),
            shadow_blur: Some(-3.0),
            glow_blur: Some(f64::INFINITY),
        })
        .unwrap();
    let style = controller.style();
    assert_eq!(style.padding, 200);
    assert!(style.shadow_blur.abs() < f32::EPSILON);
    assert!(style.glow_blur.abs() < f32::EPSILON);
}
