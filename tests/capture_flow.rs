//! End-to-end capture flow: analyze, strip, sign, verify.

use capture_integrity::capture::ImageFrame;
use capture_integrity::quality::{analyze, IssueType, QualityThresholds, Severity};
use capture_integrity::signing::{
    CaptureContext, Ed25519ClientSigner, Ed25519UserSigner, Ed25519Verifier, SessionId,
    SignaturePackage, VerificationError,
};
use capture_integrity::strip::{self, ContainerFormat, MetadataCategory};
use capture_integrity::{CapturePipeline, FileConfig, PipelineError};
use chrono::{TimeZone, Utc};
use image::{DynamicImage, ImageOutputFormat, RgbImage};
use std::io::Cursor;

fn photo(format: ImageOutputFormat) -> Vec<u8> {
    let image = RgbImage::from_fn(48, 32, |x, y| {
        image::Rgb([(x * 5) as u8, (y * 7) as u8, ((x + y) * 3) as u8])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut out), format)
        .unwrap();
    out
}

fn with_exif_and_xmp(jpeg: &[u8]) -> Vec<u8> {
    let mut out = jpeg[..2].to_vec();
    let segments: [(u8, &[u8]); 2] = [
        (0xE1, b"Exif\0\0MM\0*GPS 51.5N 0.12W"),
        (0xE1, b"http://ns.adobe.com/xap/1.0/\0<x:xmpmeta/>"),
    ];
    for (marker, payload) in segments {
        out.extend_from_slice(&[0xFF, marker]);
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
    }
    out.extend_from_slice(&jpeg[2..]);
    out
}

fn decode_rgb(bytes: &[u8]) -> Vec<u8> {
    image::load_from_memory(bytes).unwrap().to_rgb8().into_raw()
}

fn context(quality_score: u8) -> CaptureContext {
    CaptureContext {
        device_fingerprint: "android-7f3a".into(),
        client_version: "4.2.0".into(),
        captured_at: Utc.timestamp_millis_opt(1_717_171_717_171).unwrap(),
        subject_type: "drivers_license".into(),
        quality_score,
        session_id: SessionId::parse("cap_lwv2x3kj_9f8e7d6c5b4a3921").unwrap(),
    }
}

#[test]
fn test_mid_gray_hd_frame() {
    let frame = ImageFrame::filled(1920, 1080, [128, 128, 128, 255]);
    let result = analyze(&frame, &QualityThresholds::default());

    assert!(result.checks.resolution.passed);
    assert!(result.checks.brightness.passed);
    assert!(!result.checks.sharpness.passed);
    assert!(result.checks.skew.passed);
    assert!(result.checks.glare.passed);
    assert!(result.checks.noise.passed);

    let errors: Vec<_> = result
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].issue_type, IssueType::Blur);

    // Every check but sharpness contributes its full weight.
    assert_eq!(result.score, 75);
    assert!(!result.passed);
}

#[test]
fn test_jpeg_strip_preserves_pixels() {
    let clean = photo(ImageOutputFormat::Jpeg(85));
    let tagged = with_exif_and_xmp(&clean);
    assert!(strip::has_metadata(&tagged));

    let result = strip::strip(&tagged).unwrap();
    assert_eq!(result.input_format(), ContainerFormat::Jpeg);
    assert!(result.removed());
    assert!(result.removed_categories().contains(&MetadataCategory::Exif));
    assert!(result.removed_categories().contains(&MetadataCategory::Xmp));
    assert_eq!(result.image().as_bytes(), clean.as_slice());
    assert_eq!(decode_rgb(result.image().as_bytes()), decode_rgb(&tagged));
    assert!(!strip::has_metadata(result.image().as_bytes()));

    let again = strip::strip(result.image().as_bytes()).unwrap();
    assert!(!again.removed());
    assert_eq!(again.image().as_bytes(), result.image().as_bytes());
}

#[test]
fn test_fallback_reencodes_as_png() {
    let bmp = photo(ImageOutputFormat::Bmp);
    assert!(strip::has_metadata(&bmp));

    let result = strip::strip(&bmp).unwrap();
    assert_eq!(result.input_format(), ContainerFormat::Other);
    assert_eq!(result.image().format(), ContainerFormat::Png);
    assert!(result
        .removed_categories()
        .contains(&MetadataCategory::ReEncoded));
    assert_eq!(decode_rgb(result.image().as_bytes()), decode_rgb(&bmp));
}

#[tokio::test]
async fn test_pipeline_package_verifies_from_json() {
    let tagged = with_exif_and_xmp(&photo(ImageOutputFormat::Jpeg(90)));
    let client = Ed25519ClientSigner::from_secret([11u8; 32], "mobile-sdk", "4.2.0");
    let user = Ed25519UserSigner::from_secret([12u8; 32]);
    let ctx = context(81);

    let mut pipeline = CapturePipeline::from_config(&FileConfig::default());
    let outcome = pipeline.process(&tagged, &ctx, &client, &user).await.unwrap();

    let json = outcome.package.to_json().unwrap();
    let received = SignaturePackage::from_json(&json).unwrap();
    assert_eq!(received, outcome.package);

    let image = outcome.strip.image().as_bytes();
    let chain = pipeline.chain();
    assert!(chain
        .verify(&received, image, &ctx, &Ed25519Verifier, &Ed25519Verifier)
        .is_ok());

    // The unstripped original does not verify.
    assert!(matches!(
        chain.verify(&received, &tagged, &ctx, &Ed25519Verifier, &Ed25519Verifier),
        Err(VerificationError::DigestMismatch)
    ));

    // Neither does a claimed higher quality score.
    assert!(matches!(
        chain.verify(&received, image, &context(99), &Ed25519Verifier, &Ed25519Verifier),
        Err(VerificationError::DigestMismatch)
    ));
}

#[tokio::test]
async fn test_two_captures_never_share_salt() {
    let bytes = photo(ImageOutputFormat::Png);
    let client = Ed25519ClientSigner::from_secret([1u8; 32], "mobile-sdk", "4.2.0");
    let user = Ed25519UserSigner::from_secret([2u8; 32]);
    let mut pipeline = CapturePipeline::from_config(&FileConfig::default());

    let first = pipeline.process(&bytes, &context(80), &client, &user).await.unwrap();
    let second = pipeline.process(&bytes, &context(80), &client, &user).await.unwrap();

    assert_eq!(first.package.payload_digest(), second.package.payload_digest());
    assert_ne!(first.package.salt(), second.package.salt());
    assert_ne!(
        first.package.client().signature(),
        second.package.client().signature()
    );
}

#[tokio::test]
async fn test_undecodable_input_is_terminal() {
    let client = Ed25519ClientSigner::from_secret([1u8; 32], "mobile-sdk", "4.2.0");
    let user = Ed25519UserSigner::from_secret([2u8; 32]);
    let mut pipeline = CapturePipeline::from_config(&FileConfig::default());

    let result = pipeline
        .process(b"definitely not an image", &context(80), &client, &user)
        .await;
    assert!(matches!(result, Err(PipelineError::Strip(_))));
}
